pub mod alternatives;
pub mod booking;
pub mod health;
pub mod slots;

use chrono::{DateTime, Utc};

use crate::errors::BookingError;
use crate::models::Service;
use crate::state::AppState;

/// Parses an RFC 3339 instant from a query parameter.
fn parse_instant(field: &str, raw: &str) -> Result<DateTime<Utc>, BookingError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| BookingError::Invalid(format!("{field} must be an RFC 3339 timestamp: {raw}")))
}

async fn published_service(state: &AppState, slug: &str) -> Result<Service, BookingError> {
    state
        .store
        .find_by_slug(slug)
        .await?
        .filter(Service::is_published)
        .ok_or_else(|| BookingError::NotFound(format!("service {slug}")))
}
