use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{Duration, Utc};
use serde::Deserialize;

use super::{parse_instant, published_service};
use crate::errors::BookingError;
use crate::models::ServiceFormat;
use crate::services::alternatives::Alternatives;
use crate::services::availability::validate_range;
use crate::services::time_window::parse_timezone;
use crate::state::AppState;

// GET /api/alternatives
#[derive(Deserialize)]
pub struct AlternativesQuery {
    pub service_slug: String,
    pub timezone: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub selected_format: Option<String>,
}

pub async fn get_alternatives(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlternativesQuery>,
) -> Result<Json<Alternatives>, BookingError> {
    let tz = parse_timezone(&query.timezone)?;

    let from = match query.from.as_deref() {
        Some(raw) => parse_instant("from", raw)?,
        None => Utc::now(),
    };
    let to = match query.to.as_deref() {
        Some(raw) => parse_instant("to", raw)?,
        None => from + Duration::days(state.config.default_range_days),
    };
    validate_range(from, to)?;

    let selected_format = match query.selected_format.as_deref() {
        Some(raw) => Some(
            ServiceFormat::parse(raw)
                .ok_or_else(|| BookingError::Invalid(format!("unsupported format: {raw}")))?,
        ),
        None => None,
    };

    let service = published_service(&state, &query.service_slug).await?;
    let alternatives = state
        .alternatives
        .suggest(&service, from, to, tz, selected_format)
        .await?;

    Ok(Json(alternatives))
}
