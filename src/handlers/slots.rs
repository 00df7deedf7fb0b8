use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{parse_instant, published_service};
use crate::errors::BookingError;
use crate::models::FreeSlot;
use crate::services::availability::{find_free, validate_range};
use crate::services::time_window::parse_timezone;
use crate::state::AppState;

// GET /api/slots
#[derive(Deserialize)]
pub struct SlotsQuery {
    pub service_slug: String,
    pub from: String,
    pub to: String,
    pub timezone: String,
}

#[derive(Serialize)]
pub struct SlotsResponse {
    slots: Vec<FreeSlot>,
}

pub async fn available_slots(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<SlotsResponse>, BookingError> {
    parse_timezone(&query.timezone)?;
    let from = parse_instant("from", &query.from)?;
    let to = parse_instant("to", &query.to)?;
    validate_range(from, to)?;

    let service = published_service(&state, &query.service_slug).await?;
    let slots = find_free(state.store.as_ref(), &service.id, from, to).await?;

    Ok(Json(SlotsResponse { slots }))
}
