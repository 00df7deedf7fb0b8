use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::BookingError;
use crate::models::{Appointment, AppointmentStatus, Service, ServiceFormat};
use crate::services::reservation::{Reservation, StartBooking};
use crate::services::time_window::parse_timezone;
use crate::state::AppState;

// POST /api/bookings
#[derive(Deserialize)]
pub struct StartBookingRequest {
    pub service_slug: String,
    pub slot_id: String,
    pub timezone: String,
    pub format: Option<String>,
    pub client_request_id: Option<String>,
    pub client_user_id: Option<String>,
    pub lead_id: Option<String>,
}

#[derive(Serialize)]
pub struct StartBookingResponse {
    appointment_id: String,
    status: AppointmentStatus,
    replayed: bool,
    service_snapshot: ServiceSnapshot,
    slot_snapshot: SlotSnapshot,
}

#[derive(Serialize)]
pub struct ServiceSnapshot {
    id: String,
    slug: String,
    title: String,
    format: ServiceFormat,
    duration_minutes: i32,
    price_cents: i64,
    deposit_cents: i64,
}

#[derive(Serialize)]
pub struct SlotSnapshot {
    id: String,
    start_at_utc: DateTime<Utc>,
    end_at_utc: DateTime<Utc>,
    /// Start rendered in the booking's timezone.
    start_at_local: String,
    timezone: String,
    format: ServiceFormat,
}

pub async fn start_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartBookingRequest>,
) -> Result<(StatusCode, Json<StartBookingResponse>), BookingError> {
    let request = StartBooking {
        service_slug: body.service_slug,
        slot_id: body.slot_id,
        timezone: body.timezone,
        format: body.format,
        idempotency_key: body.client_request_id,
        client_user_id: body.client_user_id,
        lead_id: body.lead_id,
    };

    let reservation = state.coordinator.start_booking(request).await?;
    let status = if reservation.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((status, Json(StartBookingResponse::from(reservation))))
}

impl From<Reservation> for StartBookingResponse {
    fn from(reservation: Reservation) -> Self {
        let Reservation {
            appointment,
            service,
            replayed,
        } = reservation;

        StartBookingResponse {
            appointment_id: appointment.id.clone(),
            status: appointment.status,
            replayed,
            service_snapshot: ServiceSnapshot::from(service),
            slot_snapshot: SlotSnapshot::from(appointment),
        }
    }
}

impl From<Service> for ServiceSnapshot {
    fn from(service: Service) -> Self {
        ServiceSnapshot {
            id: service.id,
            slug: service.slug,
            title: service.title,
            format: service.format,
            duration_minutes: service.duration_minutes,
            price_cents: service.price_cents,
            deposit_cents: service.deposit_cents,
        }
    }
}

impl From<Appointment> for SlotSnapshot {
    fn from(appointment: Appointment) -> Self {
        // Stored timezones were validated on the way in.
        let start_at_local = parse_timezone(&appointment.timezone)
            .map(|tz| appointment.start_at.with_timezone(&tz).to_rfc3339())
            .unwrap_or_else(|_| appointment.start_at.to_rfc3339());

        SlotSnapshot {
            id: appointment.slot_id,
            start_at_utc: appointment.start_at,
            end_at_utc: appointment.end_at,
            start_at_local,
            timezone: appointment.timezone,
            format: appointment.format,
        }
    }
}
