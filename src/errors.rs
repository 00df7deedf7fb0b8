use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Outcome of a booking-core operation that did not succeed.
///
/// Each variant is a distinct case the caller must handle: conflicts are
/// final for this slot, `Timeout` is safe to retry with the identical
/// idempotent request, `IdempotencyConflict` is a caller bug.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("slot {0} is no longer available")]
    SlotConflict(String),

    #[error("idempotency key {0} was already used for a different booking")]
    IdempotencyConflict(String),

    #[error("reservation did not complete within {0} ms; retry the same request")]
    Timeout(u64),

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl BookingError {
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::Invalid(_) => "invalid",
            BookingError::NotFound(_) => "not_found",
            BookingError::SlotConflict(_) => "slot_conflict",
            BookingError::IdempotencyConflict(_) => "idempotency_conflict",
            BookingError::Timeout(_) => "timeout",
            BookingError::Storage(_) => "internal",
        }
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = match &self {
            BookingError::Invalid(_) => StatusCode::BAD_REQUEST,
            BookingError::NotFound(_) => StatusCode::NOT_FOUND,
            BookingError::SlotConflict(_) => StatusCode::CONFLICT,
            BookingError::IdempotencyConflict(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BookingError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            BookingError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            BookingError::Storage(e) => {
                tracing::error!(error = %format!("{e:#}"), "storage failure");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        let body = serde_json::json!({ "error": self.kind(), "message": message });
        (status, axum::Json(body)).into_response()
    }
}

/// Failure of the atomic reserve primitive.
#[derive(Debug, thiserror::Error)]
pub enum ReserveError {
    /// A non-cancelled appointment already holds the slot, or the slot left
    /// the available state.
    #[error("slot already taken")]
    SlotTaken,

    #[error("idempotency key already used")]
    DuplicateKey,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
