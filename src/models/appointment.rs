use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ServiceFormat;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub service_id: String,
    pub slot_id: String,
    pub client_user_id: Option<String>,
    pub lead_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub timezone: String,
    pub format: ServiceFormat,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// True when this appointment describes the same booking intent, which
    /// makes a repeated request with its idempotency key a safe replay.
    pub fn matches_intent(&self, service_id: &str, slot_id: &str, format: ServiceFormat) -> bool {
        self.service_id == service_id && self.slot_id == slot_id && self.format == format
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    PendingPayment,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::PendingPayment => "pending_payment",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "confirmed" => AppointmentStatus::Confirmed,
            "cancelled" => AppointmentStatus::Cancelled,
            "completed" => AppointmentStatus::Completed,
            _ => AppointmentStatus::PendingPayment,
        }
    }
}
