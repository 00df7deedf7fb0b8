use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    SlotConflict,
    Timeout,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::SlotConflict => "slot_conflict",
            ConflictKind::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictEvent {
    pub kind: ConflictKind,
    pub service_id: String,
    pub slot_id: String,
    pub idempotency_key: Option<String>,
    pub occurred_at: DateTime<Utc>,
}
