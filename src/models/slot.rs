use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: String,
    /// `None` marks a cross-service block such as a synced calendar event.
    pub service_id: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: SlotStatus,
    pub source: SlotSource,
    pub external_event_id: Option<String>,
}

/// Half-open interval overlap: `[s1, e1)` and `[s2, e2)` overlap iff
/// `s1 < e2 && s2 < e1`. Touching intervals do not overlap.
pub fn overlaps(
    s1: DateTime<Utc>,
    e1: DateTime<Utc>,
    s2: DateTime<Utc>,
    e2: DateTime<Utc>,
) -> bool {
    s1 < e2 && s2 < e1
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Reserved,
    Blocked,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Reserved => "reserved",
            SlotStatus::Blocked => "blocked",
        }
    }

    // Unknown values are treated as busy.
    pub fn parse(s: &str) -> Self {
        match s {
            "available" => SlotStatus::Available,
            "reserved" => SlotStatus::Reserved,
            _ => SlotStatus::Blocked,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotSource {
    Product,
    ExternalCalendarSync,
}

impl SlotSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotSource::Product => "product",
            SlotSource::ExternalCalendarSync => "external_calendar_sync",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "external_calendar_sync" => SlotSource::ExternalCalendarSync,
            _ => SlotSource::Product,
        }
    }
}

/// A bookable interval as exposed to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FreeSlot {
    pub id: String,
    pub start_at_utc: DateTime<Utc>,
    pub end_at_utc: DateTime<Utc>,
}

impl From<&AvailabilitySlot> for FreeSlot {
    fn from(slot: &AvailabilitySlot) -> Self {
        FreeSlot {
            id: slot.id.clone(),
            start_at_utc: slot.start_at,
            end_at_utc: slot.end_at,
        }
    }
}
