use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::config::AppConfig;
use crate::errors::BookingError;
use crate::models::{FreeSlot, Service, ServiceFormat, TimeWindow};
use crate::services::availability::{find_free, validate_range};
use crate::services::store::BookingStore;
use crate::services::time_window::classify;

#[derive(Debug, Clone, Copy)]
pub struct AlternativesLimits {
    pub horizon: Duration,
    pub next_slots: usize,
    pub next_days: usize,
    pub format_alternatives: usize,
}

impl AlternativesLimits {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            horizon: Duration::days(config.alternatives_horizon_days),
            next_slots: config.next_slots_limit,
            next_days: config.next_days_limit,
            format_alternatives: config.format_alternatives_limit,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Alternatives {
    pub has_slots_in_range: bool,
    pub next_slots: Vec<FreeSlot>,
    pub next_days: Vec<DaySuggestion>,
    pub time_windows: Vec<WindowSuggestion>,
    pub format_alternatives: Vec<FormatAlternative>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DaySuggestion {
    /// Calendar date in the caller's timezone.
    pub date: NaiveDate,
    pub slot_count: usize,
    pub first_slot: FreeSlot,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WindowSuggestion {
    pub window: TimeWindow,
    pub slot: FreeSlot,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FormatAlternative {
    pub service_slug: String,
    pub title: String,
    pub format: ServiceFormat,
    pub first_slot: FreeSlot,
}

pub struct AlternativesEngine {
    store: Arc<dyn BookingStore>,
    limits: AlternativesLimits,
}

impl AlternativesEngine {
    pub fn new(store: Arc<dyn BookingStore>, limits: AlternativesLimits) -> Self {
        Self { store, limits }
    }

    /// Suggests other slots when `[from, to)` has nothing free for `service`.
    ///
    /// Only the part of the range from now on counts. The horizon
    /// `[max(from, now), +horizon)` is scanned once; the three
    /// slot-based lists come from that single chronological pass.
    pub async fn suggest(
        &self,
        service: &Service,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        tz: Tz,
        selected_format: Option<ServiceFormat>,
    ) -> Result<Alternatives, BookingError> {
        validate_range(from, to)?;

        // Past slots are neither "in range" nor suggestions.
        let horizon_start = from.max(Utc::now());
        if horizon_start < to {
            let in_range = find_free(self.store.as_ref(), &service.id, horizon_start, to).await?;
            if !in_range.is_empty() {
                return Ok(Alternatives {
                    has_slots_in_range: true,
                    ..Default::default()
                });
            }
        }

        let horizon_end = horizon_start + self.limits.horizon;

        let free = find_free(self.store.as_ref(), &service.id, horizon_start, horizon_end).await?;
        let scan = scan_free_slots(&free, tz, &self.limits);

        let format_alternatives = self
            .format_alternatives(service, selected_format, horizon_start, horizon_end)
            .await?;

        tracing::debug!(
            service = %service.slug,
            horizon_slots = free.len(),
            format_alternatives = format_alternatives.len(),
            "built alternatives"
        );

        Ok(Alternatives {
            has_slots_in_range: false,
            next_slots: scan.next_slots,
            next_days: scan.next_days,
            time_windows: scan.time_windows,
            format_alternatives,
        })
    }

    async fn format_alternatives(
        &self,
        service: &Service,
        selected_format: Option<ServiceFormat>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FormatAlternative>, BookingError> {
        let Some(topic) = service.topic_code.as_deref() else {
            return Ok(vec![]);
        };
        if self.limits.format_alternatives == 0 {
            return Ok(vec![]);
        }
        let selected = selected_format.unwrap_or(service.format);

        let candidates = self.store.find_by_topic(topic).await?;
        let mut alternatives = vec![];
        for candidate in candidates
            .into_iter()
            .filter(|c| c.is_published() && c.id != service.id && c.format != selected)
        {
            let free = find_free(self.store.as_ref(), &candidate.id, from, to).await?;
            // Services with nothing bookable are not worth offering.
            if let Some(first_slot) = free.into_iter().next() {
                alternatives.push(FormatAlternative {
                    service_slug: candidate.slug,
                    title: candidate.title,
                    format: candidate.format,
                    first_slot,
                });
            }
        }

        alternatives.sort_by(|a, b| {
            a.first_slot
                .start_at_utc
                .cmp(&b.first_slot.start_at_utc)
                .then_with(|| a.service_slug.cmp(&b.service_slug))
        });
        alternatives.truncate(self.limits.format_alternatives);
        Ok(alternatives)
    }
}

#[derive(Debug, Default)]
struct Scan {
    next_slots: Vec<FreeSlot>,
    next_days: Vec<DaySuggestion>,
    time_windows: Vec<WindowSuggestion>,
}

/// Single pass over chronologically sorted free slots.
fn scan_free_slots(free: &[FreeSlot], tz: Tz, limits: &AlternativesLimits) -> Scan {
    let mut scan = Scan::default();
    let mut windows: [Option<FreeSlot>; 3] = [None, None, None];
    // Set once a day beyond the first `next_days` shows up; counts are final then.
    let mut days_closed = limits.next_days == 0;

    for slot in free {
        if scan.next_slots.len() < limits.next_slots {
            scan.next_slots.push(slot.clone());
        }

        if !days_closed {
            let date = slot.start_at_utc.with_timezone(&tz).date_naive();
            let room = scan.next_days.len() < limits.next_days;
            match scan.next_days.iter_mut().find(|d| d.date == date) {
                Some(day) => day.slot_count += 1,
                None if room => {
                    scan.next_days.push(DaySuggestion {
                        date,
                        slot_count: 1,
                        first_slot: slot.clone(),
                    });
                }
                None => days_closed = true,
            }
        }

        let window = classify(slot.start_at_utc, tz);
        let entry = &mut windows[window.index()];
        if entry.is_none() {
            *entry = Some(slot.clone());
        }

        let windows_full = windows.iter().all(Option::is_some);
        if scan.next_slots.len() >= limits.next_slots && days_closed && windows_full {
            break;
        }
    }

    scan.time_windows = TimeWindow::ALL
        .iter()
        .zip(windows)
        .filter_map(|(window, slot)| {
            slot.map(|slot| WindowSuggestion {
                window: *window,
                slot,
            })
        })
        .collect();
    scan
}
