use chrono::{DateTime, Utc};

use crate::errors::BookingError;
use crate::models::slot::overlaps;
use crate::models::FreeSlot;
use crate::services::store::BookingStore;

/// Half-open busy interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Busy {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// Free slots of `service_id` starting inside `[from, to)`, ordered by start.
///
/// A candidate is free when it overlaps none of the busy intervals: reserved
/// or blocked slots of any service and non-cancelled appointments. This is an
/// optimistic read; the reservation write is what actually guards a slot.
pub async fn find_free(
    store: &dyn BookingStore,
    service_id: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<FreeSlot>, BookingError> {
    validate_range(from, to)?;

    let candidates = store.available_slots(service_id, from, to).await?;
    if candidates.is_empty() {
        return Ok(vec![]);
    }

    // Candidates may run past `to`; busy intervals must cover their tails too.
    let busy_to = candidates
        .iter()
        .map(|slot| slot.end_at)
        .max()
        .map_or(to, |end| end.max(to));

    let busy_slots = store.busy_slots(from, busy_to).await?;
    let appointments = store.active_in_range(from, busy_to).await?;

    let mut busy: Vec<Busy> = busy_slots
        .iter()
        .map(|slot| Busy {
            start: slot.start_at,
            end: slot.end_at,
        })
        .chain(appointments.iter().map(|appt| Busy {
            start: appt.start_at,
            end: appt.end_at,
        }))
        .collect();
    busy.sort_by_key(|b| b.start);
    let busy = merge_overlapping(&busy);

    let mut free: Vec<FreeSlot> = candidates
        .iter()
        .filter(|slot| is_free(slot.start_at, slot.end_at, &busy))
        .map(FreeSlot::from)
        .collect();
    free.sort_by(|a, b| a.start_at_utc.cmp(&b.start_at_utc).then_with(|| a.id.cmp(&b.id)));

    tracing::debug!(
        service_id,
        candidates = candidates.len(),
        busy = busy.len(),
        free = free.len(),
        "resolved availability"
    );

    Ok(free)
}

pub fn validate_range(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<(), BookingError> {
    if from >= to {
        return Err(BookingError::Invalid(format!(
            "range start {from} must be before end {to}"
        )));
    }
    Ok(())
}

/// Merge sorted intervals that overlap or touch into disjoint intervals.
fn merge_overlapping(sorted: &[Busy]) -> Vec<Busy> {
    let mut merged: Vec<Busy> = Vec::with_capacity(sorted.len());
    for &busy in sorted {
        if let Some(last) = merged.last_mut() {
            if busy.start <= last.end {
                last.end = last.end.max(busy.end);
                continue;
            }
        }
        merged.push(busy);
    }
    merged
}

/// `merged` must be sorted and disjoint.
fn is_free(start: DateTime<Utc>, end: DateTime<Utc>, merged: &[Busy]) -> bool {
    let idx = merged.partition_point(|b| b.end <= start);
    merged
        .get(idx)
        .map_or(true, |b| !overlaps(start, end, b.start, b.end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, queries};
    use crate::models::{
        Appointment, AppointmentStatus, AvailabilitySlot, Service, ServiceFormat, ServiceStatus,
        SlotSource, SlotStatus,
    };
    use crate::services::store::SqliteStore;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, 17, h, m, 0).unwrap()
    }

    fn slot(
        id: &str,
        service_id: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: SlotStatus,
    ) -> AvailabilitySlot {
        AvailabilitySlot {
            id: id.to_string(),
            service_id: service_id.map(str::to_string),
            start_at: start,
            end_at: end,
            status,
            source: SlotSource::Product,
            external_event_id: None,
        }
    }

    fn service(id: &str, slug: &str) -> Service {
        Service {
            id: id.to_string(),
            slug: slug.to_string(),
            title: slug.to_string(),
            format: ServiceFormat::Online,
            duration_minutes: 50,
            price_cents: 0,
            deposit_cents: 0,
            status: ServiceStatus::Published,
            topic_code: None,
        }
    }

    fn setup() -> SqliteStore {
        let conn = db::init_db(":memory:").unwrap();
        queries::insert_service(&conn, &service("svc-1", "intro")).unwrap();
        queries::insert_service(&conn, &service("svc-2", "deep-dive")).unwrap();
        let cand = slot("cand", Some("svc-1"), at(10, 0), at(10, 50), SlotStatus::Available);
        queries::insert_slot(&conn, &cand).unwrap();
        SqliteStore::new(conn)
    }

    fn insert(store: &SqliteStore, s: AvailabilitySlot) {
        let db = store.connection();
        let conn = db.lock().unwrap();
        queries::insert_slot(&conn, &s).unwrap();
    }

    #[tokio::test]
    async fn test_overlapping_busy_slot_excludes_candidate() {
        let store = setup();
        insert(&store, slot("busy", Some("svc-2"), at(10, 30), at(11, 0), SlotStatus::Reserved));

        let free = find_free(&store, "svc-1", at(9, 0), at(12, 0)).await.unwrap();
        assert!(free.is_empty());
    }

    #[tokio::test]
    async fn test_adjacent_busy_slot_keeps_candidate() {
        let store = setup();
        insert(&store, slot("busy", None, at(10, 50), at(11, 20), SlotStatus::Blocked));

        let free = find_free(&store, "svc-1", at(9, 0), at(12, 0)).await.unwrap();
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].id, "cand");
    }

    #[tokio::test]
    async fn test_cross_service_block_excludes_candidate() {
        let store = setup();
        insert(&store, slot("gcal", None, at(9, 0), at(10, 5), SlotStatus::Blocked));

        let free = find_free(&store, "svc-1", at(9, 0), at(12, 0)).await.unwrap();
        assert!(free.is_empty());
    }

    #[tokio::test]
    async fn test_appointment_excludes_candidate() {
        let store = setup();
        insert(&store, slot("other", Some("svc-2"), at(10, 40), at(11, 30), SlotStatus::Available));
        {
            let db = store.connection();
            let mut conn = db.lock().unwrap();
            let appt = Appointment {
                id: "appt-1".to_string(),
                service_id: "svc-2".to_string(),
                slot_id: "other".to_string(),
                client_user_id: None,
                lead_id: None,
                idempotency_key: None,
                start_at: at(10, 40),
                end_at: at(11, 30),
                timezone: "UTC".to_string(),
                format: ServiceFormat::Online,
                status: AppointmentStatus::Confirmed,
                created_at: at(0, 0),
                updated_at: at(0, 0),
            };
            queries::reserve_slot(&mut conn, &appt).unwrap();
            // Stale slot status must not matter: the appointment alone is busy.
            conn.execute(
                "UPDATE availability_slots SET status = 'available' WHERE id = 'other'",
                [],
            )
            .unwrap();
        }

        let free = find_free(&store, "svc-1", at(9, 0), at(12, 0)).await.unwrap();
        assert!(free.is_empty());
    }

    #[tokio::test]
    async fn test_busy_tail_past_range_end_is_seen() {
        let store = setup();
        // Range ends at 10:30; the candidate runs to 10:50 and collides at 10:40.
        insert(&store, slot("late", None, at(10, 40), at(11, 0), SlotStatus::Blocked));

        let free = find_free(&store, "svc-1", at(10, 0), at(10, 30)).await.unwrap();
        assert!(free.is_empty());
    }

    #[tokio::test]
    async fn test_results_are_chronological() {
        let store = setup();
        insert(&store, slot("early", Some("svc-1"), at(8, 0), at(8, 50), SlotStatus::Available));
        insert(&store, slot("late", Some("svc-1"), at(11, 0), at(11, 50), SlotStatus::Available));

        let free = find_free(&store, "svc-1", at(0, 0), at(23, 0)).await.unwrap();
        let ids: Vec<_> = free.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "cand", "late"]);
    }

    #[tokio::test]
    async fn test_sub_second_bounds_stay_half_open() {
        let store = setup();
        let half = chrono::Duration::milliseconds(500);

        // Starts before `from`, even though both fall in the same second.
        let free = find_free(&store, "svc-1", at(10, 0) + half, at(12, 0)).await.unwrap();
        assert!(free.is_empty());

        // Starts before `to`, even though both fall in the same second.
        let free = find_free(&store, "svc-1", at(9, 0), at(10, 0) + half).await.unwrap();
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].id, "cand");
    }

    #[tokio::test]
    async fn test_empty_range_is_invalid() {
        let store = setup();
        let err = find_free(&store, "svc-1", at(10, 0), at(10, 0)).await.unwrap_err();
        assert!(matches!(err, BookingError::Invalid(_)));
        let err = find_free(&store, "svc-1", at(11, 0), at(10, 0)).await.unwrap_err();
        assert!(matches!(err, BookingError::Invalid(_)));
    }

    #[test]
    fn test_merge_and_lookup() {
        let busy = merge_overlapping(&[
            Busy { start: at(9, 0), end: at(9, 30) },
            Busy { start: at(9, 30), end: at(10, 0) },
            Busy { start: at(9, 45), end: at(9, 50) },
            Busy { start: at(12, 0), end: at(13, 0) },
        ]);
        assert_eq!(busy.len(), 2);
        assert_eq!(busy[0].end, at(10, 0));

        assert!(is_free(at(10, 0), at(11, 0), &busy));
        assert!(!is_free(at(9, 55), at(10, 30), &busy));
        assert!(is_free(at(11, 0), at(12, 0), &busy));
        assert!(!is_free(at(11, 30), at(12, 1), &busy));
        assert!(is_free(at(13, 0), at(14, 0), &busy));
        assert!(is_free(at(8, 0), at(9, 0), &busy));
    }
}
