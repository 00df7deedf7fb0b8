use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::ConflictEvent;

/// Sink for lost-race and timeout observations.
#[async_trait]
pub trait ConflictTracker: Send + Sync {
    async fn record(&self, event: ConflictEvent) -> anyhow::Result<()>;
}

/// Persists conflict events next to the bookings they concern.
pub struct SqliteConflictTracker {
    db: Arc<Mutex<Connection>>,
}

impl SqliteConflictTracker {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConflictTracker for SqliteConflictTracker {
    async fn record(&self, event: ConflictEvent) -> anyhow::Result<()> {
        tracing::warn!(
            kind = event.kind.as_str(),
            service_id = %event.service_id,
            slot_id = %event.slot_id,
            "booking conflict"
        );

        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let conn = db
                .lock()
                .map_err(|_| anyhow::anyhow!("database connection lock poisoned"))?;
            queries::insert_conflict_event(&conn, &event)
        })
        .await?
    }
}

/// Hands `event` to the tracker without waiting for it. Failures are logged
/// and never reach the booking caller.
pub fn emit(tracker: &Arc<dyn ConflictTracker>, event: ConflictEvent) {
    let tracker = Arc::clone(tracker);
    tokio::spawn(async move {
        let slot_id = event.slot_id.clone();
        if let Err(e) = tracker.record(event).await {
            tracing::warn!(error = %e, slot_id = %slot_id, "failed to record conflict event");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::ConflictKind;

    #[tokio::test]
    async fn test_sqlite_tracker_persists_event() {
        let conn = Arc::new(Mutex::new(db::init_db(":memory:").unwrap()));
        let tracker = SqliteConflictTracker::new(Arc::clone(&conn));

        tracker
            .record(ConflictEvent {
                kind: ConflictKind::Timeout,
                service_id: "svc-1".to_string(),
                slot_id: "slot-1".to_string(),
                idempotency_key: Some("req-1".to_string()),
                occurred_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let (kind, slot_id): (String, String) = conn
            .lock()
            .unwrap()
            .query_row("SELECT kind, slot_id FROM booking_conflicts", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(kind, "timeout");
        assert_eq!(slot_id, "slot-1");
    }
}
