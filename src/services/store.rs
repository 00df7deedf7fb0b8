use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::ReserveError;
use crate::models::{Appointment, AvailabilitySlot, Service};

/// Read access to the service catalog. Returns drafts too; callers decide
/// what is bookable.
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> anyhow::Result<Option<Service>>;
    async fn find_by_topic(&self, topic_code: &str) -> anyhow::Result<Vec<Service>>;
}

#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn get_slot(&self, id: &str) -> anyhow::Result<Option<AvailabilitySlot>>;

    /// Available slots of `service_id` starting inside `[from, to)`.
    async fn available_slots(
        &self,
        service_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<AvailabilitySlot>>;

    /// Reserved and blocked slots of the whole calendar overlapping `[from, to)`.
    async fn busy_slots(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<AvailabilitySlot>>;

    /// Atomically inserts `appointment` and marks its slot reserved.
    async fn reserve(&self, appointment: &Appointment) -> Result<(), ReserveError>;
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn find_by_idempotency_key(&self, key: &str) -> anyhow::Result<Option<Appointment>>;

    /// Non-cancelled appointments overlapping `[from, to)`.
    async fn active_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Appointment>>;
}

pub trait BookingStore: ServiceCatalog + SlotStore + AppointmentStore {}

impl<T: ServiceCatalog + SlotStore + AppointmentStore> BookingStore for T {}

/// SQLite-backed store. Queries run on the blocking pool so a slow disk
/// never stalls the async workers.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.db)
    }

    async fn call<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&mut Connection) -> T + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || -> anyhow::Result<T> {
            let mut conn = db
                .lock()
                .map_err(|_| anyhow::anyhow!("database connection lock poisoned"))?;
            Ok(f(&mut conn))
        })
        .await
        .context("database task failed")?
    }
}

#[async_trait]
impl ServiceCatalog for SqliteStore {
    async fn find_by_slug(&self, slug: &str) -> anyhow::Result<Option<Service>> {
        let slug = slug.to_string();
        self.call(move |conn| queries::get_service_by_slug(conn, &slug))
            .await?
    }

    async fn find_by_topic(&self, topic_code: &str) -> anyhow::Result<Vec<Service>> {
        let topic_code = topic_code.to_string();
        self.call(move |conn| queries::get_services_by_topic(conn, &topic_code))
            .await?
    }
}

#[async_trait]
impl SlotStore for SqliteStore {
    async fn get_slot(&self, id: &str) -> anyhow::Result<Option<AvailabilitySlot>> {
        let id = id.to_string();
        self.call(move |conn| queries::get_slot(conn, &id)).await?
    }

    async fn available_slots(
        &self,
        service_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<AvailabilitySlot>> {
        let service_id = service_id.to_string();
        self.call(move |conn| queries::get_available_slots(conn, &service_id, &from, &to))
            .await?
    }

    async fn busy_slots(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<AvailabilitySlot>> {
        self.call(move |conn| queries::get_busy_slots(conn, &from, &to))
            .await?
    }

    async fn reserve(&self, appointment: &Appointment) -> Result<(), ReserveError> {
        let appointment = appointment.clone();
        self.call(move |conn| queries::reserve_slot(conn, &appointment))
            .await?
    }
}

#[async_trait]
impl AppointmentStore for SqliteStore {
    async fn find_by_idempotency_key(&self, key: &str) -> anyhow::Result<Option<Appointment>> {
        let key = key.to_string();
        self.call(move |conn| queries::get_appointment_by_idempotency_key(conn, &key))
            .await?
    }

    async fn active_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Appointment>> {
        self.call(move |conn| queries::get_active_appointments_in_range(conn, &from, &to))
            .await?
    }
}
