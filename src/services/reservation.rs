use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::errors::{BookingError, ReserveError};
use crate::models::{
    Appointment, AppointmentStatus, AvailabilitySlot, ConflictEvent, ConflictKind, Service,
    ServiceFormat, SlotStatus,
};
use crate::services::conflicts::{self, ConflictTracker};
use crate::services::store::BookingStore;
use crate::services::time_window::parse_timezone;

const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct StartBooking {
    pub service_slug: String,
    pub slot_id: String,
    pub timezone: String,
    pub format: Option<String>,
    pub idempotency_key: Option<String>,
    pub client_user_id: Option<String>,
    pub lead_id: Option<String>,
}

/// A successful (or replayed) reservation together with the service it
/// was made for.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub appointment: Appointment,
    pub service: Service,
    /// True when an earlier request with the same idempotency key already
    /// created this appointment and nothing was written.
    pub replayed: bool,
}

/// Runs the start-booking protocol.
///
/// Mutual exclusion comes only from the store's unique indexes, so any
/// number of coordinator instances may run against the same database.
pub struct ReservationCoordinator {
    store: Arc<dyn BookingStore>,
    conflicts: Arc<dyn ConflictTracker>,
    write_timeout: Duration,
}

impl ReservationCoordinator {
    pub fn new(
        store: Arc<dyn BookingStore>,
        conflicts: Arc<dyn ConflictTracker>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            store,
            conflicts,
            write_timeout,
        }
    }

    pub async fn start_booking(&self, req: StartBooking) -> Result<Reservation, BookingError> {
        // Everything that can be rejected without I/O goes first.
        parse_timezone(&req.timezone)?;
        let requested_format = match req.format.as_deref() {
            Some(raw) => Some(
                ServiceFormat::parse(raw)
                    .ok_or_else(|| BookingError::Invalid(format!("unsupported format: {raw}")))?,
            ),
            None => None,
        };
        let idempotency_key = normalize_key(req.idempotency_key.as_deref())?;

        // 1. Resolve service, slot and format.
        let service = self
            .store
            .find_by_slug(&req.service_slug)
            .await?
            .filter(Service::is_published)
            .ok_or_else(|| BookingError::NotFound(format!("service {}", req.service_slug)))?;

        let slot = self
            .store
            .get_slot(&req.slot_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("slot {}", req.slot_id)))?;

        if let Some(owner) = &slot.service_id {
            if owner != &service.id {
                return Err(BookingError::NotFound(format!(
                    "slot {} for service {}",
                    slot.id, service.slug
                )));
            }
        }

        if slot.start_at <= Utc::now() {
            return Err(BookingError::Invalid(format!("slot {} has already started", slot.id)));
        }

        let format = service.resolve_format(requested_format).ok_or_else(|| {
            BookingError::Invalid(format!(
                "format {} is not offered by service {}",
                req.format.as_deref().unwrap_or_default(),
                service.slug
            ))
        })?;

        // 2. Idempotent replay.
        if let Some(key) = &idempotency_key {
            if let Some(existing) = self.store.find_by_idempotency_key(key).await? {
                return self.replay(existing, service, &slot, format, key);
            }
        }

        // 3. Fast path on the cached slot status; only saves a write.
        if slot.status != SlotStatus::Available {
            self.track(ConflictKind::SlotConflict, &service, &slot, idempotency_key.clone());
            tracing::info!(slot_id = %slot.id, status = slot.status.as_str(), "slot not available");
            return Err(BookingError::SlotConflict(slot.id));
        }

        // 4. Authoritative conditional write.
        let now = Utc::now();
        let appointment = Appointment {
            id: uuid::Uuid::new_v4().to_string(),
            service_id: service.id.clone(),
            slot_id: slot.id.clone(),
            client_user_id: req.client_user_id,
            lead_id: req.lead_id,
            idempotency_key: idempotency_key.clone(),
            start_at: slot.start_at,
            end_at: slot.end_at,
            timezone: req.timezone.trim().to_string(),
            format,
            status: AppointmentStatus::PendingPayment,
            created_at: now,
            updated_at: now,
        };

        let write =
            tokio::time::timeout(self.write_timeout, self.store.reserve(&appointment)).await;

        match write {
            Ok(Ok(())) => {
                tracing::info!(
                    appointment_id = %appointment.id,
                    slot_id = %slot.id,
                    service = %service.slug,
                    "booking started"
                );
                Ok(Reservation {
                    appointment,
                    service,
                    replayed: false,
                })
            }
            // 5. Lost the race; a duplicate submission may be the winner.
            Ok(Err(ReserveError::SlotTaken)) => {
                if let Some(key) = &idempotency_key {
                    if let Some(existing) = self.store.find_by_idempotency_key(key).await? {
                        if existing.matches_intent(&service.id, &slot.id, format) {
                            return self.replay(existing, service, &slot, format, key);
                        }
                    }
                }
                self.track(ConflictKind::SlotConflict, &service, &slot, idempotency_key);
                tracing::warn!(slot_id = %slot.id, "lost reservation race");
                Err(BookingError::SlotConflict(slot.id))
            }
            Ok(Err(ReserveError::DuplicateKey)) => {
                let key = idempotency_key.unwrap_or_default();
                match self.store.find_by_idempotency_key(&key).await? {
                    Some(existing) => self.replay(existing, service, &slot, format, &key),
                    None => Err(anyhow::anyhow!(
                        "idempotency key {key} reported as duplicate but not found"
                    )
                    .into()),
                }
            }
            Ok(Err(ReserveError::Storage(e))) => Err(BookingError::Storage(e)),
            // 6. The write may still land; the caller retries the same request.
            Err(_) => {
                self.track(ConflictKind::Timeout, &service, &slot, idempotency_key);
                tracing::warn!(
                    slot_id = %slot.id,
                    timeout_ms = self.write_timeout.as_millis() as u64,
                    "reservation write timed out"
                );
                Err(BookingError::Timeout(self.write_timeout.as_millis() as u64))
            }
        }
    }

    fn replay(
        &self,
        existing: Appointment,
        service: Service,
        slot: &AvailabilitySlot,
        format: ServiceFormat,
        key: &str,
    ) -> Result<Reservation, BookingError> {
        if !existing.matches_intent(&service.id, &slot.id, format) {
            tracing::warn!(
                idempotency_key = key,
                existing_slot = %existing.slot_id,
                requested_slot = %slot.id,
                "idempotency key reused for a different booking"
            );
            return Err(BookingError::IdempotencyConflict(key.to_string()));
        }

        tracing::info!(appointment_id = %existing.id, idempotency_key = key, "idempotent replay");
        Ok(Reservation {
            appointment: existing,
            service,
            replayed: true,
        })
    }

    fn track(
        &self,
        kind: ConflictKind,
        service: &Service,
        slot: &AvailabilitySlot,
        idempotency_key: Option<String>,
    ) {
        conflicts::emit(
            &self.conflicts,
            ConflictEvent {
                kind,
                service_id: service.id.clone(),
                slot_id: slot.id.clone(),
                idempotency_key,
                occurred_at: Utc::now(),
            },
        );
    }
}

fn normalize_key(raw: Option<&str>) -> Result<Option<String>, BookingError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(key) if key.len() > MAX_IDEMPOTENCY_KEY_LEN => Err(BookingError::Invalid(format!(
            "client_request_id longer than {MAX_IDEMPOTENCY_KEY_LEN} characters"
        ))),
        Some(key) => Ok(Some(key.to_string())),
    }
}
