use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};

use crate::errors::ReserveError;
use crate::models::{
    Appointment, AppointmentStatus, AvailabilitySlot, ConflictEvent, Service, ServiceFormat,
    ServiceStatus, SlotSource, SlotStatus,
};

// UTC, fixed width: lexical order matches chronological order.
const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

/// Formats a query bound rounded up to the next whole second.
///
/// Stored instants carry no fractions, so `col >= bound` and `col < bound`
/// against the rounded-up bound match the exact comparison.
fn fmt_bound_ceil(ts: &DateTime<Utc>) -> String {
    let whole = ts.trunc_subsecs(0);
    if whole < *ts {
        fmt_ts(&(whole + Duration::seconds(1)))
    } else {
        fmt_ts(&whole)
    }
}

fn parse_ts(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, TS_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ── Services ──

const SERVICE_COLUMNS: &str =
    "id, slug, title, format, duration_minutes, price_cents, deposit_cents, status, topic_code";

pub fn insert_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, slug, title, format, duration_minutes, price_cents,
                               deposit_cents, status, topic_code)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            service.id,
            service.slug,
            service.title,
            service.format.as_str(),
            service.duration_minutes,
            service.price_cents,
            service.deposit_cents,
            service.status.as_str(),
            service.topic_code,
        ],
    )
    .with_context(|| format!("failed to insert service {}", service.slug))?;
    Ok(())
}

pub fn get_service_by_slug(conn: &Connection, slug: &str) -> anyhow::Result<Option<Service>> {
    let service = conn
        .query_row(
            &format!("SELECT {SERVICE_COLUMNS} FROM services WHERE slug = ?1"),
            params![slug],
            parse_service_row,
        )
        .optional()
        .context("failed to load service")?;
    Ok(service)
}

pub fn get_services_by_topic(conn: &Connection, topic_code: &str) -> anyhow::Result<Vec<Service>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SERVICE_COLUMNS} FROM services WHERE topic_code = ?1 ORDER BY slug ASC"
    ))?;
    let rows = stmt.query_map(params![topic_code], parse_service_row)?;

    let mut services = vec![];
    for row in rows {
        services.push(row?);
    }
    Ok(services)
}

fn parse_service_row(row: &rusqlite::Row) -> rusqlite::Result<Service> {
    let format_str: String = row.get(3)?;
    let format = ServiceFormat::parse(&format_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            format!("unknown service format: {format_str}").into(),
        )
    })?;
    let status_str: String = row.get(7)?;

    Ok(Service {
        id: row.get(0)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        format,
        duration_minutes: row.get(4)?,
        price_cents: row.get(5)?,
        deposit_cents: row.get(6)?,
        status: ServiceStatus::parse(&status_str),
        topic_code: row.get(8)?,
    })
}

// ── Availability Slots ──

const SLOT_COLUMNS: &str = "id, service_id, start_at, end_at, status, source, external_event_id";

pub fn insert_slot(conn: &Connection, slot: &AvailabilitySlot) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO availability_slots (id, service_id, start_at, end_at, status, source,
                                         external_event_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            slot.id,
            slot.service_id,
            fmt_ts(&slot.start_at),
            fmt_ts(&slot.end_at),
            slot.status.as_str(),
            slot.source.as_str(),
            slot.external_event_id,
        ],
    )
    .with_context(|| format!("failed to insert slot {}", slot.id))?;
    Ok(())
}

pub fn get_slot(conn: &Connection, id: &str) -> anyhow::Result<Option<AvailabilitySlot>> {
    let slot = conn
        .query_row(
            &format!("SELECT {SLOT_COLUMNS} FROM availability_slots WHERE id = ?1"),
            params![id],
            parse_slot_row,
        )
        .optional()
        .context("failed to load slot")?;
    Ok(slot)
}

/// Available slots of one service whose start lies in `[from, to)`.
pub fn get_available_slots(
    conn: &Connection,
    service_id: &str,
    from: &DateTime<Utc>,
    to: &DateTime<Utc>,
) -> anyhow::Result<Vec<AvailabilitySlot>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SLOT_COLUMNS} FROM availability_slots
         WHERE service_id = ?1 AND status = 'available' AND start_at >= ?2 AND start_at < ?3
         ORDER BY start_at ASC, id ASC"
    ))?;
    let rows = stmt.query_map(
        params![service_id, fmt_bound_ceil(from), fmt_bound_ceil(to)],
        parse_slot_row,
    )?;

    let mut slots = vec![];
    for row in rows {
        slots.push(row?);
    }
    Ok(slots)
}

/// Reserved or blocked slots of any service overlapping `[from, to)`.
pub fn get_busy_slots(
    conn: &Connection,
    from: &DateTime<Utc>,
    to: &DateTime<Utc>,
) -> anyhow::Result<Vec<AvailabilitySlot>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SLOT_COLUMNS} FROM availability_slots
         WHERE status IN ('reserved', 'blocked') AND start_at < ?2 AND end_at > ?1
         ORDER BY start_at ASC"
    ))?;
    let rows = stmt.query_map(params![fmt_ts(from), fmt_bound_ceil(to)], parse_slot_row)?;

    let mut slots = vec![];
    for row in rows {
        slots.push(row?);
    }
    Ok(slots)
}

fn parse_slot_row(row: &rusqlite::Row) -> rusqlite::Result<AvailabilitySlot> {
    let status_str: String = row.get(4)?;
    let source_str: String = row.get(5)?;

    Ok(AvailabilitySlot {
        id: row.get(0)?,
        service_id: row.get(1)?,
        start_at: parse_ts(row, 2)?,
        end_at: parse_ts(row, 3)?,
        status: SlotStatus::parse(&status_str),
        source: SlotSource::parse(&source_str),
        external_event_id: row.get(6)?,
    })
}

// ── Appointments ──

const APPOINTMENT_COLUMNS: &str = "id, service_id, slot_id, client_user_id, lead_id, \
     idempotency_key, start_at, end_at, timezone, format, status, created_at, updated_at";

pub fn get_appointment_by_idempotency_key(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<Appointment>> {
    let appointment = conn
        .query_row(
            &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE idempotency_key = ?1"),
            params![key],
            parse_appointment_row,
        )
        .optional()
        .context("failed to look up idempotency key")?;
    Ok(appointment)
}

/// Non-cancelled appointments overlapping `[from, to)`, across all services.
pub fn get_active_appointments_in_range(
    conn: &Connection,
    from: &DateTime<Utc>,
    to: &DateTime<Utc>,
) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE status <> 'cancelled' AND start_at < ?2 AND end_at > ?1
         ORDER BY start_at ASC"
    ))?;
    let rows = stmt.query_map(
        params![fmt_ts(from), fmt_bound_ceil(to)],
        parse_appointment_row,
    )?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row?);
    }
    Ok(appointments)
}

/// Inserts the appointment and flips its slot to reserved in one transaction.
///
/// The unique indexes on `appointments` decide races: a second live
/// appointment for the slot or a reused idempotency key aborts the whole
/// transaction and nothing is written.
pub fn reserve_slot(conn: &mut Connection, appointment: &Appointment) -> Result<(), ReserveError> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .context("failed to begin reservation")?;

    tx.execute(
        "INSERT INTO appointments (id, service_id, slot_id, client_user_id, lead_id,
                                   idempotency_key, start_at, end_at, timezone, format, status,
                                   created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            appointment.id,
            appointment.service_id,
            appointment.slot_id,
            appointment.client_user_id,
            appointment.lead_id,
            appointment.idempotency_key,
            fmt_ts(&appointment.start_at),
            fmt_ts(&appointment.end_at),
            appointment.timezone,
            appointment.format.as_str(),
            appointment.status.as_str(),
            fmt_ts(&appointment.created_at),
            fmt_ts(&appointment.updated_at),
        ],
    )
    .map_err(classify_insert_error)?;

    let updated = tx
        .execute(
            "UPDATE availability_slots SET status = 'reserved', updated_at = ?1
             WHERE id = ?2 AND status = 'available'",
            params![fmt_ts(&appointment.created_at), appointment.slot_id],
        )
        .context("failed to mark slot reserved")?;

    // Blocked or already reserved by a flow that bypassed the index.
    if updated == 0 {
        return Err(ReserveError::SlotTaken);
    }

    tx.commit().context("failed to commit reservation")?;
    Ok(())
}

fn classify_insert_error(err: rusqlite::Error) -> ReserveError {
    if let rusqlite::Error::SqliteFailure(code, Some(msg)) = &err {
        if code.code == ErrorCode::ConstraintViolation {
            if msg.contains("appointments.idempotency_key") {
                return ReserveError::DuplicateKey;
            }
            if msg.contains("appointments.slot_id") {
                return ReserveError::SlotTaken;
            }
        }
    }
    ReserveError::Storage(anyhow::Error::new(err).context("failed to insert appointment"))
}

fn parse_appointment_row(row: &rusqlite::Row) -> rusqlite::Result<Appointment> {
    let format_str: String = row.get(9)?;
    let format = ServiceFormat::parse(&format_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            9,
            Type::Text,
            format!("unknown appointment format: {format_str}").into(),
        )
    })?;
    let status_str: String = row.get(10)?;

    Ok(Appointment {
        id: row.get(0)?,
        service_id: row.get(1)?,
        slot_id: row.get(2)?,
        client_user_id: row.get(3)?,
        lead_id: row.get(4)?,
        idempotency_key: row.get(5)?,
        start_at: parse_ts(row, 6)?,
        end_at: parse_ts(row, 7)?,
        timezone: row.get(8)?,
        format,
        status: AppointmentStatus::parse(&status_str),
        created_at: parse_ts(row, 11)?,
        updated_at: parse_ts(row, 12)?,
    })
}

// ── Conflicts ──

pub fn insert_conflict_event(conn: &Connection, event: &ConflictEvent) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO booking_conflicts (kind, service_id, slot_id, idempotency_key, occurred_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            event.kind.as_str(),
            event.service_id,
            event.slot_id,
            event.idempotency_key,
            fmt_ts(&event.occurred_at),
        ],
    )
    .context("failed to record conflict event")?;
    Ok(())
}
