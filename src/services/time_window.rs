use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;

use crate::errors::BookingError;
use crate::models::TimeWindow;

const MORNING_START_HOUR: u32 = 6;
const MORNING_END_HOUR: u32 = 15;

/// Parses an IANA timezone identifier such as `Europe/Moscow`.
pub fn parse_timezone(name: &str) -> Result<Tz, BookingError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| BookingError::Invalid(format!("unknown timezone: {name}")))
}

/// Buckets an instant by its local weekday and hour in `tz`.
pub fn classify(instant: DateTime<Utc>, tz: Tz) -> TimeWindow {
    let local = instant.with_timezone(&tz);
    match local.weekday() {
        Weekday::Sat | Weekday::Sun => TimeWindow::Weekend,
        _ if (MORNING_START_HOUR..MORNING_END_HOUR).contains(&local.hour()) => {
            TimeWindow::WeekdayMorning
        }
        _ => TimeWindow::WeekdayEvening,
    }
}
