use std::env;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    /// Deadline for the atomic reservation write.
    pub reserve_timeout_ms: u64,
    /// Width of the range used when a caller omits `to`.
    pub default_range_days: i64,
    pub alternatives_horizon_days: i64,
    pub next_slots_limit: usize,
    pub next_days_limit: usize,
    pub format_alternatives_limit: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: var_or("PORT", 3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "booking.db".to_string()),
            reserve_timeout_ms: var_or("RESERVE_TIMEOUT_MS", 3000),
            default_range_days: var_or("DEFAULT_RANGE_DAYS", 14),
            alternatives_horizon_days: var_or("ALTERNATIVES_HORIZON_DAYS", 60),
            next_slots_limit: var_or("NEXT_SLOTS_LIMIT", 5),
            next_days_limit: var_or("NEXT_DAYS_LIMIT", 5),
            format_alternatives_limit: var_or("FORMAT_ALTERNATIVES_LIMIT", 3),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: "booking.db".to_string(),
            reserve_timeout_ms: 3000,
            default_range_days: 14,
            alternatives_horizon_days: 60,
            next_slots_limit: 5,
            next_days_limit: 5,
            format_alternatives_limit: 3,
        }
    }
}

fn var_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
