use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::services::alternatives::{AlternativesEngine, AlternativesLimits};
use crate::services::conflicts::ConflictTracker;
use crate::services::reservation::ReservationCoordinator;
use crate::services::store::BookingStore;

pub struct AppState {
    pub store: Arc<dyn BookingStore>,
    pub coordinator: ReservationCoordinator,
    pub alternatives: AlternativesEngine,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(
        store: Arc<dyn BookingStore>,
        conflicts: Arc<dyn ConflictTracker>,
        config: AppConfig,
    ) -> Self {
        let coordinator = ReservationCoordinator::new(
            Arc::clone(&store),
            conflicts,
            Duration::from_millis(config.reserve_timeout_ms),
        );
        let alternatives =
            AlternativesEngine::new(Arc::clone(&store), AlternativesLimits::from_config(&config));

        Self {
            store,
            coordinator,
            alternatives,
            config,
        }
    }
}
