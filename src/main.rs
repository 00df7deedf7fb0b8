use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use slotbook::config::AppConfig;
use slotbook::db;
use slotbook::handlers;
use slotbook::services::conflicts::SqliteConflictTracker;
use slotbook::services::store::SqliteStore;
use slotbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    let store = SqliteStore::new(conn);
    let conflicts = SqliteConflictTracker::new(store.connection());

    tracing::info!(
        reserve_timeout_ms = config.reserve_timeout_ms,
        horizon_days = config.alternatives_horizon_days,
        "booking core configured"
    );

    let state = Arc::new(AppState::new(
        Arc::new(store),
        Arc::new(conflicts),
        config.clone(),
    ));

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/bookings", post(handlers::booking::start_booking))
        .route("/api/slots", get(handlers::slots::available_slots))
        .route("/api/alternatives", get(handlers::alternatives::get_alternatives))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
