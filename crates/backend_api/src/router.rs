use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{handlers, state::AppState};

/// Create the main application router with all API endpoints
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        // Read views
        .route("/api/entries", get(handlers::get_entries))
        .route("/api/dashboard", get(handlers::get_dashboard))
        .route("/api/calendar", get(handlers::get_calendar))
        .route("/api/export", get(handlers::export_ledger))
        // Mutations; each persists before responding
        .route("/api/import", post(handlers::import_csv))
        .route("/api/sync", post(handlers::sync_now))
        .route("/api/fx/refresh", post(handlers::refresh_fx))
        .route("/api/ledger", delete(handlers::reset_ledger))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
