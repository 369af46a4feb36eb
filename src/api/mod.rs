//! HTTP API module
//! 
//! Loopback bridge between the browser UI and the timer engine.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/state", get(state_handler))
        .route("/timers", get(list_timers_handler).post(add_timer_handler))
        .route("/timers/:id", patch(update_timer_handler).delete(delete_timer_handler))
        .route("/timers/:id/start", post(start_timer_handler))
        .route("/timers/:id/pause", post(pause_timer_handler))
        .route("/timers/:id/reset", post(reset_timer_handler))
        .route("/timers/:id/complete", post(complete_timer_handler))
        // Bulk actions per category
        .route("/categories", get(categories_handler))
        .route("/categories/:category/start", post(start_category_handler))
        .route("/categories/:category/pause", post(pause_category_handler))
        .route("/categories/:category/reset", post(reset_category_handler))
        .route("/history", get(history_handler))
        .route("/alerts", get(alerts_handler))
        .route("/theme", get(get_theme_handler).put(set_theme_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
