pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::errors::AppError;
use crate::grading::handlers;
use crate::history::handlers as history;
use crate::state::AppState;

async fn route_not_found() -> AppError {
    AppError::NotFound("No such route".to_string())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Scored grading (recorded to history)
        .route("/grade", post(handlers::handle_grade))
        .route("/grade/file", post(handlers::handle_grade_file))
        .route("/grade/image", post(handlers::handle_grade_image))
        .route("/grade/drive", post(handlers::handle_grade_drive))
        // Companion guidance (never scored)
        .route("/companion", post(handlers::handle_companion))
        .route("/companion/file", post(handlers::handle_companion_file))
        .route("/companion/image", post(handlers::handle_companion_image))
        .route("/companion/drive", post(handlers::handle_companion_drive))
        // Dashboard
        .route("/dashboard/history", get(history::handle_history))
        .route("/dashboard/export", get(history::handle_export))
        .fallback(route_not_found)
        .with_state(state)
}
