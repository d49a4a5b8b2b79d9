use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service status plus which model backs each grading role.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let text = state.grader.text_provider();
    let vision = state.grader.vision_provider();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "xaminai-api",
        "providers": {
            "text": { "backend": text.name(), "model": text.model() },
            "vision": { "backend": vision.name(), "model": vision.model() }
        },
        "drive_enabled": state.drive.is_some()
    }))
}
