use std::sync::Arc;

use sqlx::PgPool;

use crate::drive::DriveClient;
use crate::grading::grader::Grader;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub grader: Grader,
    /// `None` when no service account is configured; Drive routes then reject requests.
    pub drive: Option<Arc<DriveClient>>,
}
