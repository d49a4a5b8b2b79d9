mod config;
mod db;
mod drive;
mod errors;
mod extraction;
mod grading;
mod history;
mod llm_client;
mod models;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::drive::DriveClient;
use crate::grading::grader::Grader;
use crate::llm_client::{build_provider, http_client};
use crate::routes::build_router;
use crate::state::AppState;

/// Uploads (scans, PDFs, DOCX) are capped at 20 MB.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Xaminai API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL and apply migrations
    let db = create_pool(&config.database_url, config.database_max_connections).await?;
    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("Failed to run database migrations")?;

    // Initialize model providers (one HTTP client shared by all outbound calls)
    let http = http_client()?;
    let text = build_provider(config.text_provider, &config, http.clone());
    let vision = build_provider(config.vision_provider, &config, http.clone());
    info!(
        "Text grading via {} ({}), vision via {} ({})",
        text.name(),
        text.model(),
        vision.name(),
        vision.model()
    );
    let grader = Grader::new(text, vision);

    // Initialize Google Drive (optional)
    let drive = match config.google_service_account_json.as_deref() {
        Some(key_json) => {
            let client = DriveClient::from_service_account_json(http, key_json)
                .context("GOOGLE_SERVICE_ACCOUNT_JSON is invalid")?;
            info!("Drive client initialized for {}", client.client_email());
            Some(Arc::new(client))
        }
        None => {
            warn!("GOOGLE_SERVICE_ACCOUNT_JSON not set; Drive routes are disabled");
            None
        }
    };

    let state = AppState { db, grader, drive };

    // Build router
    let app = build_router(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
