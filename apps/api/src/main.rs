mod applications;
mod auth;
mod config;
mod db;
mod errors;
mod jobs;
mod llm_client;
mod messaging;
mod models;
mod repository;
mod routes;
mod state;
mod storage;
#[cfg(test)]
mod testing;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::applications::ApplicationReviewer;
use crate::config::{Config, StorageBackend};
use crate::db::create_pool;
use crate::llm_client::GeminiClient;
use crate::messaging::MessageRelay;
use crate::repository::PgRepository;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::{LocalResumeStore, PdfTextExtractor, ResumeStore, S3ResumeStore};

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

    info!("Starting jobboard API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url).await?;

    // Initialize resume storage
    let store: Arc<dyn ResumeStore> = match &config.storage {
        StorageBackend::Local { upload_dir } => {
            info!("Resume storage: local ({})", upload_dir.display());
            Arc::new(LocalResumeStore::new(upload_dir.clone()))
        }
        StorageBackend::S3 {
            bucket,
            endpoint,
            access_key_id,
            secret_access_key,
        } => Arc::new(S3ResumeStore::connect(bucket, endpoint, access_key_id, secret_access_key).await),
    };
    let extractor = Arc::new(PdfTextExtractor::new(store.clone()));

    // Initialize AI review client
    let gemini = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_endpoint.clone(),
        config.ai_timeout,
    )?);
    info!(
        "AI review client initialized (timeout: {}s)",
        config.ai_timeout.as_secs()
    );

    let repo = Arc::new(PgRepository::new(db.clone()));

    // Build app state
    let state = AppState {
        db,
        reviewer: Arc::new(ApplicationReviewer::new(
            store,
            extractor.clone(),
            gemini.clone(),
            repo.clone(),
            config.analysis_failed_summary.clone(),
        )),
        relay: Arc::new(MessageRelay::new(extractor, gemini, repo)),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
