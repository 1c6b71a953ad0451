use std::sync::Arc;

use sqlx::PgPool;

use crate::applications::ApplicationReviewer;
use crate::config::Config;
use crate::messaging::MessageRelay;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    /// Resume submission pipeline (store, extract, record, AI review).
    pub reviewer: Arc<ApplicationReviewer>,
    pub relay: Arc<MessageRelay>,
}
