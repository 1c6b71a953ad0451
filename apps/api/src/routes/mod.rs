pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::applications::handlers as applications;
use crate::auth::handlers as auth;
use crate::jobs::{posts, saved};
use crate::messaging::handlers as messaging;
use crate::state::AppState;

/// Room for multipart boundaries and part headers around the resume itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let resume_limit =
        DefaultBodyLimit::max(state.config.max_resume_bytes + MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/health", get(health::health_handler))
        // Auth
        .route("/auth/register", post(auth::handle_register))
        .route("/auth/login", post(auth::handle_login))
        .route(
            "/api/user/profile",
            get(auth::handle_get_profile).put(auth::handle_update_profile),
        )
        // Job posts
        .route(
            "/api/jobs",
            get(posts::handle_list_posts).post(posts::handle_create_post),
        )
        .route(
            "/api/jobs/:id",
            get(posts::handle_get_post)
                .put(posts::handle_update_post)
                .delete(posts::handle_delete_post),
        )
        .route(
            "/api/companies/:id/jobs",
            get(posts::handle_list_company_posts),
        )
        // Applications
        .route(
            "/api/jobs/:id/apply",
            post(applications::handle_apply).layer(resume_limit),
        )
        .route(
            "/api/jobs/:id/applications",
            get(applications::handle_list_for_job),
        )
        .route(
            "/api/applications",
            get(applications::handle_list_applications),
        )
        .route(
            "/api/applications/:id",
            get(applications::handle_get_application).patch(applications::handle_update_status),
        )
        // Saved jobs
        .route("/api/saved-jobs", get(saved::handle_list_saved))
        .route(
            "/api/saved-jobs/:id",
            get(saved::handle_check_saved)
                .post(saved::handle_save)
                .delete(saved::handle_unsave),
        )
        // Messaging
        .route("/api/messages", post(messaging::handle_send_message))
        .route("/api/messages/:id", get(messaging::handle_get_message))
        .route("/api/jobs/:id/respond", post(messaging::handle_respond))
        .route(
            "/api/conversations/:id",
            get(messaging::handle_conversation),
        )
        .with_state(state)
}
