use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::{is_unique_violation, AppError};
use crate::models::job::{JobPost, SavedJob};
use crate::state::AppState;

#[derive(Debug, Serialize, FromRow)]
pub struct SavedJobRow {
    pub saved_id: Uuid,
    pub saved_at: DateTime<Utc>,
    #[sqlx(flatten)]
    pub job: JobPost,
}

#[derive(Debug, Serialize)]
pub struct SavedStatus {
    pub saved: bool,
}

/// POST /api/saved-jobs/:id
pub async fn handle_save(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<Uuid>,
) -> Result<(StatusCode, Json<SavedJob>), AppError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM job_posts WHERE id = $1 AND deleted_at IS NULL)",
    )
    .bind(job_id)
    .fetch_one(&state.db)
    .await?;
    if !exists {
        return Err(AppError::NotFound(format!("Job post {job_id} not found")));
    }

    let saved: SavedJob = sqlx::query_as(
        "INSERT INTO saved_jobs (id, user_id, job_id) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(auth.user_id)
    .bind(job_id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Job is already saved".to_string())
        } else {
            AppError::Database(e)
        }
    })?;

    Ok((StatusCode::CREATED, Json(saved)))
}

/// DELETE /api/saved-jobs/:id
pub async fn handle_unsave(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let result = sqlx::query("DELETE FROM saved_jobs WHERE user_id = $1 AND job_id = $2")
        .bind(auth.user_id)
        .bind(job_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Job is not saved".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/saved-jobs
pub async fn handle_list_saved(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<SavedJobRow>>, AppError> {
    let rows: Vec<SavedJobRow> = sqlx::query_as(
        r#"
        SELECT s.id AS saved_id, s.created_at AS saved_at, p.*
        FROM saved_jobs s
        JOIN job_posts p ON p.id = s.job_id
        WHERE s.user_id = $1 AND p.deleted_at IS NULL
        ORDER BY s.created_at DESC
        "#,
    )
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

/// GET /api/saved-jobs/:id
pub async fn handle_check_saved(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<Uuid>,
) -> Result<Json<SavedStatus>, AppError> {
    let saved: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM saved_jobs WHERE user_id = $1 AND job_id = $2)",
    )
    .bind(auth.user_id)
    .bind(job_id)
    .fetch_one(&state.db)
    .await?;
    Ok(Json(SavedStatus { saved }))
}
