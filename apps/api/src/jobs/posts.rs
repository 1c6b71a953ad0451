use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::job::JobPost;
use crate::models::user::UserType;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateJobPost {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub salary_range: String,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default)]
    pub job_position: String,
    #[serde(default = "default_open")]
    pub is_open: bool,
}

fn default_quantity() -> i32 {
    1
}

fn default_open() -> bool {
    true
}

impl CreateJobPost {
    fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("title is required".to_string()));
        }
        if self.quantity < 1 {
            return Err(AppError::Validation("quantity must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateJobPost {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    pub quantity: Option<i32>,
    pub job_position: Option<String>,
    pub is_open: Option<bool>,
}

impl UpdateJobPost {
    fn validate(&self) -> Result<(), AppError> {
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(AppError::Validation("title cannot be empty".to_string()));
        }
        if self.quantity.is_some_and(|q| q < 1) {
            return Err(AppError::Validation("quantity must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub status: Option<String>,
}

/// `?status=open|closed` as an `is_open` filter; absent means every post.
fn open_filter(status: Option<&str>) -> Result<Option<bool>, AppError> {
    match status {
        None | Some("") => Ok(None),
        Some("open") => Ok(Some(true)),
        Some("closed") => Ok(Some(false)),
        Some(other) => Err(AppError::Validation(format!(
            "invalid status filter: {other}"
        ))),
    }
}

/// A job post with its company name and number of live applications.
#[derive(Debug, Serialize, FromRow)]
pub struct JobPostDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub post: JobPost,
    pub company_name: Option<String>,
    pub applicant_count: i64,
}

/// POST /api/jobs
pub async fn handle_create_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateJobPost>,
) -> Result<(StatusCode, Json<JobPost>), AppError> {
    auth.require(UserType::Company)?;
    req.validate()?;

    let post: JobPost = sqlx::query_as(
        r#"
        INSERT INTO job_posts
            (id, user_id, title, description, location, salary_range, quantity, job_position, is_open)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth.user_id)
    .bind(req.title.trim())
    .bind(&req.description)
    .bind(&req.location)
    .bind(&req.salary_range)
    .bind(req.quantity)
    .bind(&req.job_position)
    .bind(req.is_open)
    .fetch_one(&state.db)
    .await?;

    info!(job_id = %post.id, company_id = %auth.user_id, "Job post created");
    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /api/jobs
pub async fn handle_list_posts(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<JobListQuery>,
) -> Result<Json<Vec<JobPost>>, AppError> {
    let is_open = open_filter(query.status.as_deref())?;

    let posts: Vec<JobPost> = sqlx::query_as(
        r#"
        SELECT * FROM job_posts
        WHERE deleted_at IS NULL AND ($1::boolean IS NULL OR is_open = $1)
        ORDER BY created_at DESC
        "#,
    )
    .bind(is_open)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(posts))
}

/// GET /api/companies/:id/jobs
pub async fn handle_list_company_posts(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(company_id): Path<Uuid>,
) -> Result<Json<Vec<JobPost>>, AppError> {
    let posts: Vec<JobPost> = sqlx::query_as(
        "SELECT * FROM job_posts WHERE user_id = $1 AND deleted_at IS NULL ORDER BY created_at DESC",
    )
    .bind(company_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(posts))
}

/// GET /api/jobs/:id
pub async fn handle_get_post(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<JobPostDetail>, AppError> {
    let detail: JobPostDetail = sqlx::query_as(
        r#"
        SELECT p.*, u.company_name,
               (SELECT COUNT(*) FROM job_applications a
                WHERE a.job_id = p.id AND a.deleted_at IS NULL) AS applicant_count
        FROM job_posts p
        JOIN users u ON u.id = p.user_id
        WHERE p.id = $1 AND p.deleted_at IS NULL
        "#,
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Job post {id} not found")))?;
    Ok(Json(detail))
}

/// PUT /api/jobs/:id
pub async fn handle_update_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateJobPost>,
) -> Result<Json<JobPost>, AppError> {
    req.validate()?;
    ensure_owner(&state, id, auth.user_id).await?;

    let post: JobPost = sqlx::query_as(
        r#"
        UPDATE job_posts SET
            title        = COALESCE($1, title),
            description  = COALESCE($2, description),
            location     = COALESCE($3, location),
            salary_range = COALESCE($4, salary_range),
            quantity     = COALESCE($5, quantity),
            job_position = COALESCE($6, job_position),
            is_open      = COALESCE($7, is_open),
            updated_at   = now()
        WHERE id = $8 AND deleted_at IS NULL
        RETURNING *
        "#,
    )
    .bind(req.title.as_deref().map(str::trim))
    .bind(req.description.as_deref())
    .bind(req.location.as_deref())
    .bind(req.salary_range.as_deref())
    .bind(req.quantity)
    .bind(req.job_position.as_deref())
    .bind(req.is_open)
    .bind(id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(post))
}

/// DELETE /api/jobs/:id
pub async fn handle_delete_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    ensure_owner(&state, id, auth.user_id).await?;

    sqlx::query("UPDATE job_posts SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL")
        .bind(id)
        .execute(&state.db)
        .await?;

    info!(job_id = %id, "Job post deleted");
    Ok(StatusCode::NO_CONTENT)
}

const LIVE_POST_OWNER: &str =
    "SELECT user_id FROM job_posts WHERE id = $1 AND deleted_at IS NULL";

/// Owner of a live job post. Missing and soft-deleted posts are both 404.
pub(crate) async fn post_owner(db: &PgPool, job_id: Uuid) -> Result<Uuid, AppError> {
    sqlx::query_scalar(LIVE_POST_OWNER)
        .bind(job_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job post {job_id} not found")))
}

/// 404 for a missing post, 403 when `user_id` does not own it.
async fn ensure_owner(state: &AppState, job_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
    let owner_id = post_owner(&state.db, job_id).await?;
    if owner_id != user_id {
        return Err(AppError::Forbidden);
    }
    Ok(())
}
