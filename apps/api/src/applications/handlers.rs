use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::info;
use uuid::Uuid;

use crate::applications::SubmittedApplication;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::jobs::posts::post_owner;
use crate::models::job::{ApplicationStatus, JobApplication};
use crate::models::user::UserType;
use crate::state::AppState;

const RESUME_FIELD: &str = "resume";

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplicationFilter {
    pub status: Option<String>,
    pub user_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
}

/// An application with the applicant's contact details, as shown to the job owner.
#[derive(Debug, Serialize, FromRow)]
pub struct ApplicantRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub application: JobApplication,
    pub applicant_name: String,
    pub applicant_email: String,
}

/// POST /api/jobs/:id/apply
pub async fn handle_apply(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmittedApplication>), AppError> {
    auth.require(UserType::Applicant)?;

    let mut resume: Option<Bytes> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() == Some(RESUME_FIELD) {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Invalid resume upload: {e}")))?;
            resume = Some(data);
            break;
        }
    }

    let resume = resume
        .filter(|data| !data.is_empty())
        .ok_or_else(|| AppError::Validation("No resume file provided".to_string()))?;
    check_resume_size(resume.len(), state.config.max_resume_bytes)?;

    let submitted = state
        .reviewer
        .submit_application(job_id, auth.user_id, &resume)
        .await?;

    Ok((StatusCode::CREATED, Json(submitted)))
}

/// GET /api/applications/:id
pub async fn handle_get_application(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<JobApplication>, AppError> {
    let (application, owner_id) = load_application(&state, id).await?;
    if auth.user_id != application.user_id && auth.user_id != owner_id {
        return Err(AppError::Forbidden);
    }
    Ok(Json(application))
}

/// PATCH /api/applications/:id
pub async fn handle_update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdate>,
) -> Result<Json<JobApplication>, AppError> {
    let status: ApplicationStatus = req.status.parse().map_err(AppError::Validation)?;

    let (_, owner_id) = load_application(&state, id).await?;
    if auth.user_id != owner_id {
        return Err(AppError::Forbidden);
    }

    let application: JobApplication = sqlx::query_as(
        r#"
        UPDATE job_applications
        SET status = $1, updated_at = now()
        WHERE id = $2 AND deleted_at IS NULL
        RETURNING *
        "#,
    )
    .bind(status.as_str())
    .bind(id)
    .fetch_one(&state.db)
    .await?;

    info!(application_id = %id, %status, "Application status updated");
    Ok(Json(application))
}

/// GET /api/jobs/:id/applications
pub async fn handle_list_for_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Vec<ApplicantRow>>, AppError> {
    let owner_id = post_owner(&state.db, job_id).await?;
    if auth.user_id != owner_id {
        return Err(AppError::Forbidden);
    }

    let rows: Vec<ApplicantRow> = sqlx::query_as(
        r#"
        SELECT a.*, u.name AS applicant_name, u.email AS applicant_email
        FROM job_applications a
        JOIN users u ON u.id = a.user_id
        WHERE a.job_id = $1 AND a.deleted_at IS NULL
        ORDER BY a.created_at ASC
        "#,
    )
    .bind(job_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows))
}

/// GET /api/applications?status=&user_id=&job_id=
///
/// Applicants only ever see their own applications; companies only see
/// applications to their own job posts.
pub async fn handle_list_applications(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<ApplicationFilter>,
) -> Result<Json<Vec<JobApplication>>, AppError> {
    let status = filter
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<ApplicationStatus>)
        .transpose()
        .map_err(AppError::Validation)?;

    let (user_id, owner_id) = scope_filter(&auth, filter.user_id)?;

    let applications: Vec<JobApplication> = sqlx::query_as(
        r#"
        SELECT a.*
        FROM job_applications a
        JOIN job_posts p ON p.id = a.job_id
        WHERE a.deleted_at IS NULL
          AND ($1::text IS NULL OR a.status = $1)
          AND ($2::uuid IS NULL OR a.user_id = $2)
          AND ($3::uuid IS NULL OR a.job_id = $3)
          AND ($4::uuid IS NULL OR p.user_id = $4)
        ORDER BY a.created_at DESC
        "#,
    )
    .bind(status.map(|s| s.as_str()))
    .bind(user_id)
    .bind(filter.job_id)
    .bind(owner_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(applications))
}

fn check_resume_size(len: usize, max: usize) -> Result<(), AppError> {
    if len > max {
        return Err(AppError::Validation(format!(
            "Resume is {len} bytes; the limit is {max}"
        )));
    }
    Ok(())
}

/// Narrows a listing to what the caller may see: `(applicant filter, job owner filter)`.
fn scope_filter(
    auth: &AuthUser,
    requested_user: Option<Uuid>,
) -> Result<(Option<Uuid>, Option<Uuid>), AppError> {
    match auth.user_type {
        UserType::Applicant => match requested_user {
            Some(id) if id != auth.user_id => Err(AppError::Forbidden),
            _ => Ok((Some(auth.user_id), None)),
        },
        UserType::Company => Ok((requested_user, Some(auth.user_id))),
    }
}

/// Loads a live application together with the id of its job post's owner.
async fn load_application(state: &AppState, id: Uuid) -> Result<(JobApplication, Uuid), AppError> {
    let application: JobApplication =
        sqlx::query_as("SELECT * FROM job_applications WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))?;

    let owner_id = post_owner(&state.db, application.job_id).await?;

    Ok((application, owner_id))
}
