use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::jobs::posts::post_owner;
use crate::messaging::Exchange;
use crate::models::message::Message;
use crate::models::user::UserType;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub receiver_id: Uuid,
    pub message_text: String,
    pub job_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub receiver_id: Uuid,
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct RespondResponse {
    pub reply: String,
}

fn require_text(text: &str, field: &str) -> Result<(), AppError> {
    if text.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// POST /api/messages
pub async fn handle_send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Exchange>), AppError> {
    require_text(&req.message_text, "message_text")?;
    if req.receiver_id == auth.user_id {
        return Err(AppError::Validation("cannot message yourself".to_string()));
    }

    let exchange = state
        .relay
        .interact(auth.user_id, req.receiver_id, &req.message_text, req.job_id)
        .await?;
    Ok((StatusCode::CREATED, Json(exchange)))
}

/// POST /api/jobs/:id/respond
pub async fn handle_respond(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<Uuid>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<RespondResponse>, AppError> {
    auth.require(UserType::Company)?;
    require_text(&req.response, "response")?;

    let owner_id = post_owner(&state.db, job_id).await?;
    if owner_id != auth.user_id {
        return Err(AppError::Forbidden);
    }

    let reply = state
        .relay
        .respond_to_applicant(auth.user_id, req.receiver_id, job_id, &req.response)
        .await?;
    Ok(Json(RespondResponse { reply }))
}

/// GET /api/conversations/:id
pub async fn handle_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(other_id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, AppError> {
    let messages: Vec<Message> = sqlx::query_as(
        r#"
        SELECT * FROM messages
        WHERE deleted_at IS NULL
          AND ((sender_id = $1 AND receiver_id = $2) OR (sender_id = $2 AND receiver_id = $1))
        ORDER BY created_at DESC
        "#,
    )
    .bind(auth.user_id)
    .bind(other_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(messages))
}

/// GET /api/messages/:id
pub async fn handle_get_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Message>, AppError> {
    let message: Message =
        sqlx::query_as("SELECT * FROM messages WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message {id} not found")))?;

    if message.sender_id != auth.user_id && message.receiver_id != auth.user_id {
        return Err(AppError::Forbidden);
    }
    Ok(Json(message))
}
