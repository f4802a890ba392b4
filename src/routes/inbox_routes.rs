// src/routes/inbox_routes.rs
//
// Read side of the dispatcher's output: reminders and messages for the
// authenticated user, newest first, plus the explicit acknowledgment and
// read/unread toggles. Nothing here creates reminders or messages.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    engine::store::{self, MessageRow, ReminderRow},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reminders", get(list_reminders))
        .route("/reminders/{reminder_id}/ack", post(ack_reminder))
        .route("/messages", get(list_messages))
        .route("/messages/{message_id}/read", post(mark_message_read))
        .route("/messages/{message_id}/unread", post(mark_message_unread))
}

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

/* ============================================================
   Reminders
   ============================================================ */

pub async fn list_reminders(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<ReminderRow>>>, ApiError> {
    let items = store::list_reminders_for_user(&state.db, auth.user_id).await?;
    Ok(Json(ApiOk { data: items }))
}

pub async fn ack_reminder(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(reminder_id): Path<Uuid>,
) -> Result<Json<ApiOk<bool>>, ApiError> {
    let done = store::ack_reminder(&state.db, reminder_id, auth.user_id).await?;
    if !done {
        return Err(ApiError::NotFound("NOT_FOUND", "reminder not found".into()));
    }
    Ok(Json(ApiOk { data: true }))
}

/* ============================================================
   Messages
   ============================================================ */

pub async fn list_messages(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<MessageRow>>>, ApiError> {
    let items = store::list_messages_for_user(&state.db, auth.user_id).await?;
    Ok(Json(ApiOk { data: items }))
}

async fn set_read_flag(
    state: &AppState,
    auth: &AuthContext,
    message_id: Uuid,
    is_read: bool,
) -> Result<Json<ApiOk<bool>>, ApiError> {
    let updated = store::set_message_read(&state.db, message_id, auth.user_id, is_read).await?;
    if !updated {
        return Err(ApiError::NotFound("NOT_FOUND", "message not found".into()));
    }
    Ok(Json(ApiOk { data: true }))
}

pub async fn mark_message_read(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(message_id): Path<Uuid>,
) -> Result<Json<ApiOk<bool>>, ApiError> {
    set_read_flag(&state, &auth, message_id, true).await
}

pub async fn mark_message_unread(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(message_id): Path<Uuid>,
) -> Result<Json<ApiOk<bool>>, ApiError> {
    set_read_flag(&state, &auth, message_id, false).await
}
