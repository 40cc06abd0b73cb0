use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use bindsync_bridge::relay::RelayError;
use bindsync_types::api::{
    CreateMessageRequest, CreateMessageResponse, MessageListResponse, ReplyRequest,
};

use crate::state::AppState;

/// Server-enforced page size ceiling.
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

/// Clamp a requested page to what the server will actually serve:
/// limit into [1, 500], offset to non-negative.
fn clamp_page(query: &ListQuery) -> (u32, u32) {
    let limit = query.limit.clamp(1, MAX_LIMIT) as u32;
    let offset = query.offset.max(0) as u32;
    (limit, offset)
}

pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let (limit, offset) = clamp_page(&query);

    // Run the blocking read off the async runtime
    let db = state.store.clone();
    let rows = tokio::task::spawn_blocking(move || db.list_messages(limit, offset))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("Listing messages failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let messages = rows.into_iter().map(|row| row.into_message()).collect();
    Ok(Json(MessageListResponse { messages }))
}

pub async fn get_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.store.clone();
    let row = tokio::task::spawn_blocking(move || db.get_message(&message_id))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("Message lookup failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    match row {
        Some(row) => Ok(Json(row.into_message())),
        None => Err(StatusCode::NOT_FOUND),
    }
}

pub async fn create_message(
    State(state): State<AppState>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let outcome = state
        .relay
        .create_from_api(req.text, req.username, req.reply_to_id)
        .await
        .map_err(relay_error_status)?;

    Ok(Json(CreateMessageResponse {
        id: outcome.id,
        tg_msg_id: outcome.tg_msg_id,
        dc_msg_id: outcome.dc_msg_id,
    }))
}

pub async fn reply_to_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Json(req): Json<ReplyRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    // A malformed id cannot name any stored message.
    let target: Uuid = message_id.parse().map_err(|_| StatusCode::NOT_FOUND)?;

    let outcome = state
        .relay
        .reply_from_api(target, req.text, req.username)
        .await
        .map_err(relay_error_status)?;

    Ok(Json(CreateMessageResponse {
        id: outcome.id,
        tg_msg_id: outcome.tg_msg_id,
        dc_msg_id: outcome.dc_msg_id,
    }))
}

fn relay_error_status(e: RelayError) -> StatusCode {
    match e {
        RelayError::ReplyTargetNotFound(_) => StatusCode::NOT_FOUND,
        RelayError::Store(e) => {
            error!("Store failure in API handler: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
