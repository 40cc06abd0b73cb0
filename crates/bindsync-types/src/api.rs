use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;

// -- Messages --

fn default_username() -> String {
    "API".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMessageRequest {
    pub text: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub reply_to_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplyRequest {
    pub text: String,
    #[serde(default = "default_username")]
    pub username: String,
}

/// Response to both create and reply. The native ids are null when the
/// corresponding platform dispatch failed or was never attempted.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateMessageResponse {
    pub id: Uuid,
    pub tg_msg_id: Option<i64>,
    pub dc_msg_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageListResponse {
    pub messages: Vec<Message>,
}

// -- Health --

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub runtime: RuntimeStatus,
}

/// Runtime wiring snapshot reported by GET /health.
#[derive(Debug, Serialize, Deserialize)]
pub struct RuntimeStatus {
    pub telegram_connected: bool,
    pub discord_connected: bool,
    pub config_loaded: bool,
    pub mapper_entries: usize,
}
