use axum::{extract::State, response::IntoResponse, Json};

use bindsync_types::api::{HealthResponse, RuntimeStatus};
use bindsync_types::message::Platform;

use crate::state::AppState;

/// Runtime-wiring snapshot: adapter connectivity, config, mapper size.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        runtime: RuntimeStatus {
            telegram_connected: state.relay.is_connected(Platform::Telegram),
            discord_connected: state.relay.is_connected(Platform::Discord),
            config_loaded: state.config_loaded,
            mapper_entries: state.relay.mapper().len(),
        },
    })
}
