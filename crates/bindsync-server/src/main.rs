mod config;
mod discord;
mod telegram;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use bindsync_api::state::{AppState, AppStateInner};
use bindsync_api::{health, messages};
use bindsync_bridge::adapter::PlatformAdapter;
use bindsync_bridge::mapper::IdentityMapper;
use bindsync_bridge::relay::RelayCore;
use bindsync_store::Database;

use crate::config::BridgeConfig;
use crate::discord::DiscordAdapter;
use crate::telegram::TelegramAdapter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bindsync=debug,tower_http=debug".into()),
        )
        .init();

    // Config: missing credentials are fatal, before anything is spawned
    let cfg = BridgeConfig::from_env()?;

    // Message store
    let store = Arc::new(Database::open(&PathBuf::from(&cfg.db_path))?);

    // The mapper starts empty every process start; it warms up as
    // messages make their round trips.
    let mapper = IdentityMapper::new();

    // Platform adapters
    let telegram = Arc::new(TelegramAdapter::new(&cfg.telegram_token, cfg.telegram_chat_id));
    let discord = Arc::new(DiscordAdapter::new(&cfg.discord_token, cfg.discord_channel_id));

    if let Err(e) = telegram.probe().await {
        warn!("Telegram connectivity probe failed: {e}");
    }

    let relay = Arc::new(RelayCore::new(
        store.clone(),
        mapper,
        Some(telegram.clone() as Arc<dyn PlatformAdapter>),
        Some(discord.clone() as Arc<dyn PlatformAdapter>),
    ));

    // Inbound event loops, one task per platform
    tokio::spawn(telegram::run_polling(telegram, relay.clone()));
    tokio::spawn(discord::run_gateway(discord, relay.clone()));

    // REST API
    let state: AppState = Arc::new(AppStateInner {
        store,
        relay,
        config_loaded: true,
    });

    let app = Router::new()
        .route(
            "/messages",
            get(messages::list_messages).post(messages::create_message),
        )
        .route("/messages/{message_id}", get(messages::get_message))
        .route("/messages/{message_id}/reply", post(messages::reply_to_message))
        .route("/health", get(health::health))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    info!("BindSync API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
