use anyhow::{bail, Result};

/// Startup configuration. Platform credentials are required: the bridge
/// refuses to start half-wired rather than silently dropping one side.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub telegram_token: String,
    pub telegram_chat_id: i64,
    pub discord_token: String,
    pub discord_channel_id: u64,
    pub host: String,
    pub port: u16,
    pub db_path: String,
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let telegram_token = get("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        let telegram_chat_id: i64 = get("TELEGRAM_CHAT_ID")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let discord_token = get("DISCORD_BOT_TOKEN").unwrap_or_default();
        let discord_channel_id: u64 = get("DISCORD_CHANNEL_ID")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        let mut missing = Vec::new();
        if telegram_token.is_empty() {
            missing.push("TELEGRAM_BOT_TOKEN");
        }
        if telegram_chat_id == 0 {
            missing.push("TELEGRAM_CHAT_ID");
        }
        if discord_token.is_empty() {
            missing.push("DISCORD_BOT_TOKEN");
        }
        if discord_channel_id == 0 {
            missing.push("DISCORD_CHANNEL_ID");
        }
        if !missing.is_empty() {
            bail!("Missing environment variables: {}", missing.join(", "));
        }

        let port: u16 = match get("BINDSYNC_PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| anyhow::anyhow!("BINDSYNC_PORT is not a valid port: {raw}"))?,
            None => 8000,
        };

        Ok(Self {
            telegram_token,
            telegram_chat_id,
            discord_token,
            discord_channel_id,
            host: get("BINDSYNC_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            db_path: get("BINDSYNC_DB_PATH").unwrap_or_else(|| "bindsync.db".to_string()),
        })
    }
}
