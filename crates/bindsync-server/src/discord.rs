/// Discord integration: outbound sends over the REST API, inbound events
/// over a minimal gateway websocket client (identify, heartbeat,
/// MESSAGE_CREATE), reconnecting on socket loss.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use bindsync_bridge::adapter::{AdapterError, InboundMessage, PlatformAdapter};
use bindsync_bridge::relay::RelayCore;
use bindsync_types::message::Platform;

const GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";
const API_BASE: &str = "https://discord.com/api/v10";
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// GUILD_MESSAGES | MESSAGE_CONTENT
const INTENTS: u64 = (1 << 9) | (1 << 15);

pub struct DiscordAdapter {
    http: reqwest::Client,
    token: String,
    channel_id: u64,
    connected: AtomicBool,
}

#[derive(Debug, Deserialize)]
struct GatewayFrame {
    op: u8,
    #[serde(default)]
    d: serde_json::Value,
    #[serde(default)]
    s: Option<i64>,
    #[serde(default)]
    t: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DcMessage {
    id: String,
    channel_id: String,
    #[serde(default)]
    content: String,
    author: DcUser,
    #[serde(default)]
    referenced_message: Option<DcMessageRef>,
}

#[derive(Debug, Deserialize)]
struct DcMessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DcUser {
    id: String,
    username: String,
    #[serde(default)]
    global_name: Option<String>,
}

impl DcUser {
    fn display_name(&self) -> String {
        self.global_name.clone().unwrap_or_else(|| self.username.clone())
    }
}

#[derive(Debug, Deserialize)]
struct DcSent {
    id: String,
}

impl DiscordAdapter {
    pub fn new(token: &str, channel_id: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.to_string(),
            channel_id,
            connected: AtomicBool::new(false),
        }
    }

    async fn send_message(&self, text: &str, reply_to: Option<i64>) -> Result<i64, AdapterError> {
        let mut body = json!({ "content": text });
        if let Some(anchor) = reply_to {
            body["message_reference"] = json!({ "message_id": anchor.to_string() });
        }

        let resp = self
            .http
            .post(format!("{API_BASE}/channels/{}/messages", self.channel_id))
            .header("Authorization", format!("Bot {}", self.token))
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::Transport(anyhow!("discord send: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdapterError::Platform {
                status: status.as_u16(),
                body,
            });
        }

        let sent: DcSent = resp
            .json()
            .await
            .map_err(|e| AdapterError::MalformedResponse(format!("discord send: {e}")))?;
        sent.id
            .parse()
            .map_err(|_| AdapterError::MalformedResponse(format!("bad message id: {}", sent.id)))
    }
}

#[async_trait]
impl PlatformAdapter for DiscordAdapter {
    fn platform(&self) -> Platform {
        Platform::Discord
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, text: &str, reply_to: Option<i64>) -> Result<i64, AdapterError> {
        if let Some(anchor) = reply_to {
            // A dead anchor (deleted message) fails the whole send; fall
            // back to an un-anchored one rather than dropping the relay.
            match self.send_message(text, Some(anchor)).await {
                Ok(id) => return Ok(id),
                Err(AdapterError::Platform { status, body }) => {
                    warn!("Anchored Discord send rejected ({status}: {body}), retrying un-anchored");
                }
                Err(e) => return Err(e),
            }
        }
        self.send_message(text, None).await
    }
}

/// Hold a gateway session forever, feeding channel messages into the
/// relay core and reconnecting with a fixed delay on any socket loss.
pub async fn run_gateway(adapter: Arc<DiscordAdapter>, core: Arc<RelayCore>) {
    loop {
        match session(&adapter, &core).await {
            Ok(()) => info!("Discord gateway session ended, reconnecting"),
            Err(e) => warn!("Discord gateway error: {e}, reconnecting"),
        }
        adapter.connected.store(false, Ordering::SeqCst);
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn session(adapter: &DiscordAdapter, core: &Arc<RelayCore>) -> anyhow::Result<()> {
    let (ws, _) = tokio_tungstenite::connect_async(GATEWAY_URL)
        .await
        .context("gateway connect")?;
    let (mut write, mut read) = ws.split();

    // First frame must be Hello with our heartbeat interval.
    let hello = loop {
        match read.next().await.ok_or_else(|| anyhow!("gateway closed before hello"))?? {
            tokio_tungstenite::tungstenite::Message::Text(text) => {
                break serde_json::from_str::<GatewayFrame>(text.as_str())?;
            }
            _ => continue,
        }
    };
    if hello.op != 10 {
        bail!("expected hello, got op {}", hello.op);
    }
    let interval_ms = hello
        .d
        .get("heartbeat_interval")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| anyhow!("hello without heartbeat_interval"))?;

    let identify = json!({
        "op": 2,
        "d": {
            "token": adapter.token,
            "intents": INTENTS,
            "properties": { "os": "linux", "browser": "bindsync", "device": "bindsync" },
        },
    });
    write
        .send(tokio_tungstenite::tungstenite::Message::Text(identify.to_string().into()))
        .await?;

    let mut heartbeat = tokio::time::interval(Duration::from_millis(interval_ms));
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last_seq: Option<i64> = None;
    let mut self_id: Option<String> = None;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                let beat = json!({ "op": 1, "d": last_seq });
                write
                    .send(tokio_tungstenite::tungstenite::Message::Text(beat.to_string().into()))
                    .await?;
            }
            incoming = read.next() => {
                let Some(incoming) = incoming else { return Ok(()) };
                match incoming? {
                    tokio_tungstenite::tungstenite::Message::Text(text) => {
                        let frame: GatewayFrame = match serde_json::from_str(text.as_str()) {
                            Ok(frame) => frame,
                            Err(e) => {
                                warn!("Unparseable gateway frame: {e}");
                                continue;
                            }
                        };
                        if let Some(s) = frame.s {
                            last_seq = Some(s);
                        }
                        match frame.op {
                            // Dispatch
                            0 => handle_dispatch(adapter, core, frame, &mut self_id).await,
                            // Server asked for an immediate heartbeat
                            1 => {
                                let beat = json!({ "op": 1, "d": last_seq });
                                write
                                    .send(tokio_tungstenite::tungstenite::Message::Text(beat.to_string().into()))
                                    .await?;
                            }
                            // Reconnect / invalid session: drop and redial
                            7 | 9 => return Ok(()),
                            // Heartbeat ack
                            11 => {}
                            _ => {}
                        }
                    }
                    tokio_tungstenite::tungstenite::Message::Ping(payload) => {
                        write
                            .send(tokio_tungstenite::tungstenite::Message::Pong(payload))
                            .await?;
                    }
                    tokio_tungstenite::tungstenite::Message::Close(_) => return Ok(()),
                    _ => {}
                }
            }
        }
    }
}

async fn handle_dispatch(
    adapter: &DiscordAdapter,
    core: &Arc<RelayCore>,
    frame: GatewayFrame,
    self_id: &mut Option<String>,
) {
    match frame.t.as_deref() {
        Some("READY") => {
            *self_id = frame
                .d
                .get("user")
                .and_then(|u| u.get("id"))
                .and_then(|id| id.as_str())
                .map(str::to_string);
            adapter.connected.store(true, Ordering::SeqCst);
            info!("Discord gateway ready");
        }
        Some("MESSAGE_CREATE") => {
            let msg: DcMessage = match serde_json::from_value(frame.d) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("Unparseable MESSAGE_CREATE: {e}");
                    return;
                }
            };

            if msg.channel_id != adapter.channel_id.to_string() {
                return;
            }
            // Our own sends come back through the gateway; skip them.
            if self_id.as_deref() == Some(msg.author.id.as_str()) {
                return;
            }
            let Ok(native_id) = msg.id.parse::<i64>() else {
                warn!("Unparseable Discord message id: {}", msg.id);
                return;
            };

            let inbound = InboundMessage {
                native_id,
                username: msg.author.display_name(),
                text: msg.content,
                reply_to_native: msg
                    .referenced_message
                    .and_then(|r| r.id.parse::<i64>().ok()),
            };

            if let Err(e) = core.handle_discord(inbound).await {
                error!("Discord relay failed: {e}");
            }
        }
        _ => {}
    }
}
