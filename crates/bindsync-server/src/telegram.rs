/// Telegram integration over the Bot HTTP API: outbound `sendMessage`
/// and a `getUpdates` long-poll loop feeding the relay core.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use bindsync_bridge::adapter::{AdapterError, InboundMessage, PlatformAdapter};
use bindsync_bridge::relay::RelayCore;
use bindsync_types::message::Platform;

/// Long-poll hold time, seconds.
const POLL_TIMEOUT_SECS: u64 = 30;
const RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct TelegramAdapter {
    http: reqwest::Client,
    token: String,
    chat_id: i64,
    connected: AtomicBool,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
    chat: TgChat,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    from: Option<TgUser>,
    #[serde(default)]
    reply_to_message: Option<Box<TgMessage>>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    first_name: String,
    #[serde(default)]
    last_name: Option<String>,
}

impl TgUser {
    fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TgMe {
    username: String,
}

impl TelegramAdapter {
    pub fn new(token: &str, chat_id: i64) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.to_string(),
            chat_id,
            connected: AtomicBool::new(false),
        }
    }

    /// Verify the token with `getMe`. Failure is logged, not fatal: the
    /// poll loop keeps retrying and the API keeps serving either way.
    pub async fn probe(&self) -> Result<(), AdapterError> {
        let me: TgMe = self.call("getMe", json!({})).await?;
        self.connected.store(true, Ordering::SeqCst);
        info!("Telegram connected as @{}", me.username);
        Ok(())
    }

    fn url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, AdapterError> {
        let resp = self
            .http
            .post(self.url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::Transport(anyhow!("telegram {method}: {e}")))?;

        let status = resp.status();
        let raw = resp
            .bytes()
            .await
            .map_err(|e| AdapterError::Transport(anyhow!("telegram {method} body: {e}")))?;

        let envelope: ApiEnvelope<T> = serde_json::from_slice(&raw).map_err(|e| {
            AdapterError::MalformedResponse(format!("telegram {method}: {e}"))
        })?;

        if !envelope.ok {
            return Err(AdapterError::Platform {
                status: status.as_u16(),
                body: envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            });
        }
        envelope
            .result
            .ok_or_else(|| AdapterError::MalformedResponse(format!("telegram {method}: ok without result")))
    }

    async fn send_message(&self, text: &str, reply_to: Option<i64>) -> Result<i64, AdapterError> {
        let mut body = json!({
            "chat_id": self.chat_id,
            "text": text,
        });
        if let Some(anchor) = reply_to {
            body["reply_to_message_id"] = json!(anchor);
        }
        let sent: TgMessage = self.call("sendMessage", body).await?;
        Ok(sent.message_id)
    }
}

#[async_trait]
impl PlatformAdapter for TelegramAdapter {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, text: &str, reply_to: Option<i64>) -> Result<i64, AdapterError> {
        if let Some(anchor) = reply_to {
            // Telegram rejects anchors pointing at deleted messages; fall
            // back to an un-anchored send rather than dropping the relay.
            match self.send_message(text, Some(anchor)).await {
                Ok(id) => return Ok(id),
                Err(AdapterError::Platform { status, body }) => {
                    warn!(
                        "Anchored Telegram send rejected ({status}: {body}), retrying un-anchored"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        self.send_message(text, None).await
    }
}

/// Long-poll `getUpdates` forever, feeding chat messages into the relay
/// core. Relay failures are logged and never crash the loop.
pub async fn run_polling(adapter: Arc<TelegramAdapter>, core: Arc<RelayCore>) {
    let mut offset: i64 = 0;

    loop {
        let updates: Vec<Update> = match adapter
            .call(
                "getUpdates",
                json!({
                    "timeout": POLL_TIMEOUT_SECS,
                    "offset": offset,
                    "allowed_updates": ["message"],
                }),
            )
            .await
        {
            Ok(updates) => {
                adapter.connected.store(true, Ordering::SeqCst);
                updates
            }
            Err(e) => {
                warn!("Telegram poll failed: {e}");
                adapter.connected.store(false, Ordering::SeqCst);
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);

            let Some(msg) = update.message else { continue };
            if msg.chat.id != adapter.chat_id {
                continue;
            }
            let Some(text) = msg.text else { continue };

            let inbound = InboundMessage {
                native_id: msg.message_id,
                username: msg
                    .from
                    .as_ref()
                    .map(TgUser::full_name)
                    .unwrap_or_else(|| "unknown".to_string()),
                text,
                reply_to_native: msg.reply_to_message.as_ref().map(|r| r.message_id),
            };

            if let Err(e) = core.handle_telegram(inbound).await {
                error!("Telegram relay failed: {e}");
            }
        }
    }
}
