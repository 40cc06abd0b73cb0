use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use bindsync_store::models::NewMessage;
use bindsync_store::Database;
use bindsync_types::message::{Platform, Source};

use crate::adapter::{InboundMessage, PlatformAdapter};
use crate::echo::EchoGuard;
use crate::mapper::IdentityMapper;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("store failure: {0}")]
    Store(#[source] anyhow::Error),

    #[error("reply target not found: {0}")]
    ReplyTargetNotFound(Uuid),
}

/// Result of relaying one inbound platform event. `None` relay id means
/// the cross-post to the opposite platform did not produce a message
/// (no adapter, or the send failed — the record is persisted either way).
#[derive(Debug)]
pub struct RelayOutcome {
    pub id: Uuid,
    pub relayed_native_id: Option<i64>,
}

/// Result of an API create/reply, which may target both platforms.
#[derive(Debug)]
pub struct ApiRelayOutcome {
    pub id: Uuid,
    pub tg_msg_id: Option<i64>,
    pub dc_msg_id: Option<i64>,
}

/// Orchestrates the per-event pipeline: echo check, persistence, reply
/// resolution, dispatch to the opposite platform(s), and native-id
/// confirmation back into the store and the identity mapper.
///
/// Every event runs the pipeline exactly once, to completion or to
/// swallowed dispatch failure. There are no retries and no cancellation.
pub struct RelayCore {
    store: Arc<Database>,
    mapper: IdentityMapper,
    echo: EchoGuard,
    telegram: Option<Arc<dyn PlatformAdapter>>,
    discord: Option<Arc<dyn PlatformAdapter>>,
}

impl RelayCore {
    /// Adapters are optional: with one (or both) absent the pipeline still
    /// persists messages and simply records no native id for that side.
    pub fn new(
        store: Arc<Database>,
        mapper: IdentityMapper,
        telegram: Option<Arc<dyn PlatformAdapter>>,
        discord: Option<Arc<dyn PlatformAdapter>>,
    ) -> Self {
        Self {
            store,
            mapper,
            echo: EchoGuard::new(),
            telegram,
            discord,
        }
    }

    pub fn mapper(&self) -> &IdentityMapper {
        &self.mapper
    }

    pub fn is_connected(&self, platform: Platform) -> bool {
        self.adapter(platform).map(|a| a.is_connected()).unwrap_or(false)
    }

    /// Inbound event observed on Telegram.
    pub async fn handle_telegram(
        &self,
        inbound: InboundMessage,
    ) -> Result<Option<RelayOutcome>, RelayError> {
        self.handle_inbound(Platform::Telegram, inbound).await
    }

    /// Inbound event observed on Discord.
    pub async fn handle_discord(
        &self,
        inbound: InboundMessage,
    ) -> Result<Option<RelayOutcome>, RelayError> {
        self.handle_inbound(Platform::Discord, inbound).await
    }

    async fn handle_inbound(
        &self,
        origin: Platform,
        inbound: InboundMessage,
    ) -> Result<Option<RelayOutcome>, RelayError> {
        if self.echo.is_relayed(&inbound.text) {
            debug!(%origin, native_id = inbound.native_id, "Dropping relayed echo");
            return Ok(None);
        }

        // Cross-platform reply target comes from the mapper alone. The
        // replied-to message, to be reply-able, already made its own round
        // trip this process lifetime — and if it didn't, the reply simply
        // goes out un-anchored. The store is never consulted for this
        // direction.
        let reply_to_other = inbound
            .reply_to_native
            .and_then(|native| self.mapper_lookup(origin, native));

        // The internal reply pointer does fall back to the store.
        let reply_to_id = match inbound.reply_to_native {
            Some(native) => self
                .with_store(move |db| match origin {
                    Platform::Telegram => db.find_by_tg_id(native),
                    Platform::Discord => db.find_by_dc_id(native),
                })
                .await?
                .and_then(|row| row.id.parse::<Uuid>().ok()),
            None => None,
        };

        let id = Uuid::new_v4();
        let (source, tg_msg_id, dc_msg_id, reply_to_tg_id, reply_to_dc_id) = match origin {
            Platform::Telegram => (
                Source::Telegram,
                Some(inbound.native_id),
                None,
                inbound.reply_to_native,
                reply_to_other,
            ),
            Platform::Discord => (
                Source::Discord,
                None,
                Some(inbound.native_id),
                reply_to_other,
                inbound.reply_to_native,
            ),
        };

        let record = NewMessage {
            id,
            source,
            text: inbound.text.clone(),
            username: inbound.username.clone(),
            tg_msg_id,
            dc_msg_id,
            reply_to_id,
            reply_to_tg_id,
            reply_to_dc_id,
        };
        self.with_store(move |db| db.insert_message(&record)).await?;

        // Everything past the store write is best-effort: a failed
        // cross-post leaves the record durable with the far side unset.
        let outgoing = self.echo.tag(source, &inbound.username, &inbound.text);
        let relayed = self.dispatch(origin.other(), &outgoing, reply_to_other).await;

        if let Some(far_native) = relayed {
            self.confirm_native(id, origin.other(), far_native).await;
            match origin {
                Platform::Telegram => self.mapper.put(inbound.native_id, far_native),
                Platform::Discord => self.mapper.put(far_native, inbound.native_id),
            }
        }

        Ok(Some(RelayOutcome {
            id,
            relayed_native_id: relayed,
        }))
    }

    /// API-originated message; may target both platforms. Reply targets
    /// resolve through the store (the caller hands us an internal id, not
    /// a native one); an unknown `reply_to_id` degrades to an un-anchored
    /// send rather than failing the create.
    pub async fn create_from_api(
        &self,
        text: String,
        username: String,
        reply_to_id: Option<Uuid>,
    ) -> Result<ApiRelayOutcome, RelayError> {
        let (reply_to_id, reply_to_tg_id, reply_to_dc_id) = match reply_to_id {
            Some(target) => {
                let row = self
                    .with_store(move |db| db.get_message(&target.to_string()))
                    .await?;
                match row {
                    Some(row) => (Some(target), row.tg_msg_id, row.dc_msg_id),
                    // Unknown target: the reply pointer stays unset rather
                    // than dangling, and the sends go out un-anchored.
                    None => (None, None, None),
                }
            }
            None => (None, None, None),
        };

        self.cross_post(
            Source::Api,
            text,
            username,
            reply_to_id,
            reply_to_tg_id,
            reply_to_dc_id,
            false,
        )
        .await
    }

    /// API reply anchored to an existing message. Unlike `create_from_api`
    /// a missing anchor is an error (the API returns 404), and each
    /// platform is only attempted when the anchor was actually relayed
    /// there — an anchorless reply on that side would not thread.
    pub async fn reply_from_api(
        &self,
        target: Uuid,
        text: String,
        username: String,
    ) -> Result<ApiRelayOutcome, RelayError> {
        let row = self
            .with_store(move |db| db.get_message(&target.to_string()))
            .await?
            .ok_or(RelayError::ReplyTargetNotFound(target))?;

        self.cross_post(
            Source::ApiReply,
            text,
            username,
            Some(target),
            row.tg_msg_id,
            row.dc_msg_id,
            true,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn cross_post(
        &self,
        source: Source,
        text: String,
        username: String,
        reply_to_id: Option<Uuid>,
        reply_to_tg_id: Option<i64>,
        reply_to_dc_id: Option<i64>,
        require_anchor: bool,
    ) -> Result<ApiRelayOutcome, RelayError> {
        let id = Uuid::new_v4();
        let record = NewMessage {
            id,
            source,
            text: text.clone(),
            username: username.clone(),
            tg_msg_id: None,
            dc_msg_id: None,
            reply_to_id,
            reply_to_tg_id,
            reply_to_dc_id,
        };
        self.with_store(move |db| db.insert_message(&record)).await?;

        let outgoing = self.echo.tag(source, &username, &text);

        // The two dispatches are independent: one platform failing (or
        // being skipped) never blocks the other.
        let tg_msg_id = if require_anchor && reply_to_tg_id.is_none() {
            None
        } else {
            self.dispatch(Platform::Telegram, &outgoing, reply_to_tg_id).await
        };
        if let Some(native) = tg_msg_id {
            self.confirm_native(id, Platform::Telegram, native).await;
        }

        let dc_msg_id = if require_anchor && reply_to_dc_id.is_none() {
            None
        } else {
            self.dispatch(Platform::Discord, &outgoing, reply_to_dc_id).await
        };
        if let Some(native) = dc_msg_id {
            self.confirm_native(id, Platform::Discord, native).await;
        }

        if let (Some(tg), Some(dc)) = (tg_msg_id, dc_msg_id) {
            self.mapper.put(tg, dc);
        }

        Ok(ApiRelayOutcome {
            id,
            tg_msg_id,
            dc_msg_id,
        })
    }

    fn adapter(&self, platform: Platform) -> Option<&Arc<dyn PlatformAdapter>> {
        match platform {
            Platform::Telegram => self.telegram.as_ref(),
            Platform::Discord => self.discord.as_ref(),
        }
    }

    fn mapper_lookup(&self, origin: Platform, native: i64) -> Option<i64> {
        match origin {
            Platform::Telegram => self.mapper.dc_for_tg(native),
            Platform::Discord => self.mapper.tg_for_dc(native),
        }
    }

    /// Send to one platform, swallowing failure. Returns the new native id
    /// on success.
    async fn dispatch(&self, to: Platform, text: &str, reply_to: Option<i64>) -> Option<i64> {
        let adapter = match self.adapter(to) {
            Some(adapter) => adapter,
            None => {
                debug!(platform = %to, "No adapter configured, skipping dispatch");
                return None;
            }
        };

        match adapter.send(text, reply_to).await {
            Ok(native_id) => Some(native_id),
            Err(e) => {
                warn!(platform = %to, error = %e, "Dispatch failed, leaving native id unset");
                None
            }
        }
    }

    /// Record a confirmed native id. Store refusal (already set, or the
    /// row vanished) is logged and swallowed — same terminal state as a
    /// dispatch failure.
    async fn confirm_native(&self, id: Uuid, platform: Platform, native_id: i64) {
        let result = self
            .with_store(move |db| {
                let id = id.to_string();
                match platform {
                    Platform::Telegram => db.set_tg_id(&id, native_id),
                    Platform::Discord => db.set_dc_id(&id, native_id),
                }
            })
            .await;

        if let Err(e) = result {
            warn!(message_id = %id, platform = %platform, error = %e, "Failed to record native id");
        }
    }

    /// Run a blocking store operation off the async runtime.
    async fn with_store<T, F>(&self, f: F) -> Result<T, RelayError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| RelayError::Store(anyhow::anyhow!("store task join error: {e}")))?
            .map_err(RelayError::Store)
    }
}
