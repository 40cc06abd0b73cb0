/// Database row types — these map directly to SQLite rows.
/// Distinct from the bindsync-types API models to keep the store layer
/// independent.
use bindsync_types::message::{Message, Source};
use tracing::warn;
use uuid::Uuid;

/// Fields captured at message creation. The native-id fields are only
/// pre-filled for platform-originated messages (the event's own id).
pub struct NewMessage {
    pub id: Uuid,
    pub source: Source,
    pub text: String,
    pub username: String,
    pub tg_msg_id: Option<i64>,
    pub dc_msg_id: Option<i64>,
    pub reply_to_id: Option<Uuid>,
    pub reply_to_tg_id: Option<i64>,
    pub reply_to_dc_id: Option<i64>,
}

pub struct MessageRow {
    pub id: String,
    pub source: String,
    pub text: String,
    pub username: String,
    pub tg_msg_id: Option<i64>,
    pub dc_msg_id: Option<i64>,
    pub reply_to_id: Option<String>,
    pub reply_to_tg_id: Option<i64>,
    pub reply_to_dc_id: Option<i64>,
    pub created_at: String,
}

impl MessageRow {
    /// Convert a raw row into the shared Message model, warning (not
    /// failing) on corrupt columns so one bad row cannot poison a listing.
    pub fn into_message(self) -> Message {
        let id = self.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt message id '{}': {}", self.id, e);
            Uuid::default()
        });

        let source = Source::parse(&self.source).unwrap_or_else(|| {
            warn!("Corrupt source '{}' on message '{}'", self.source, self.id);
            Source::Api
        });

        let reply_to_id = self.reply_to_id.as_deref().and_then(|raw| {
            raw.parse::<Uuid>()
                .map_err(|e| warn!("Corrupt reply_to_id '{}' on message '{}': {}", raw, self.id, e))
                .ok()
        });

        let created_at = self
            .created_at
            .parse::<chrono::DateTime<chrono::Utc>>()
            .or_else(|_| {
                // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without
                // timezone. Parse as naive UTC and convert.
                chrono::NaiveDateTime::parse_from_str(&self.created_at, "%Y-%m-%d %H:%M:%S")
                    .map(|ndt| ndt.and_utc())
            })
            .unwrap_or_else(|e| {
                warn!("Corrupt created_at '{}' on message '{}': {}", self.created_at, self.id, e);
                chrono::DateTime::default()
            });

        Message {
            id,
            source,
            text: self.text,
            username: self.username,
            tg_msg_id: self.tg_msg_id,
            dc_msg_id: self.dc_msg_id,
            reply_to_id,
            reply_to_tg_id: self.reply_to_tg_id,
            reply_to_dc_id: self.reply_to_dc_id,
            created_at,
        }
    }
}
