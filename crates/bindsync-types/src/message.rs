use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two chat platforms the bridge spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Telegram,
    Discord,
}

impl Platform {
    /// The opposite end of the bridge.
    pub fn other(self) -> Self {
        match self {
            Self::Telegram => Self::Discord,
            Self::Discord => Self::Telegram,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Discord => "discord",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a message entered the bridge. Set once at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Telegram,
    Discord,
    Api,
    ApiReply,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Discord => "discord",
            Self::Api => "api",
            Self::ApiReply => "api_reply",
        }
    }

    /// Parse the TEXT column value written by `as_str`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "telegram" => Some(Self::Telegram),
            "discord" => Some(Self::Discord),
            "api" => Some(Self::Api),
            "api_reply" => Some(Self::ApiReply),
            _ => None,
        }
    }
}

/// A bridged message as persisted in the store.
///
/// `source`, `text`, `username` and the `reply_to_*` fields are immutable
/// after creation. The two native-id fields start unset and are written at
/// most once each, when the relay to that platform succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub source: Source,
    pub text: String,
    pub username: String,
    pub tg_msg_id: Option<i64>,
    pub dc_msg_id: Option<i64>,
    pub reply_to_id: Option<Uuid>,
    pub reply_to_tg_id: Option<i64>,
    pub reply_to_dc_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}
