use bindsync_types::message::Source;

pub const TG_TAG: &str = "[TG]";
pub const DC_TAG: &str = "[DC]";
pub const API_TAG: &str = "[API]";

/// Tags outgoing relayed text with an origin marker and recognizes those
/// markers on inbound text, so a relayed copy observed on the receiving
/// platform is never relayed a second time.
///
/// The check is a literal, case-sensitive prefix match on the raw text.
/// A human who types a marker by hand is indistinguishable from an echo
/// and gets dropped — accepted limitation of the tagging scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoGuard;

impl EchoGuard {
    pub fn new() -> Self {
        Self
    }

    fn marker(origin: Source) -> &'static str {
        match origin {
            Source::Telegram => TG_TAG,
            Source::Discord => DC_TAG,
            Source::Api | Source::ApiReply => API_TAG,
        }
    }

    /// Format text for relay: `[TG] alice: hello`.
    pub fn tag(&self, origin: Source, username: &str, text: &str) -> String {
        format!("{} {}: {}", Self::marker(origin), username, text)
    }

    /// Does `text` carry `origin`'s marker?
    pub fn is_tagged(&self, origin: Source, text: &str) -> bool {
        text.starts_with(Self::marker(origin))
    }

    /// Does `text` carry any relay marker at all? Inbound handlers drop
    /// such text: it is relay output, never fresh user content. This covers
    /// both the opposite platform seeing the relayed copy and a platform
    /// reflecting our own send back through its event stream.
    pub fn is_relayed(&self, text: &str) -> bool {
        [TG_TAG, DC_TAG, API_TAG]
            .iter()
            .any(|tag| text.starts_with(tag))
    }
}
