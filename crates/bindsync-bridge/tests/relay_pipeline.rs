/// End-to-end pipeline tests with in-memory platform adapters: echo
/// suppression, reply threading across platforms, partial dispatch, and
/// the credential-less API path.
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use bindsync_bridge::adapter::{AdapterError, InboundMessage, PlatformAdapter};
use bindsync_bridge::echo::EchoGuard;
use bindsync_bridge::mapper::IdentityMapper;
use bindsync_bridge::relay::{RelayCore, RelayError};
use bindsync_store::Database;
use bindsync_types::message::{Platform, Source};

struct MockAdapter {
    platform: Platform,
    failing: AtomicBool,
    next_id: AtomicI64,
    sent: Mutex<Vec<(String, Option<i64>)>>,
}

impl MockAdapter {
    fn new(platform: Platform, first_id: i64) -> Arc<Self> {
        Arc::new(Self {
            platform,
            failing: AtomicBool::new(false),
            next_id: AtomicI64::new(first_id),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn sent(&self) -> Vec<(String, Option<i64>)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn is_connected(&self) -> bool {
        !self.failing.load(Ordering::SeqCst)
    }

    async fn send(&self, text: &str, reply_to: Option<i64>) -> Result<i64, AdapterError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AdapterError::NotConnected);
        }
        self.sent.lock().unwrap().push((text.to_string(), reply_to));
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

struct Harness {
    core: RelayCore,
    store: Arc<Database>,
    telegram: Arc<MockAdapter>,
    discord: Arc<MockAdapter>,
    _dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Database::open(&dir.path().join("bridge.db")).unwrap());
    let telegram = MockAdapter::new(Platform::Telegram, 1000);
    let discord = MockAdapter::new(Platform::Discord, 9000);
    let core = RelayCore::new(
        store.clone(),
        IdentityMapper::new(),
        Some(telegram.clone() as Arc<dyn PlatformAdapter>),
        Some(discord.clone() as Arc<dyn PlatformAdapter>),
    );
    Harness {
        core,
        store,
        telegram,
        discord,
        _dir: dir,
    }
}

fn inbound(native_id: i64, text: &str, reply_to: Option<i64>) -> InboundMessage {
    InboundMessage {
        native_id,
        username: "alice".to_string(),
        text: text.to_string(),
        reply_to_native: reply_to,
    }
}

#[tokio::test]
async fn telegram_relay_confirms_both_sides() {
    let h = harness();

    let outcome = h
        .core
        .handle_telegram(inbound(100, "hello", None))
        .await
        .unwrap()
        .expect("not an echo");

    assert_eq!(outcome.relayed_native_id, Some(9000));

    // Store holds the full record with both native ids.
    let row = h.store.find_by_tg_id(100).unwrap().unwrap();
    assert_eq!(row.source, "telegram");
    assert_eq!(row.dc_msg_id, Some(9000));
    assert_eq!(row.id, outcome.id.to_string());

    // Mapper holds the confirmed pair, both directions.
    assert_eq!(h.core.mapper().dc_for_tg(100), Some(9000));
    assert_eq!(h.core.mapper().tg_for_dc(9000), Some(100));

    // The outgoing copy is tagged with the origin marker.
    let sent = h.discord.sent();
    assert_eq!(sent, vec![("[TG] alice: hello".to_string(), None)]);
    assert!(h.telegram.sent().is_empty());
}

#[tokio::test]
async fn discord_relay_is_symmetric() {
    let h = harness();

    h.core
        .handle_discord(inbound(9100, "hey", None))
        .await
        .unwrap()
        .expect("not an echo");

    let row = h.store.find_by_dc_id(9100).unwrap().unwrap();
    assert_eq!(row.source, "discord");
    assert_eq!(row.tg_msg_id, Some(1000));
    assert_eq!(h.core.mapper().tg_for_dc(9100), Some(1000));
    assert_eq!(h.telegram.sent(), vec![("[DC] alice: hey".to_string(), None)]);
}

#[tokio::test]
async fn tagged_text_is_not_reingested() {
    let h = harness();

    let echoed = EchoGuard::new().tag(Source::Telegram, "alice", "hello");
    let outcome = h
        .core
        .handle_telegram(inbound(200, &echoed, None))
        .await
        .unwrap();

    assert!(outcome.is_none());
    assert!(h.store.list_messages(10, 0).unwrap().is_empty());
    assert!(h.discord.sent().is_empty());

    // The opposite platform's marker is suppressed too.
    let relayed = EchoGuard::new().tag(Source::Discord, "bob", "yo");
    let outcome = h
        .core
        .handle_telegram(inbound(201, &relayed, None))
        .await
        .unwrap();
    assert!(outcome.is_none());
}

#[tokio::test]
async fn reply_threads_across_platforms() {
    let h = harness();

    // M1 makes its round trip: tg 100 <-> dc 9000.
    let m1 = h
        .core
        .handle_telegram(inbound(100, "original", None))
        .await
        .unwrap()
        .unwrap();

    // A Telegram reply to 100 must thread to dc 9000 and point at M1.
    h.core
        .handle_telegram(inbound(101, "hi", Some(100)))
        .await
        .unwrap()
        .unwrap();

    let row = h.store.find_by_tg_id(101).unwrap().unwrap();
    assert_eq!(row.reply_to_id, Some(m1.id.to_string()));
    assert_eq!(row.reply_to_tg_id, Some(100));
    assert_eq!(row.reply_to_dc_id, Some(9000));

    let sent = h.discord.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1], ("[TG] alice: hi".to_string(), Some(9000)));
}

#[tokio::test]
async fn reply_to_unknown_native_id_goes_unanchored() {
    let h = harness();

    h.core
        .handle_telegram(inbound(300, "hi", Some(299)))
        .await
        .unwrap()
        .unwrap();

    let row = h.store.find_by_tg_id(300).unwrap().unwrap();
    // Captured from the event, but unresolvable on both other axes.
    assert_eq!(row.reply_to_tg_id, Some(299));
    assert_eq!(row.reply_to_dc_id, None);
    assert_eq!(row.reply_to_id, None);

    assert_eq!(h.discord.sent(), vec![("[TG] alice: hi".to_string(), None)]);
}

#[tokio::test]
async fn api_create_without_adapters_still_persists() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Database::open(&dir.path().join("bridge.db")).unwrap());
    let core = RelayCore::new(store.clone(), IdentityMapper::new(), None, None);

    let outcome = core
        .create_from_api("no creds".to_string(), "API".to_string(), None)
        .await
        .unwrap();

    assert_eq!(outcome.tg_msg_id, None);
    assert_eq!(outcome.dc_msg_id, None);

    let row = store.get_message(&outcome.id.to_string()).unwrap().unwrap();
    assert_eq!(row.source, "api");
    assert_eq!(row.text, "no creds");
}

#[tokio::test]
async fn api_partial_dispatch_is_a_valid_terminal_state() {
    let h = harness();
    h.telegram.set_failing(true);

    let outcome = h
        .core
        .create_from_api("half".to_string(), "API".to_string(), None)
        .await
        .unwrap();

    assert_eq!(outcome.tg_msg_id, None);
    assert_eq!(outcome.dc_msg_id, Some(9000));

    let row = h.store.get_message(&outcome.id.to_string()).unwrap().unwrap();
    assert_eq!(row.tg_msg_id, None);
    assert_eq!(row.dc_msg_id, Some(9000));

    // No pair confirmed on both sides, so the mapper stays empty.
    assert!(h.core.mapper().is_empty());
}

#[tokio::test]
async fn api_create_resolves_reply_targets_from_store() {
    let h = harness();

    let m1 = h
        .core
        .handle_telegram(inbound(100, "original", None))
        .await
        .unwrap()
        .unwrap();

    let outcome = h
        .core
        .create_from_api("api reply".to_string(), "API".to_string(), Some(m1.id))
        .await
        .unwrap();

    // Anchored on Telegram to M1's own id, on Discord to its relayed copy.
    assert_eq!(h.telegram.sent().last().unwrap().1, Some(100));
    assert_eq!(h.discord.sent().last().unwrap().1, Some(9000));

    // Both sides confirmed: the API message itself is now mapped.
    assert_eq!(
        h.core.mapper().dc_for_tg(outcome.tg_msg_id.unwrap()),
        outcome.dc_msg_id
    );
}

#[tokio::test]
async fn api_reply_requires_an_existing_anchor() {
    let h = harness();

    let missing = Uuid::new_v4();
    let err = h
        .core
        .reply_from_api(missing, "hi".to_string(), "API".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::ReplyTargetNotFound(id) if id == missing));

    // Anchor known on one platform only: the other side is skipped, not
    // sent un-anchored.
    h.discord.set_failing(true);
    let seed = h
        .core
        .create_from_api("tg only".to_string(), "API".to_string(), None)
        .await
        .unwrap();
    h.discord.set_failing(false);
    assert!(seed.dc_msg_id.is_none());

    let before = h.discord.sent().len();
    let reply = h
        .core
        .reply_from_api(seed.id, "threaded".to_string(), "API".to_string())
        .await
        .unwrap();
    assert!(reply.tg_msg_id.is_some());
    assert!(reply.dc_msg_id.is_none());
    assert_eq!(h.discord.sent().len(), before);
}

#[tokio::test]
async fn relayed_ids_are_never_overwritten() {
    let h = harness();

    let outcome = h
        .core
        .handle_telegram(inbound(100, "first", None))
        .await
        .unwrap()
        .unwrap();

    // A late duplicate confirmation must lose against the stored value.
    h.store.set_dc_id(&outcome.id.to_string(), 4242).unwrap();
    let row = h.store.find_by_tg_id(100).unwrap().unwrap();
    assert_eq!(row.dc_msg_id, Some(9000));
}
