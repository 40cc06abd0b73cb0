use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Process-lifetime bidirectional table mapping Telegram message ids to
/// Discord message ids, for O(1) reply resolution without a store round
/// trip.
///
/// Both directions live under one lock so the paired insert is a single
/// critical section: a concurrent reader sees the pre- or post-state of a
/// pending `put`, never a half-written pair. Entries are never evicted;
/// the table starts empty on every process start and warms up as messages
/// make their own round trips (restart fallback is a store query for the
/// internal id — the cross-platform direction has no fallback).
#[derive(Clone, Default)]
pub struct IdentityMapper {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    tg_to_dc: HashMap<i64, i64>,
    dc_to_tg: HashMap<i64, i64>,
}

impl IdentityMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a confirmed pair. Called only after both platforms hold the
    /// same message, i.e. after a successful cross-post.
    pub fn put(&self, tg_msg_id: i64, dc_msg_id: i64) {
        let mut inner = self.lock();
        inner.tg_to_dc.insert(tg_msg_id, dc_msg_id);
        inner.dc_to_tg.insert(dc_msg_id, tg_msg_id);
    }

    pub fn dc_for_tg(&self, tg_msg_id: i64) -> Option<i64> {
        self.lock().tg_to_dc.get(&tg_msg_id).copied()
    }

    pub fn tg_for_dc(&self, dc_msg_id: i64) -> Option<i64> {
        self.lock().dc_to_tg.get(&dc_msg_id).copied()
    }

    /// Number of confirmed pairs, reported through /health.
    pub fn len(&self) -> usize {
        self.lock().tg_to_dc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned mapper only means a panic happened mid-insert of a
        // consistent pair; the table itself is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
