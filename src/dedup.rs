// src/dedup.rs
//! Two-tier "already published" set: a baseline rebuilt from the relays at
//! startup, plus the keys published during this run.

use std::collections::HashSet;
use std::fmt;
use std::sync::RwLock;

use crate::message::{OutboundMessage, KIND_HITCH_NOTE, KIND_TEXT_NOTE};
use crate::publish::Transport;

/// Prefix keeping snapshot keys disjoint from feed keys.
pub const SNAPSHOT_KEY_PREFIX: &str = "hitchmap_";

/// How many of our own messages to ask each endpoint for.
pub const BASELINE_QUERY_LIMIT: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn feed(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn snapshot(row_id: impl fmt::Display) -> Self {
        Self(format!("{SNAPSHOT_KEY_PREFIX}{row_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default)]
struct Sets {
    baseline: HashSet<DedupKey>,
    session: HashSet<DedupKey>,
}

/// Shared between both poll loops; reads dominate, writes are one key at a time.
#[derive(Debug, Default)]
pub struct DedupStore {
    inner: RwLock<Sets>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_baseline(baseline: HashSet<DedupKey>) -> Self {
        Self {
            inner: RwLock::new(Sets {
                baseline,
                session: HashSet::new(),
            }),
        }
    }

    /// Build the store from whatever the relays still remember about us.
    pub async fn load(transport: &dyn Transport, canonical_host: &str) -> Self {
        let baseline = load_baseline(transport, canonical_host).await;
        tracing::info!(keys = baseline.len(), "dedup baseline loaded");
        Self::with_baseline(baseline)
    }

    pub fn is_seen(&self, key: &DedupKey) -> bool {
        let sets = self.inner.read().unwrap_or_else(|e| e.into_inner());
        sets.session.contains(key) || sets.baseline.contains(key)
    }

    pub fn mark_seen(&self, key: DedupKey) {
        let mut sets = self.inner.write().unwrap_or_else(|e| e.into_inner());
        sets.session.insert(key);
    }

    /// Forget this run's keys; the baseline stays.
    pub fn reset_session(&self) {
        let mut sets = self.inner.write().unwrap_or_else(|e| e.into_inner());
        sets.session.clear();
    }

    pub fn baseline_len(&self) -> usize {
        self.inner.read().map(|s| s.baseline.len()).unwrap_or(0)
    }

    pub fn session_len(&self) -> usize {
        self.inner.read().map(|s| s.session.len()).unwrap_or(0)
    }
}

/// Best-effort union over all endpoints; a failing endpoint is logged and skipped.
pub async fn load_baseline(transport: &dyn Transport, canonical_host: &str) -> HashSet<DedupKey> {
    let mut keys = HashSet::new();
    for endpoint in transport.endpoints() {
        match transport
            .query_by_author(
                &endpoint,
                &[KIND_TEXT_NOTE, KIND_HITCH_NOTE],
                BASELINE_QUERY_LIMIT,
            )
            .await
        {
            Ok(messages) => {
                let before = keys.len();
                for msg in &messages {
                    keys.extend(keys_from_message(msg, canonical_host));
                }
                tracing::info!(
                    %endpoint,
                    messages = messages.len(),
                    new_keys = keys.len() - before,
                    "baseline queried"
                );
            }
            Err(e) => {
                tracing::warn!(%endpoint, error = ?e, "baseline query failed");
            }
        }
    }
    keys
}

/// Recover the dedup keys a previously published message stands for.
pub fn keys_from_message(msg: &OutboundMessage, canonical_host: &str) -> Vec<DedupKey> {
    let mut out = Vec::new();

    if let Some(link) = msg
        .tag_values("r")
        .find(|v| !canonical_host.is_empty() && v.contains(canonical_host))
    {
        out.push(DedupKey::feed(link));
    }

    if msg.has_tag("t", "hitchmap") {
        if let Some(id) = msg.tag_values("d").find(|v| !v.is_empty()) {
            out.push(DedupKey::snapshot(id));
        }
    }

    out
}
