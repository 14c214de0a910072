// src/ingest/mod.rs
pub mod providers;
pub mod scheduler;
pub mod types;

use crate::dedup::DedupStore;
use crate::ingest::types::{SourceKind, SourceRecord};
use crate::message::MessageBuilder;
use crate::publish::Publisher;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fetch_requests_total", "Network fetch attempts.");
        describe_counter!("fetch_cache_hits_total", "Fetches served from cache.");
        describe_counter!("fetch_retries_total", "Fetch retries after a transient failure.");
        describe_counter!("fetch_failures_total", "Fetches that exhausted their retries.");
        describe_counter!(
            "records_skipped_total",
            "Records skipped because they were already published."
        );
        describe_counter!(
            "messages_published_total",
            "Messages accepted by at least one endpoint."
        );
        describe_counter!(
            "publish_endpoint_errors_total",
            "Per-endpoint publish rejections."
        );
        describe_counter!("poll_cycles_total", "Completed poll cycles per source.");
    });
}

/// Decode entities, strip markup, collapse whitespace.
pub fn strip_html(s: &str) -> String {
    // 1) HTML entity decode (feeds double-escape their HTML)
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Second decode for entities that were escaped twice (&amp;nbsp;)
    out = html_escape::decode_html_entities(&out).to_string();

    // 4) Collapse whitespace
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Cap at `max` characters, marking the cut with `...`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str("...");
    out
}

/// Whether the dedup store gates publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupPolicy {
    Respect,
    Ignore,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub fetched: usize,
    pub skipped: usize,
    pub published: usize,
    pub failed: usize,
}

impl CycleStats {
    pub fn merge(&mut self, other: CycleStats) {
        self.fetched += other.fetched;
        self.skipped += other.skipped;
        self.published += other.published;
        self.failed += other.failed;
    }

    /// Messages handed to the publisher, successful or not.
    pub fn attempted(&self) -> usize {
        self.published + self.failed
    }
}

/// State shared by both poll loops.
pub struct Pipeline {
    pub store: Arc<DedupStore>,
    pub builder: MessageBuilder,
    pub publisher: Publisher,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(store: Arc<DedupStore>, builder: MessageBuilder, publisher: Publisher) -> Self {
        Self {
            store,
            builder,
            publisher,
            cancel: CancellationToken::new(),
        }
    }

    /// Once `cancel` fires, records not yet started are left unseen.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Dedup, build and publish `records` in order. With `limit`, stops after
    /// that many messages have been handed to the publisher.
    pub async fn process(
        &self,
        kind: SourceKind,
        records: Vec<SourceRecord>,
        policy: DedupPolicy,
        limit: Option<usize>,
    ) -> CycleStats {
        let mut stats = CycleStats {
            fetched: records.len(),
            ..Default::default()
        };
        let total = records.len();

        for (i, record) in records.into_iter().enumerate() {
            if limit.is_some_and(|l| stats.attempted() >= l) {
                break;
            }

            let key = record.dedup_key();
            if policy == DedupPolicy::Respect && self.store.is_seen(&key) {
                stats.skipped += 1;
                continue;
            }

            if self.cancel.is_cancelled() {
                tracing::info!(
                    source = kind.as_str(),
                    left = total - i,
                    "shutdown requested, leaving remaining records for the next run"
                );
                break;
            }

            let label = record.label();
            tracing::info!(
                source = kind.as_str(),
                item = i + 1,
                total,
                %label,
                "processing record"
            );
            let message = self.builder.build(&record).await;
            let outcome = self.publisher.publish(&message, &label).await;

            // An attempt settles the record even when every endpoint refused it.
            self.store.mark_seen(key);
            if outcome.delivered() {
                stats.published += 1;
            } else {
                stats.failed += 1;
            }
        }

        if stats.skipped > 0 {
            counter!("records_skipped_total", "source" => kind.as_str())
                .increment(stats.skipped as u64);
            tracing::info!(
                source = kind.as_str(),
                skipped = stats.skipped,
                "skipped already published records"
            );
        }
        stats
    }
}
