// src/ingest/types.rs
use anyhow::Result;
use std::time::Duration;

use crate::dedup::DedupKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Feed,
    Snapshot,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Feed => "feed",
            SourceKind::Snapshot => "snapshot",
        }
    }
}

/// One recent-changes entry. Every field is best-effort.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FeedEntry {
    /// Stable identity; the entry `<id>` or, failing that, its link.
    pub id: String,
    pub language: String,
    pub title: Option<String>,
    /// Diff-style revision link, rewritten to the canonical wiki base.
    pub link: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
}

/// One row of the `points` table in the snapshot dump.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SpotRow {
    pub id: i64,
    pub lat: f64,
    pub lng: f64,
    pub rating: Option<f64>,
    pub country: Option<String>,
    pub wait: Option<i64>,
    pub nickname: Option<String>,
    pub comment: Option<String>,
    pub datetime: String,
    pub dest_lat: Option<f64>,
    pub dest_lng: Option<f64>,
    pub signal: Option<String>,
    pub ride_datetime: Option<String>,
    pub user_id: Option<i64>,
    pub from_hitchwiki: Option<bool>,
}

/// Normalized unit produced by an adapter, consumed once by the builder.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum SourceRecord {
    Feed(FeedEntry),
    Snapshot(SpotRow),
}

impl SourceRecord {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceRecord::Feed(_) => SourceKind::Feed,
            SourceRecord::Snapshot(_) => SourceKind::Snapshot,
        }
    }

    pub fn dedup_key(&self) -> DedupKey {
        match self {
            SourceRecord::Feed(e) => DedupKey::feed(&e.id),
            SourceRecord::Snapshot(r) => DedupKey::snapshot(r.id),
        }
    }

    /// Short human label for logs.
    pub fn label(&self) -> String {
        match self {
            SourceRecord::Feed(e) => format!(
                "{} ({})",
                e.title.as_deref().unwrap_or(e.id.as_str()),
                e.language
            ),
            SourceRecord::Snapshot(r) => format!("hitchmap #{}", r.id),
        }
    }
}

/// A source polled in ordered units (languages, or a single dump).
/// Cancellation is honoured between units, never inside one.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn kind(&self) -> SourceKind;
    fn units(&self) -> Vec<String>;
    /// Pause between two consecutive units of one poll.
    fn unit_pause(&self) -> Duration {
        Duration::ZERO
    }
    async fn fetch_unit(&self, unit: &str) -> Result<Vec<SourceRecord>>;
}
