// tests/common/mod.rs
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nostrhitch::error::FetchError;
use nostrhitch::fetch::http::{HttpClient, HttpResponse};
use nostrhitch::fetch::{CachedFetcher, FetchPolicy};
use nostrhitch::geocode::NoGeocoder;
use nostrhitch::ingest::types::{FeedEntry, SourceKind, SourceProvider, SourceRecord, SpotRow};
use nostrhitch::ingest::Pipeline;
use nostrhitch::message::{MessageBuilder, OutboundMessage};
use nostrhitch::publish::{PublishReport, Publisher, Transport};
use nostrhitch::DedupStore;
use tokio_util::sync::CancellationToken;

pub const BASE: &str = "https://hitchwiki.org";
pub const HOST: &str = "hitchwiki.org";

/// In-memory relay set: records every publish, answers queries from seeds.
pub struct RecordingTransport {
    endpoints: Vec<String>,
    published: Mutex<Vec<OutboundMessage>>,
    seeded: Mutex<HashMap<String, Vec<OutboundMessage>>>,
    failing_queries: Vec<String>,
    reject_all: bool,
}

impl RecordingTransport {
    pub fn new(endpoints: &[&str]) -> Self {
        Self {
            endpoints: endpoints.iter().map(|s| s.to_string()).collect(),
            published: Mutex::new(Vec::new()),
            seeded: Mutex::new(HashMap::new()),
            failing_queries: Vec::new(),
            reject_all: false,
        }
    }

    pub fn rejecting(mut self) -> Self {
        self.reject_all = true;
        self
    }

    pub fn failing_query(mut self, endpoint: &str) -> Self {
        self.failing_queries.push(endpoint.to_string());
        self
    }

    pub fn seed(&self, endpoint: &str, msg: OutboundMessage) {
        self.seeded
            .lock()
            .unwrap()
            .entry(endpoint.to_string())
            .or_default()
            .push(msg);
    }

    pub fn published(&self) -> Vec<OutboundMessage> {
        self.published.lock().unwrap().clone()
    }

    pub fn publish_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn endpoints(&self) -> Vec<String> {
        self.endpoints.clone()
    }

    async fn publish(&self, message: &OutboundMessage) -> PublishReport {
        self.published.lock().unwrap().push(message.clone());
        let mut report = PublishReport::default();
        for e in &self.endpoints {
            if self.reject_all {
                report.rejected.push((e.clone(), "blocked".into()));
            } else {
                report.accepted.push(e.clone());
            }
        }
        report
    }

    async fn query_by_author(
        &self,
        endpoint: &str,
        kinds: &[u16],
        limit: usize,
    ) -> Result<Vec<OutboundMessage>> {
        if self.failing_queries.iter().any(|e| e == endpoint) {
            anyhow::bail!("connection refused");
        }
        Ok(self
            .seeded
            .lock()
            .unwrap()
            .get(endpoint)
            .map(|msgs| {
                msgs.iter()
                    .filter(|m| kinds.contains(&m.kind))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Serves fixed bodies per URL and counts requests.
#[derive(Default)]
pub struct StaticHttp {
    bodies: HashMap<String, Vec<u8>>,
    calls: Mutex<Vec<String>>,
}

impl StaticHttp {
    pub fn with(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.to_string(), body.into());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for StaticHttp {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.bodies.get(url) {
            Some(b) => Ok(HttpResponse {
                status: 200,
                body: Bytes::from(b.clone()),
            }),
            None => Ok(HttpResponse {
                status: 404,
                body: Bytes::new(),
            }),
        }
    }
}

pub fn fast_policy() -> FetchPolicy {
    FetchPolicy {
        pacing: Duration::ZERO,
        retry_base: Duration::from_millis(1),
        ..FetchPolicy::default()
    }
}

pub fn fetcher(http: Arc<StaticHttp>) -> Arc<CachedFetcher> {
    Arc::new(CachedFetcher::new(http, fast_policy(), CancellationToken::new()))
}

/// Source returning the same records on every poll.
pub struct FixedProvider {
    pub name: &'static str,
    pub kind: SourceKind,
    pub units: Vec<(String, Vec<SourceRecord>)>,
    pub pause: Duration,
    pub fetches: Mutex<usize>,
}

impl FixedProvider {
    pub fn feed(entries: Vec<FeedEntry>) -> Self {
        Self {
            name: "hitchwiki",
            kind: SourceKind::Feed,
            units: vec![(
                "en".into(),
                entries.into_iter().map(SourceRecord::Feed).collect(),
            )],
            pause: Duration::ZERO,
            fetches: Mutex::new(0),
        }
    }

    pub fn snapshot(rows: Vec<SpotRow>) -> Self {
        Self {
            name: "hitchmap",
            kind: SourceKind::Snapshot,
            units: vec![(
                "dump".into(),
                rows.into_iter().map(SourceRecord::Snapshot).collect(),
            )],
            pause: Duration::ZERO,
            fetches: Mutex::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl SourceProvider for FixedProvider {
    fn name(&self) -> &'static str {
        self.name
    }
    fn kind(&self) -> SourceKind {
        self.kind
    }
    fn units(&self) -> Vec<String> {
        self.units.iter().map(|(u, _)| u.clone()).collect()
    }
    fn unit_pause(&self) -> Duration {
        self.pause
    }
    async fn fetch_unit(&self, unit: &str) -> Result<Vec<SourceRecord>> {
        *self.fetches.lock().unwrap() += 1;
        self.units
            .iter()
            .find(|(u, _)| u == unit)
            .map(|(_, r)| r.clone())
            .ok_or_else(|| anyhow::anyhow!("unknown unit {unit}"))
    }
}

pub fn feed_entry(n: usize) -> FeedEntry {
    let link = format!("{BASE}/en/index.php?title=Page_{n}&diff={n}&oldid=1");
    FeedEntry {
        id: link.clone(),
        language: "en".into(),
        title: Some(format!("Page {n}")),
        link: Some(link),
        author: Some("tester".into()),
        summary: Some("edit".into()),
    }
}

pub fn spot(id: i64) -> SpotRow {
    SpotRow {
        id,
        lat: 50.0 + id as f64 / 100.0,
        lng: 10.0,
        nickname: Some(format!("user{id}")),
        comment: Some("ok spot".into()),
        datetime: "2025-01-10 12:00:00".into(),
        ..Default::default()
    }
}

pub fn builder() -> MessageBuilder {
    MessageBuilder::new(Arc::new(NoGeocoder), BASE)
}

pub fn pipeline(transport: Arc<RecordingTransport>, store: DedupStore, dry_run: bool) -> Arc<Pipeline> {
    Arc::new(Pipeline::new(
        Arc::new(store),
        builder(),
        Publisher::new(transport, dry_run),
    ))
}
