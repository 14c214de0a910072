// src/fetch/mod.rs
//! Cached, paced, retrying upstream fetcher shared by both sources.

pub mod cache;
pub mod http;

use bytes::Bytes;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;
use cache::FetchCache;
use http::HttpClient;

/// Body fragment served by the CDN instead of real content.
pub const CHALLENGE_SIGNATURE: &str = "Just a moment";

#[derive(Debug, Clone, Copy)]
pub struct FetchPolicy {
    /// How long a cached response is served without touching the network.
    pub freshness: Duration,
    /// Delay before every network fetch.
    pub pacing: Duration,
    pub max_attempts: u32,
    /// Retry N waits `N * retry_base`.
    pub retry_base: Duration,
    /// Absolute per-request timeout (enforced by the HTTP client).
    pub timeout: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            freshness: Duration::from_secs(60),
            pacing: Duration::from_secs(5),
            max_attempts: 3,
            retry_base: Duration::from_secs(5),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Sleep unless cancelled first. Every suspension point of the pipeline goes
/// through here.
pub async fn sleep_or_cancel(cancel: &CancellationToken, dur: Duration) -> Result<(), FetchError> {
    if dur.is_zero() {
        return if cancel.is_cancelled() {
            Err(FetchError::Cancelled)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        _ = tokio::time::sleep(dur) => Ok(()),
    }
}

pub struct CachedFetcher {
    client: Arc<dyn HttpClient>,
    cache: FetchCache,
    policy: FetchPolicy,
    cancel: CancellationToken,
}

impl CachedFetcher {
    pub fn new(client: Arc<dyn HttpClient>, policy: FetchPolicy, cancel: CancellationToken) -> Self {
        Self {
            client,
            cache: FetchCache::new(policy.freshness),
            policy,
            cancel,
        }
    }

    /// Fetch `url`, serving a fresh cached copy when there is one.
    pub async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        if let Some(hit) = self.cache.get_fresh(url, Instant::now()) {
            tracing::debug!(%url, bytes = hit.len(), "fetch cache hit");
            counter!("fetch_cache_hits_total").increment(1);
            return Ok(hit);
        }

        sleep_or_cancel(&self.cancel, self.policy.pacing).await?;

        let body = self.fetch_with_retries(url).await?;
        self.cache.insert(url, body.clone(), Instant::now());
        Ok(body)
    }

    async fn fetch_with_retries(&self, url: &str) -> Result<Bytes, FetchError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last = FetchError::Network("no attempt made".into());

        for attempt in 1..=attempts {
            counter!("fetch_requests_total").increment(1);
            match self.attempt(url).await {
                Ok(body) => {
                    tracing::debug!(%url, attempt, bytes = body.len(), "fetch ok");
                    return Ok(body);
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    tracing::warn!(%url, attempt, max_attempts = attempts, error = %e, "fetch attempt failed");
                    last = e;
                }
            }

            if attempt < attempts {
                counter!("fetch_retries_total").increment(1);
                let delay = self.policy.retry_base * attempt;
                sleep_or_cancel(&self.cancel, delay).await?;
            }
        }

        counter!("fetch_failures_total").increment(1);
        tracing::error!(%url, attempts, error = %last, "fetch failed");
        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts,
            last: Box::new(last),
        })
    }

    async fn attempt(&self, url: &str) -> Result<Bytes, FetchError> {
        let resp = self.client.get(url).await?;
        if !(200..300).contains(&resp.status) {
            return Err(FetchError::Status(resp.status));
        }
        if is_challenge(&resp.body) {
            return Err(FetchError::Challenge);
        }
        Ok(resp.body)
    }
}

fn is_challenge(body: &[u8]) -> bool {
    let needle = CHALLENGE_SIGNATURE.as_bytes();
    body.windows(needle.len()).any(|w| w == needle)
}
