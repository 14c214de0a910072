// src/geocode.rs
//! Best-effort coordinates for a wiki article: fetch the page, look for a map
//! marker. Absence is not an error.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::fetch::CachedFetcher;

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn locate(&self, article_url: &str) -> Option<(f64, f64)>;
}

/// Never resolves anything.
pub struct NoGeocoder;

#[async_trait]
impl Geocoder for NoGeocoder {
    async fn locate(&self, _article_url: &str) -> Option<(f64, f64)> {
        None
    }
}

static MAP_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"<map[^>]*lat=['"]([0-9.-]+)['"][^>]*lng=['"]([0-9.-]+)['"]"#,
        r#"&lt;map[^>]*lat=['"]([0-9.-]+)['"][^>]*lng=['"]([0-9.-]+)['"]"#,
        r#"<div[^>]*class="[^"]*map[^"]*"[^>]*data-lat="([^"]+)"[^>]*data-lng="([^"]+)""#,
        r#"\|map\s*=\s*<map\s+lat="([^"]+)"\s+lng="([^"]+)""#,
        r#"&lt;map lat='([0-9.-]+)' lng='([0-9.-]+)'"#,
        r#"<map lat='([0-9.-]+)' lng='([0-9.-]+)'"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("map pattern"))
    .collect()
});

/// First plausible (lat, lng) found in a page body.
pub fn extract_coordinates(body: &str) -> Option<(f64, f64)> {
    MAP_PATTERNS.iter().find_map(|re| {
        let caps = re.captures(body)?;
        let lat: f64 = caps.get(1)?.as_str().parse().ok()?;
        let lng: f64 = caps.get(2)?.as_str().parse().ok()?;
        ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)).then_some((lat, lng))
    })
}

/// Fetches article pages through the shared fetcher, optionally via a mirror.
pub struct PageGeocoder {
    fetcher: Arc<CachedFetcher>,
    canonical_base: String,
    fetch_base: String,
}

impl PageGeocoder {
    pub fn new(fetcher: Arc<CachedFetcher>, canonical_base: &str, fetch_base: &str) -> Self {
        Self {
            fetcher,
            canonical_base: canonical_base.trim_end_matches('/').to_string(),
            fetch_base: fetch_base.trim_end_matches('/').to_string(),
        }
    }

    fn fetch_url(&self, article_url: &str) -> String {
        match article_url.strip_prefix(&self.canonical_base) {
            Some(rest) if self.fetch_base != self.canonical_base => {
                format!("{}{}", self.fetch_base, rest)
            }
            _ => article_url.to_string(),
        }
    }
}

#[async_trait]
impl Geocoder for PageGeocoder {
    async fn locate(&self, article_url: &str) -> Option<(f64, f64)> {
        let url = self.fetch_url(article_url);
        let body = match self.fetcher.fetch(&url).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(%url, error = %e, "article fetch for geo info failed");
                return None;
            }
        };
        let found = extract_coordinates(&String::from_utf8_lossy(&body));
        if found.is_none() {
            tracing::debug!(%url, "no map marker in article");
        }
        found
    }
}
