// tests/fetch_cache.rs
mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fast_policy, StaticHttp};
use nostrhitch::error::FetchError;
use nostrhitch::fetch::{CachedFetcher, FetchPolicy};
use tokio_util::sync::CancellationToken;

const URL: &str = "https://hitchwiki.org/en/api.php?action=feedrecentchanges";

#[tokio::test]
async fn fresh_entry_skips_network() {
    let http = Arc::new(StaticHttp::default().with(URL, "<feed/>"));
    let fetcher = CachedFetcher::new(http.clone(), fast_policy(), CancellationToken::new());

    let a = fetcher.fetch(URL).await.unwrap();
    let b = fetcher.fetch(URL).await.unwrap();

    assert_eq!(a, b);
    assert_eq!(http.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stale_entry_is_refetched() {
    let http = Arc::new(StaticHttp::default().with(URL, "<feed/>"));
    let fetcher = CachedFetcher::new(http.clone(), fast_policy(), CancellationToken::new());

    fetcher.fetch(URL).await.unwrap();
    tokio::time::advance(Duration::from_secs(61)).await;
    fetcher.fetch(URL).await.unwrap();

    assert_eq!(http.calls().len(), 2);
}

#[tokio::test]
async fn challenge_page_exhausts_attempts() {
    let http = Arc::new(
        StaticHttp::default().with(URL, "<html><title>Just a moment...</title></html>"),
    );
    let fetcher = CachedFetcher::new(http.clone(), fast_policy(), CancellationToken::new());

    match fetcher.fetch(URL).await {
        Err(FetchError::Exhausted { attempts, last, .. }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, FetchError::Challenge));
        }
        other => panic!("expected exhausted fetch, got {other:?}"),
    }
    assert_eq!(http.calls().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn pacing_delay_precedes_network_call() {
    let http = Arc::new(StaticHttp::default().with(URL, "ok"));
    let policy = FetchPolicy {
        pacing: Duration::from_secs(5),
        ..FetchPolicy::default()
    };
    let fetcher = Arc::new(CachedFetcher::new(http.clone(), policy, CancellationToken::new()));

    let task = {
        let f = fetcher.clone();
        tokio::spawn(async move { f.fetch(URL).await })
    };
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(http.calls().is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(task.await.unwrap().is_ok());
    assert_eq!(http.calls().len(), 1);
}
