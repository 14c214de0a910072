// tests/providers_wiki_feed.rs
mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fetcher, pipeline, RecordingTransport, StaticHttp, BASE};
use nostrhitch::geocode::NoGeocoder;
use nostrhitch::ingest::providers::wiki_feed::{parse_feed, LinkRewriter, WikiFeedProvider};
use nostrhitch::ingest::scheduler::poll_cycle;
use nostrhitch::ingest::types::SourceProvider;
use nostrhitch::ingest::DedupPolicy;
use nostrhitch::message::MessageBuilder;
use nostrhitch::DedupStore;
use tokio_util::sync::CancellationToken;

const MIRROR: &str = "https://mirror.example.net";
const FIXTURE: &str = include_str!("fixtures/hitchwiki_atom.xml");

fn rewriter() -> LinkRewriter {
    LinkRewriter::new(BASE, MIRROR)
}

#[test]
fn fixture_entries_in_feed_order() {
    let entries = parse_feed(FIXTURE, "en", &rewriter());
    let titles: Vec<_> = entries.iter().filter_map(|e| e.title.as_deref()).collect();
    assert_eq!(titles, vec!["Berlin", "Route 66", "Lyon"]);
}

#[test]
fn mirror_links_become_canonical() {
    let entries = parse_feed(FIXTURE, "en", &rewriter());
    assert_eq!(
        entries[0].id,
        "https://hitchwiki.org/en/index.php?title=Berlin&diff=123456&oldid=123400"
    );
    assert_eq!(entries[0].link.as_deref(), Some(entries[0].id.as_str()));
    assert!(entries.iter().all(|e| !e.id.contains("mirror.example.net")));
}

#[test]
fn missing_fields_are_none() {
    let entries = parse_feed(FIXTURE, "en", &rewriter());
    assert_eq!(entries[0].author.as_deref(), Some("Anna.K"));
    assert!(entries[1].summary.is_none());
    assert!(entries[2].author.is_none());
    assert!(entries[2].summary.is_none());
}

#[tokio::test]
async fn fixture_messages() {
    let entries = parse_feed(FIXTURE, "en", &rewriter());
    let builder = MessageBuilder::new(Arc::new(NoGeocoder), BASE);

    let berlin = builder.build_feed(&entries[0]).await;
    assert_eq!(
        berlin.content,
        "📝 AnnaK edited https://hitchwiki.org/en/Berlin 📄 #hitchhiking"
    );
    assert_eq!(
        berlin.tag_values("summary").next(),
        Some("Updated the spot at the A100 on-ramp")
    );

    let route = builder.build_feed(&entries[1]).await;
    assert!(route.content.contains("https://hitchwiki.org/en/Route_66"));
    assert_eq!(
        route.tag_values("summary").next(),
        Some("Hitchwiki article 'Route 66' was edited by Tom")
    );
}

#[tokio::test]
async fn provider_fetches_through_mirror() {
    let http = Arc::new(StaticHttp::default());
    let url_source = WikiFeedProvider::new(fetcher(http.clone()), BASE, MIRROR, vec!["en".into()]);
    let url = url_source.feed_url("en");
    assert!(url.starts_with("https://mirror.example.net/en/api.php?"));
    assert!(url.contains("action=feedrecentchanges&feedformat=atom"));

    let http = Arc::new(StaticHttp::default().with(&url, FIXTURE));
    let provider = WikiFeedProvider::new(fetcher(http.clone()), BASE, MIRROR, vec!["en".into()]);
    let records = provider.fetch_unit("en").await.unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(http.calls(), vec![url]);
}

#[tokio::test]
async fn failing_language_does_not_stop_the_poll() {
    let url_source = WikiFeedProvider::new(
        fetcher(Arc::new(StaticHttp::default())),
        BASE,
        MIRROR,
        vec![],
    );
    // "de" is not served and fails after its retries; "en" still goes through.
    let http = Arc::new(StaticHttp::default().with(&url_source.feed_url("en"), FIXTURE));
    let provider = WikiFeedProvider::new(
        fetcher(http),
        BASE,
        MIRROR,
        vec!["de".into(), "en".into()],
    )
    .with_pause(Duration::ZERO);

    let transport = Arc::new(RecordingTransport::new(&["wss://a"]));
    let pipe = pipeline(transport.clone(), DedupStore::new(), false);
    let stats = poll_cycle(
        &provider,
        &pipe,
        &CancellationToken::new(),
        DedupPolicy::Respect,
        None,
    )
    .await;

    assert_eq!(stats.published, 3);
    assert_eq!(transport.publish_count(), 3);
}
