// src/message/builder.rs
//! Source record -> outbound message. Missing fields degrade the output,
//! they never fail the record.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use url::Url;

use super::geo::GeoInfo;
use super::{OutboundMessage, KIND_TEXT_NOTE};
use crate::geocode::Geocoder;
use crate::ingest::types::{FeedEntry, SourceRecord, SpotRow};
use crate::ingest::{strip_html, truncate_chars};

pub const SUMMARY_MAX_CHARS: usize = 160;

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("tag regex"));
static RE_AUTHOR_JUNK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").expect("author regex"));

/// `https://host/ru/index.php?title=X&diff=1&oldid=2` -> `{canonical_base}/ru/X`.
/// The host of `link` is ignored, so mirror links map to the canonical site.
pub fn article_url(link: &str, canonical_base: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    // need `/<lang>/<script>`
    if segments.len() < 2 {
        return None;
    }
    let language = segments[0];
    let title = url
        .query()?
        .split('&')
        .find_map(|kv| kv.strip_prefix("title="))
        .filter(|t| !t.is_empty())?;
    Some(format!(
        "{}/{}/{}",
        canonical_base.trim_end_matches('/'),
        language,
        title
    ))
}

/// Strip markup and anything but word characters, whitespace and hyphens.
pub fn clean_author(author: &str) -> String {
    let no_tags = RE_TAGS.replace_all(author, "");
    RE_AUTHOR_JUNK
        .replace_all(&no_tags, "")
        .trim()
        .to_string()
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

pub struct MessageBuilder {
    geocoder: Arc<dyn Geocoder>,
    canonical_base: String,
}

impl MessageBuilder {
    pub fn new(geocoder: Arc<dyn Geocoder>, canonical_base: &str) -> Self {
        Self {
            geocoder,
            canonical_base: canonical_base.trim_end_matches('/').to_string(),
        }
    }

    pub async fn build(&self, record: &SourceRecord) -> OutboundMessage {
        match record {
            SourceRecord::Feed(entry) => self.build_feed(entry).await,
            SourceRecord::Snapshot(row) => build_snapshot(row),
        }
    }

    pub async fn build_feed(&self, entry: &FeedEntry) -> OutboundMessage {
        let article = entry
            .link
            .as_deref()
            .and_then(|l| article_url(l, &self.canonical_base));
        let author = entry
            .author
            .as_deref()
            .map(clean_author)
            .filter(|a| !a.is_empty());
        let title = non_empty(entry.title.as_deref()).unwrap_or(entry.id.as_str());

        let content = match (&article, &author) {
            (Some(url), Some(author)) => format!("📝 {author} edited {url} 📄 #hitchhiking"),
            (Some(url), None) => format!("📝 edited {url} 📄 #hitchhiking"),
            (None, _) => format!("📝 {title} 📄 #hitchhiking"),
        };

        let mut msg = OutboundMessage::new(KIND_TEXT_NOTE, content);
        msg.push_tag(&["r", entry.id.as_str()]);
        msg.push_tag(&["summary", summary_for(entry, title, author.as_deref()).as_str()]);
        msg.push_tag(&["t", "hitchhiking"]);
        msg.push_tag(&["t", "hitchwiki"]);

        let geo = match &article {
            Some(url) => self.geocoder.locate(url).await,
            None => None,
        };
        match geo {
            Some((lat, lng)) => {
                let g = GeoInfo::from_coords(lat, lng);
                tracing::debug!(
                    lat = g.lat,
                    lng = g.lng,
                    plus_code = %g.plus_code,
                    geohash = %g.geohash,
                    "geo info attached"
                );
                msg.push_tag(&["g", g.coord_string().as_str()]);
                msg.push_tag(&["L", "open-location-code"]);
                msg.push_tag(&["l", g.plus_code.as_str(), "open-location-code"]);
                msg.push_tag(&["g", g.geohash.as_str()]);
            }
            None => tracing::debug!(id = %entry.id, "no geo info"),
        }
        msg
    }
}

fn summary_for(entry: &FeedEntry, title: &str, author: Option<&str>) -> String {
    let cleaned = entry.summary.as_deref().map(strip_html).unwrap_or_default();
    let summary = if cleaned.is_empty() {
        match author {
            Some(a) => format!("Hitchwiki article '{title}' was edited by {a}"),
            None => format!("Hitchwiki article '{title}' was edited"),
        }
    } else {
        cleaned
    };
    truncate_chars(&summary, SUMMARY_MAX_CHARS)
}

/// Snapshot rows carry their own coordinates, so no network is involved.
pub fn build_snapshot(row: &SpotRow) -> OutboundMessage {
    let content = match (non_empty(row.nickname.as_deref()), non_empty(row.comment.as_deref())) {
        (Some(nick), Some(comment)) => format!("hitchmap.com {nick}: {comment} #hitchhiking"),
        (Some(nick), None) => format!("hitchmap.com {nick} #hitchhiking"),
        (None, Some(comment)) => format!("hitchmap.com: {comment} #hitchhiking"),
        (None, None) => "hitchmap.com #hitchhiking".to_string(),
    };

    let g = GeoInfo::from_coords(row.lat, row.lng);
    let [p6, p4, p2] = g.plus_code_prefixes();
    let id = row.id.to_string();

    let mut msg = OutboundMessage::new(KIND_TEXT_NOTE, content);
    msg.push_tag(&["d", id.as_str()]);
    msg.push_tag(&["g", g.coord_string().as_str()]);
    msg.push_tag(&["L", "open-location-code"]);
    msg.push_tag(&["l", g.plus_code.as_str(), "open-location-code"]);
    msg.push_tag(&["L", "open-location-code-prefix"]);
    msg.push_tag(&[
        "l",
        p6.as_str(),
        p4.as_str(),
        p2.as_str(),
        "open-location-code-prefix",
    ]);
    msg.push_tag(&["L", "trustroots-circle"]);
    msg.push_tag(&["l", "hitchhikers", "trustroots-circle"]);
    msg.push_tag(&["g", g.geohash.as_str()]);
    msg.push_tag(&["t", "hitchmap"]);
    msg.push_tag(&["t", "map-notes"]);
    msg
}
