// src/publish/nostr.rs
//! Relay transport backed by nostr-sdk: signing, connections and wire
//! encoding all live in the SDK.

use anyhow::{Context, Result};
use async_trait::async_trait;
use nostr_sdk::{Client, EventBuilder, Filter, JsonUtil, Keys, Kind, Tag};
use std::time::Duration;

use super::{PublishReport, Transport};
use crate::message::OutboundMessage;

const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct NostrTransport {
    client: Client,
    keys: Keys,
    relays: Vec<String>,
}

impl NostrTransport {
    /// Parse the identity and connect to every relay that accepts a connection.
    pub async fn connect(secret_key: &str, relays: &[String]) -> Result<Self> {
        let keys = Keys::parse(secret_key.trim()).context("decoding secret key")?;
        let client = Client::new(keys.clone());

        let mut added = Vec::with_capacity(relays.len());
        for url in relays.iter().map(|r| r.trim()).filter(|r| !r.is_empty()) {
            match client.add_relay(url).await {
                Ok(_) => added.push(url.to_string()),
                Err(e) => tracing::warn!(relay = %url, error = %e, "relay rejected"),
            }
        }
        client.connect().await;

        tracing::info!(
            public_key = %keys.public_key(),
            relays = added.len(),
            "relay client initialized"
        );
        Ok(Self {
            client,
            keys,
            relays: added,
        })
    }

    pub async fn disconnect(&self) {
        let _ = self.client.disconnect().await;
    }
}

fn to_tags(message: &OutboundMessage) -> Vec<Tag> {
    message
        .tags
        .iter()
        .filter_map(|fields| match Tag::parse(fields.as_slice()) {
            Ok(tag) => Some(tag),
            Err(e) => {
                tracing::warn!(tag = ?fields, error = %e, "dropping malformed tag");
                None
            }
        })
        .collect()
}

#[async_trait]
impl Transport for NostrTransport {
    fn endpoints(&self) -> Vec<String> {
        self.relays.clone()
    }

    async fn publish(&self, message: &OutboundMessage) -> PublishReport {
        let mut report = PublishReport::default();

        // Sign once so every relay receives the same event id.
        let event = match EventBuilder::new(Kind::from(message.kind), message.content.as_str())
            .tags(to_tags(message))
            .sign_with_keys(&self.keys)
        {
            Ok(ev) => ev,
            Err(e) => {
                for relay in &self.relays {
                    report.rejected.push((relay.clone(), format!("signing failed: {e}")));
                }
                return report;
            }
        };

        for relay in &self.relays {
            match self
                .client
                .send_event_to([relay.as_str()], event.clone())
                .await
            {
                Ok(output) if !output.success.is_empty() => report.accepted.push(relay.clone()),
                Ok(output) => report
                    .rejected
                    .push((relay.clone(), format!("{:?}", output.failed))),
                Err(e) => report.rejected.push((relay.clone(), e.to_string())),
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
        let filter = Filter::new()
            .author(self.keys.public_key())
            .kinds(kinds.iter().map(|k| Kind::from(*k)))
            .limit(limit);

        let events = self
            .client
            .fetch_events_from([endpoint], vec![filter], Some(QUERY_TIMEOUT))
            .await
            .with_context(|| format!("querying {endpoint}"))?;

        let mut out = Vec::new();
        for event in events.into_iter() {
            match serde_json::from_str::<OutboundMessage>(&event.as_json()) {
                Ok(m) => out.push(m),
                Err(e) => tracing::warn!(%endpoint, error = %e, "skipping unreadable event"),
            }
        }
        Ok(out)
    }
}
