// src/publish/mod.rs
pub mod nostr;

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;
use std::sync::Arc;

use crate::message::OutboundMessage;

/// Per-endpoint outcome of one publish call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishReport {
    pub accepted: Vec<String>,
    pub rejected: Vec<(String, String)>,
}

impl PublishReport {
    pub fn any_accepted(&self) -> bool {
        !self.accepted.is_empty()
    }
}

/// Broadcast capability bound to one publishing identity.
/// Individual endpoint failures are reported, never raised.
#[async_trait]
pub trait Transport: Send + Sync {
    fn endpoints(&self) -> Vec<String>;

    async fn publish(&self, message: &OutboundMessage) -> PublishReport;

    /// Messages previously published by this identity, newest first.
    async fn query_by_author(
        &self,
        endpoint: &str,
        kinds: &[u16],
        limit: usize,
    ) -> Result<Vec<OutboundMessage>>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    DryRun,
    Sent(PublishReport),
}

impl PublishOutcome {
    /// Whether at least one endpoint took the message (always true in dry-run).
    pub fn delivered(&self) -> bool {
        match self {
            PublishOutcome::DryRun => true,
            PublishOutcome::Sent(report) => report.any_accepted(),
        }
    }
}

/// Wraps the transport with dry-run handling and logging.
#[derive(Clone)]
pub struct Publisher {
    transport: Arc<dyn Transport>,
    dry_run: bool,
}

impl Publisher {
    pub fn new(transport: Arc<dyn Transport>, dry_run: bool) -> Self {
        Self { transport, dry_run }
    }

    pub async fn publish(&self, message: &OutboundMessage, label: &str) -> PublishOutcome {
        if self.dry_run {
            tracing::info!(
                %label,
                content = %message.content,
                tags = ?message.tags,
                "[dry run] would publish"
            );
            return PublishOutcome::DryRun;
        }

        let report = self.transport.publish(message).await;
        for (endpoint, reason) in &report.rejected {
            tracing::warn!(%label, %endpoint, %reason, "endpoint rejected message");
            counter!("publish_endpoint_errors_total").increment(1);
        }
        if report.any_accepted() {
            counter!("messages_published_total").increment(1);
            tracing::info!(
                %label,
                accepted = report.accepted.len(),
                rejected = report.rejected.len(),
                "published"
            );
        } else {
            tracing::error!(%label, "no endpoint accepted message");
        }
        PublishOutcome::Sent(report)
    }
}
