// src/ingest/scheduler.rs
use crate::fetch::sleep_or_cancel;
use crate::ingest::{types::SourceProvider, CycleStats, DedupPolicy, Pipeline};
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Per-source cap in forced mode.
pub const FORCE_POST_LIMIT: usize = 5;

/// A source and the interval between the starts of two polls.
#[derive(Clone)]
pub struct ScheduledSource {
    pub provider: Arc<dyn SourceProvider>,
    pub interval: Duration,
}

impl ScheduledSource {
    pub fn new(provider: Arc<dyn SourceProvider>, interval: Duration) -> Self {
        Self { provider, interval }
    }
}

/// One poll of `provider`: units in order, each fully processed before
/// cancellation is looked at again. A failing unit is logged and the next
/// one still runs.
pub async fn poll_cycle(
    provider: &dyn SourceProvider,
    pipeline: &Pipeline,
    cancel: &CancellationToken,
    policy: DedupPolicy,
    limit: Option<usize>,
) -> CycleStats {
    let source = provider.name();
    let kind = provider.kind();
    let units = provider.units();
    let mut stats = CycleStats::default();
    tracing::info!(source, units = units.len(), ?policy, ?limit, "poll started");

    for (i, unit) in units.iter().enumerate() {
        if cancel.is_cancelled() {
            tracing::info!(source, unit = %unit, "poll cancelled");
            break;
        }

        match provider.fetch_unit(unit).await {
            Ok(records) => {
                let remaining = limit.map(|l| l.saturating_sub(stats.attempted()));
                let unit_stats = pipeline.process(kind, records, policy, remaining).await;
                tracing::debug!(source, unit = %unit, ?unit_stats, "unit done");
                stats.merge(unit_stats);
            }
            Err(e) => tracing::error!(source, unit = %unit, error = ?e, "unit failed"),
        }

        if limit.is_some_and(|l| stats.attempted() >= l) {
            tracing::info!(source, "limit reached");
            break;
        }
        if i + 1 < units.len() && sleep_or_cancel(cancel, provider.unit_pause()).await.is_err() {
            tracing::info!(source, "poll cancelled during pause");
            break;
        }
    }

    counter!("poll_cycles_total", "source" => source).increment(1);
    tracing::info!(
        source,
        fetched = stats.fetched,
        skipped = stats.skipped,
        published = stats.published,
        failed = stats.failed,
        "poll finished"
    );
    stats
}

/// Poll immediately, then on every tick until cancelled.
pub fn spawn_poll_loop(
    source: ScheduledSource,
    pipeline: Arc<Pipeline>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = source.provider.name();
        let mut ticker = tokio::time::interval(source.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(source = name, interval_secs = source.interval.as_secs(), "poll loop started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    poll_cycle(
                        source.provider.as_ref(),
                        &pipeline,
                        &cancel,
                        DedupPolicy::Respect,
                        None,
                    )
                    .await;
                }
            }
        }
        tracing::info!(source = name, "poll loop stopped");
    })
}

pub struct Daemon {
    pipeline: Arc<Pipeline>,
    sources: Vec<ScheduledSource>,
    cancel: CancellationToken,
}

impl Daemon {
    pub fn new(pipeline: Arc<Pipeline>, sources: Vec<ScheduledSource>, cancel: CancellationToken) -> Self {
        Self {
            pipeline,
            sources,
            cancel,
        }
    }

    /// Run one loop per source until the token is cancelled.
    pub async fn run(&self) {
        let handles: Vec<_> = self
            .sources
            .iter()
            .cloned()
            .map(|s| spawn_poll_loop(s, self.pipeline.clone(), self.cancel.clone()))
            .collect();

        for h in handles {
            if let Err(e) = h.await {
                tracing::error!(error = %e, "poll loop panicked");
            }
        }
        tracing::info!("daemon stopped");
    }

    /// Poll every source once with a fresh session set.
    pub async fn run_once(&self) -> CycleStats {
        self.pipeline.store.reset_session();
        self.run_each(DedupPolicy::Respect, None).await
    }

    /// Publish up to [`FORCE_POST_LIMIT`] records per source, seen or not.
    pub async fn run_forced(&self) -> CycleStats {
        self.run_forced_with_limit(FORCE_POST_LIMIT).await
    }

    pub async fn run_forced_with_limit(&self, limit: usize) -> CycleStats {
        tracing::warn!(limit, "forced mode: duplicate check disabled");
        self.run_each(DedupPolicy::Ignore, Some(limit)).await
    }

    async fn run_each(&self, policy: DedupPolicy, limit: Option<usize>) -> CycleStats {
        let mut total = CycleStats::default();
        for source in &self.sources {
            if self.cancel.is_cancelled() {
                break;
            }
            let stats = poll_cycle(
                source.provider.as_ref(),
                &self.pipeline,
                &self.cancel,
                policy,
                limit,
            )
            .await;
            total.merge(stats);
        }
        total
    }
}
