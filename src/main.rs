//! nostrhitch daemon entrypoint.
//! Loads configuration, wires fetcher, dedup store and relay transport, then
//! runs the poll loops (or a single pass) until a shutdown signal.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use nostrhitch::config::Config;
use nostrhitch::dedup::DedupStore;
use nostrhitch::fetch::{http::ReqwestClient, CachedFetcher, FetchPolicy};
use nostrhitch::geocode::PageGeocoder;
use nostrhitch::ingest::providers::{hitchmap::SnapshotProvider, wiki_feed::WikiFeedProvider};
use nostrhitch::ingest::scheduler::{Daemon, ScheduledSource};
use nostrhitch::ingest::{CycleStats, Pipeline};
use nostrhitch::message::MessageBuilder;
use nostrhitch::publish::{nostr::NostrTransport, Publisher, Transport};
use nostrhitch::{logging, metrics, profile};

#[derive(Parser, Debug)]
#[command(
    name = "nostrhitch",
    version,
    about = "Republishes Hitchwiki changes and Hitchmap spots to Nostr relays"
)]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(long)]
    debug: bool,

    /// Build messages but do not send them
    #[arg(long)]
    dry_run: bool,

    /// Poll each source once, then exit
    #[arg(long)]
    once: bool,

    /// Publish up to 5 items per source ignoring the duplicate check, then exit
    #[arg(long, conflicts_with = "once")]
    force_post: bool,

    /// Start with an empty baseline instead of querying relays
    #[arg(long)]
    disable_duplicate_check: bool,
}

/// First SIGINT/SIGTERM cancels `cancel`; a second one exits immediately.
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if wait_for_signal().await.is_err() {
            return;
        }
        tracing::info!("shutdown requested, finishing current work");
        cancel.cancel();

        if wait_for_signal().await.is_ok() {
            tracing::warn!("second signal, exiting now");
            std::process::exit(1);
        }
    });
}

async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            r = signal::ctrl_c() => r,
            _ = term.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        signal::ctrl_c().await
    }
}

fn load_config(cli: &Cli) -> Result<Config, nostrhitch::error::ConfigError> {
    let path = Config::resolve_path(cli.config.as_deref())?;
    let mut cfg = Config::load_from(&path)?;
    cfg.debug |= cli.debug;
    cfg.dry_run |= cli.dry_run;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let cfg = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(2);
        }
    };

    let _guard = match logging::init(&cfg.log_dir, cfg.debug) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("logging setup failed: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli, cfg).await {
        Ok(stats) => {
            if let Some(s) = stats {
                tracing::info!(
                    fetched = s.fetched,
                    skipped = s.skipped,
                    published = s.published,
                    failed = s.failed,
                    "run complete"
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = ?e, "fatal");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, cfg: Config) -> anyhow::Result<Option<CycleStats>> {
    tracing::info!(config = ?cfg, "starting nostrhitch");
    metrics::install(cfg.metrics_addr)?;

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let policy = FetchPolicy::default();
    let client = Arc::new(ReqwestClient::new(policy.timeout)?);
    let fetcher = Arc::new(CachedFetcher::new(client, policy, cancel.clone()));

    let nostr = Arc::new(
        NostrTransport::connect(&cfg.nsec, &cfg.relays)
            .await
            .context("connecting to relays")?,
    );
    let transport: Arc<dyn Transport> = nostr.clone();

    let canonical_base = cfg.canonical_base();
    let fetch_base = cfg.fetch_base();
    let canonical_host = url::Url::parse(&canonical_base)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();

    let store = if cli.disable_duplicate_check {
        tracing::warn!("duplicate check disabled, starting with an empty baseline");
        DedupStore::new()
    } else {
        DedupStore::load(transport.as_ref(), &canonical_host).await
    };
    tracing::info!(baseline = store.baseline_len(), "dedup store ready");

    if let Some(p) = &cfg.profile {
        profile::ensure_profile(transport.as_ref(), p).await;
    }

    let dry_run = cfg.effective_dry_run();
    if dry_run {
        tracing::info!("dry run: nothing will be sent");
    }

    let geocoder = Arc::new(PageGeocoder::new(fetcher.clone(), &canonical_base, &fetch_base));
    let pipeline = Arc::new(Pipeline::new(
        Arc::new(store),
        MessageBuilder::new(geocoder, &canonical_base),
        Publisher::new(transport, dry_run),
    )
    .with_cancel(cancel.clone()));

    let feed = WikiFeedProvider::new(
        fetcher.clone(),
        &canonical_base,
        &fetch_base,
        cfg.languages.clone(),
    );
    let snapshot = SnapshotProvider::new(
        fetcher,
        &cfg.hitchmap_url,
        &cfg.snapshot_dir,
        cfg.snapshot_window_days.max(1) as u64,
    );
    let sources = vec![
        ScheduledSource::new(Arc::new(feed), cfg.feed_interval()),
        ScheduledSource::new(Arc::new(snapshot), cfg.snapshot_interval()),
    ];
    let daemon = Daemon::new(pipeline, sources, cancel);

    let stats = if cli.force_post {
        Some(daemon.run_forced().await)
    } else if cli.once {
        Some(daemon.run_once().await)
    } else {
        daemon.run().await;
        None
    };

    nostr.disconnect().await;
    Ok(stats)
}
