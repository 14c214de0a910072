// src/metrics.rs
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder. With an address, `/metrics` is served
/// there; without one the counters stay no-ops.
pub fn install(addr: Option<SocketAddr>) -> anyhow::Result<()> {
    let Some(addr) = addr else {
        tracing::debug!("metrics exporter disabled");
        return Ok(());
    };

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("prometheus exporter: {e}"))?;

    crate::ingest::ensure_metrics_described();
    tracing::info!(%addr, "metrics exporter listening");
    Ok(())
}
