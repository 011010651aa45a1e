//! Prometheus metrics for certalert
//!
//! Provides observability into per-log ingestion progress, skipped and
//! missed iterations, and the match-event channel.

use lazy_static::lazy_static;
use prometheus::{
    HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use tracing::warn;

const LOG_LABELS: &[&str] = &["log_operator", "log_description"];

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Certificates scanned per log
    pub static ref LOG_CERTS_INGESTED: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "certalert_log_certs_ingested_total",
            "The number of certs observed per log"
        ),
        LOG_LABELS
    ).expect("metric cannot be created");

    /// SAN DNS names scanned per log
    pub static ref LOG_DNS_NAMES_INGESTED: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "certalert_log_dns_names_ingested_total",
            "The number of dns names observed per log"
        ),
        LOG_LABELS
    ).expect("metric cannot be created");

    /// Last observed tree size per log
    pub static ref LOG_TREE_SIZE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("certalert_log_tree_size", "The tree size of the log"),
        LOG_LABELS
    ).expect("metric cannot be created");

    /// get-entries batches requested per log
    pub static ref LOG_ENTRY_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "certalert_log_entry_request",
            "The number of entry batches requested per log"
        ),
        LOG_LABELS
    ).expect("metric cannot be created");

    /// Wall time of one log update
    pub static ref LOG_INGEST_DURATION: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "certalert_log_ingest_duration_seconds",
            "The time it took to update a specific log"
        )
        .buckets(vec![
            1.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 90.0, 120.0, 240.0, 300.0
        ]),
        LOG_LABELS
    ).expect("metric cannot be created");

    /// Ticks skipped because the previous update still held the log's lock
    pub static ref LOG_ITERATIONS_MISSED: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "certalert_log_iterations_missed_count",
            "The amount of missed iterations"
        ),
        LOG_LABELS
    ).expect("metric cannot be created");

    /// Updates skipped because the gap exceeded the handleable limit
    pub static ref LOG_ITERATIONS_SKIPPED: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "certalert_log_iterations_skipped_count",
            "The amount of skipped iterations"
        ),
        LOG_LABELS
    ).expect("metric cannot be created");

    /// Ingestion loop ticks
    pub static ref ITERATION_COUNT: IntCounter = IntCounter::new(
        "certalert_iteration_count",
        "The amount of iterations"
    ).expect("metric cannot be created");

    /// Current depth of the match-event channel
    pub static ref MATCH_EVENTS_BUFFERED: IntGauge = IntGauge::new(
        "certalert_instruction_channel_buffered_items",
        "The amount of match events currently waiting to be dispatched"
    ).expect("metric cannot be created");
}

/// Register all metrics with the global registry
pub fn init_metrics() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(LOG_CERTS_INGESTED.clone()))?;
    REGISTRY.register(Box::new(LOG_DNS_NAMES_INGESTED.clone()))?;
    REGISTRY.register(Box::new(LOG_TREE_SIZE.clone()))?;
    REGISTRY.register(Box::new(LOG_ENTRY_REQUESTS.clone()))?;
    REGISTRY.register(Box::new(LOG_INGEST_DURATION.clone()))?;
    REGISTRY.register(Box::new(LOG_ITERATIONS_MISSED.clone()))?;
    REGISTRY.register(Box::new(LOG_ITERATIONS_SKIPPED.clone()))?;
    REGISTRY.register(Box::new(ITERATION_COUNT.clone()))?;
    REGISTRY.register(Box::new(MATCH_EVENTS_BUFFERED.clone()))?;

    Ok(())
}

/// Export metrics in Prometheus text format
pub fn export_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_default()
}

/// Serve the registry at {addr}/metrics until the shutdown flag flips.
pub async fn serve_metrics(
    addr: &str,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<()> {
    use axum::routing::get;
    use axum::Router;

    let app = Router::new().route("/metrics", get(|| async { export_metrics() }));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics endpoint listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        // May already be registered by another test; both outcomes are fine
        let _ = init_metrics();
    }

    #[test]
    fn test_log_counter_increments() {
        LOG_CERTS_INGESTED
            .with_label_values(&["Test Operator", "test log"])
            .inc();
        let value = LOG_CERTS_INGESTED
            .with_label_values(&["Test Operator", "test log"])
            .get();
        assert!(value > 0);
    }

    #[test]
    fn test_export_metrics_contains_registered_metric() {
        let _ = init_metrics();
        ITERATION_COUNT.inc();
        let output = export_metrics();
        assert!(output.contains("certalert_iteration_count"));
    }
}
