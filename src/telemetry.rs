//! Logging and metrics setup for the binary.

use std::net::SocketAddr;

use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_METRICS_ADDR: &str = "METRICS_ADDR";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

const DEFAULT_FILTER: &str =
    "arxiv_digest=info,agent=info,fetch=info,ledger=info,relevance=info,digest=info,notify=info,scheduler=info,warn";

/// Compact logs by default, JSON lines with `LOG_FORMAT=json`. `RUST_LOG` overrides the
/// default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

/// Register help text for every series the crate emits, on the current recorder.
pub fn describe_metrics() {
    // source::arxiv
    describe_histogram!("arxiv_request_ms", "arXiv query API latency in milliseconds.");
    // pipeline
    describe_counter!("fetch_pages_total", "Non-empty result pages pulled from the source.");
    describe_counter!(
        "fetch_failed_pulls_total",
        "Page pulls that failed (transient or not)."
    );
    describe_counter!("fetch_accepted_total", "Papers accepted and recorded in the ledger.");
    describe_counter!(
        "fetch_skipped_boundary_total",
        "Results skipped because they fall inside the known ordinal window."
    );
    describe_counter!(
        "fetch_skipped_seen_total",
        "Results skipped because the ledger already holds them."
    );
    // relevance
    describe_counter!(
        "relevance_keyword_hits_total",
        "Papers accepted by keyword match without a model call."
    );
    describe_counter!("relevance_llm_calls_total", "Relevance questions sent to the model.");
    describe_counter!(
        "relevance_llm_errors_total",
        "Relevance model calls that failed (treated as reject)."
    );
    // notify
    describe_counter!("notify_failures_total", "Failed webhook deliveries, by channel.");
    // scheduler
    describe_counter!("digest_runs_total", "Scheduled or startup digest runs.");
    describe_gauge!("digest_last_run_ts", "Unix time of the latest digest run start.");
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Call once per process.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_metrics();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }

    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding metrics listener on {addr}"))?;
        info!(%addr, "metrics endpoint listening");
        axum::serve(listener, self.router())
            .await
            .context("metrics server")
    }
}
