//! arxiv-digest binary.
//!
//! Loads `.env` and the TOML config, then posts digests at the configured times of day.
//! Configuration problems and a corrupt ledger abort startup; anything that goes wrong during
//! a run is logged and the schedule continues.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use arxiv_digest::config::AppConfig;
use arxiv_digest::scheduler::{run_guarded, ScheduledJob, Scheduler};
use arxiv_digest::telemetry::{self, Metrics, ENV_METRICS_ADDR};
use arxiv_digest::DigestAgent;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let path = AppConfig::default_path();
    let cfg = AppConfig::load(&path).with_context(|| format!("loading {}", path.display()))?;
    info!(config = %path.display(), topics = cfg.topics.len(), "configuration loaded");

    if let Ok(raw) = std::env::var(ENV_METRICS_ADDR) {
        let addr: SocketAddr = raw
            .parse()
            .with_context(|| format!("invalid {ENV_METRICS_ADDR}: {raw}"))?;
        let metrics = Metrics::init()?;
        tokio::spawn(async move {
            if let Err(e) = metrics.serve(addr).await {
                error!(error = ?e, "metrics endpoint stopped");
            }
        });
    }

    let agent: Arc<dyn ScheduledJob> = Arc::new(DigestAgent::from_config(&cfg)?);

    if std::env::var("RUN_ON_START").is_ok_and(|v| v == "1") {
        run_guarded(agent.clone()).await;
    }

    Scheduler::new(cfg.general.schedule.clone(), cfg.general.poll_interval)
        .run_forever(agent)
        .await;
    Ok(())
}
