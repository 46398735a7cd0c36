// src/agent.rs
//! One digest run: fetch → summarize → deliver, topic by topic.

use std::sync::Arc;

use anyhow::Context;
use chrono::Local;
use tracing::{info, warn};

use crate::config::{AppConfig, Topic};
use crate::digest::{Digest, Summarizer};
use crate::ledger::DedupLedger;
use crate::llm::build_llm_client;
use crate::notify::NotifierMux;
use crate::pipeline::FetchPipeline;
use crate::relevance::RelevanceOracle;
use crate::scheduler::ScheduledJob;
use crate::source::arxiv::ArxivSearch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicOutcome {
    pub topic: String,
    pub fetched: usize,
    /// `None` when nothing was fetched and no delivery was attempted.
    pub delivered: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub topics: Vec<TopicOutcome>,
}

pub struct DigestAgent {
    topics: Vec<Topic>,
    pipeline: FetchPipeline,
    summarizer: Summarizer,
    notifier: NotifierMux,
}

impl DigestAgent {
    pub fn new(
        topics: Vec<Topic>,
        pipeline: FetchPipeline,
        summarizer: Summarizer,
        notifier: NotifierMux,
    ) -> Self {
        Self {
            topics,
            pipeline,
            summarizer,
            notifier,
        }
    }

    /// Wire the real arXiv, model and webhook clients. Fails if the ledger is corrupt.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let ledger = DedupLedger::load(&cfg.general.ledger_path).context("loading dedup ledger")?;
        let llm = build_llm_client(&cfg.llm).context("building llm client")?;
        let oracle = RelevanceOracle::new(llm.clone(), cfg.general.relevance_policy);

        let fetch = cfg.general.fetch.clone();
        let backend = ArxivSearch::new(&cfg.general.arxiv, fetch.page_size * fetch.max_batches)
            .context("building arxiv client")?;
        let pipeline = FetchPipeline::new(Arc::new(ledger), Arc::new(oracle), Arc::new(backend), fetch);

        info!(
            topics = cfg.topics.len(),
            enabled = cfg.enabled_topics().count(),
            webhooks = cfg.webhook_urls.len(),
            provider = llm.provider_name(),
            "agent ready"
        );

        Ok(Self::new(
            cfg.topics.clone(),
            pipeline,
            Summarizer::new(llm, cfg.general.summary_prompt.clone()),
            NotifierMux::from_urls(&cfg.webhook_urls),
        ))
    }

    /// Process every enabled topic in configuration order. Never fails; problems are logged.
    pub async fn run(&self) -> RunReport {
        let mut report = RunReport::default();
        for topic in self.topics.iter().filter(|t| t.enabled) {
            let fetched = self.pipeline.fetch(topic).await;
            if fetched.items.is_empty() {
                info!(target: "agent", topic = %topic.name, stop = ?fetched.stop, "nothing new");
                report.topics.push(TopicOutcome {
                    topic: topic.name.clone(),
                    fetched: 0,
                    delivered: None,
                });
                continue;
            }

            let entries = self.summarizer.summarize_all(&fetched.items).await;
            let digest = Digest {
                topic: topic.name.clone(),
                title: topic.title.clone(),
                date: Local::now().date_naive(),
                entries,
            };
            let delivered = self.notifier.deliver(&digest).await;
            if !delivered {
                warn!(target: "agent", topic = %topic.name, papers = digest.entries.len(), "no endpoint accepted the digest");
            }
            report.topics.push(TopicOutcome {
                topic: topic.name.clone(),
                fetched: digest.entries.len(),
                delivered: Some(delivered),
            });
        }
        report
    }
}

#[async_trait::async_trait]
impl ScheduledJob for DigestAgent {
    fn name(&self) -> &str {
        "arxiv-digest"
    }

    async fn run(&self) -> anyhow::Result<()> {
        let report = DigestAgent::run(self).await;
        let delivered = report
            .topics
            .iter()
            .filter(|t| t.delivered == Some(true))
            .count();
        info!(target: "agent", topics = report.topics.len(), delivered, "digest run complete");
        Ok(())
    }
}
