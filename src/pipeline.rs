// src/pipeline.rs
//! Incremental fetch: paginate the search source for one topic, skip what was already
//! delivered, ask the relevance oracle about the rest and record every accepted paper in the
//! ledger before handing it back.
//!
//! Filters run in this order for each result:
//! 1. boundary: ordinal inside the ledger's `[oldest, latest]` window → skip (cheap, no lookup)
//! 2. ledger membership → skip
//! 3. relevance oracle → skip on reject
//!
//! The pipeline never fails. Upstream trouble ends the run early and the partial list is
//! returned; accepted papers are never rolled back.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, error, info, warn};

use crate::config::topic::{Topic, DEFAULT_QUOTA};
use crate::ledger::{parse_ordinal, DedupLedger};
use crate::relevance::RelevanceOracle;
use crate::source::{CandidateItem, RawResult, SearchBackend, SearchSource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// Results requested per page.
    pub page_size: usize,
    /// Upper bound on pages pulled per run.
    pub max_batches: usize,
    /// Failed page pulls tolerated per run; the last one ends the run.
    pub fetch_attempts: u32,
    /// Pause before retrying a failed pull.
    pub retry_delay: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            page_size: 20,
            max_batches: 3,
            fetch_attempts: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    QuotaReached,
    SourceExhausted,
    BatchLimit,
    /// Too many failed pulls.
    RetriesExhausted,
    /// The source returned an error that retrying cannot fix.
    SourceFailed,
    /// The ledger could not be written; nothing more is accepted this run.
    LedgerFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    /// Accepted papers in upstream order.
    pub items: Vec<CandidateItem>,
    pub pages: usize,
    pub failed_pulls: u32,
    pub stop: StopReason,
}

pub struct FetchPipeline {
    ledger: Arc<DedupLedger>,
    oracle: Arc<RelevanceOracle>,
    backend: Arc<dyn SearchBackend>,
    settings: FetchSettings,
}

enum Pull {
    Page(Vec<RawResult>),
    GiveUp(StopReason),
}

impl FetchPipeline {
    pub fn new(
        ledger: Arc<DedupLedger>,
        oracle: Arc<RelevanceOracle>,
        backend: Arc<dyn SearchBackend>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            ledger,
            oracle,
            backend,
            settings,
        }
    }

    pub fn ledger(&self) -> &Arc<DedupLedger> {
        &self.ledger
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Fetch up to `topic.quota` new relevant papers.
    pub async fn fetch(&self, topic: &Topic) -> FetchReport {
        let quota = if topic.quota == 0 {
            DEFAULT_QUOTA
        } else {
            topic.quota
        };
        let boundary = self.ledger.boundary(&topic.name);
        let mut source = self.backend.open(&topic.search_query);

        info!(
            target: "fetch",
            topic = %topic.name,
            query = %topic.search_query,
            quota,
            latest = boundary.latest,
            oldest = boundary.oldest,
            "fetch started"
        );

        let mut items: Vec<CandidateItem> = Vec::new();
        let mut pages = 0usize;
        let mut failed_pulls = 0u32;
        let mut stop = StopReason::BatchLimit;

        'batches: for batch in 0..self.settings.max_batches.max(1) {
            if items.len() >= quota {
                stop = StopReason::QuotaReached;
                break;
            }

            let page = match self.pull(source.as_mut(), &topic.name, batch, &mut failed_pulls).await {
                Pull::Page(p) => p,
                Pull::GiveUp(reason) => {
                    stop = reason;
                    break;
                }
            };
            if page.is_empty() {
                debug!(target: "fetch", topic = %topic.name, batch, "source exhausted");
                stop = StopReason::SourceExhausted;
                break;
            }
            pages += 1;
            counter!("fetch_pages_total").increment(1);

            let mut relevant = 0usize;
            for raw in page {
                if items.len() >= quota {
                    break;
                }
                let item = CandidateItem::from(raw);

                if let Ok(ord) = parse_ordinal(&item.id) {
                    if boundary.covers(ord) {
                        counter!("fetch_skipped_boundary_total").increment(1);
                        continue;
                    }
                }
                if self.ledger.contains(&topic.name, &item.id) {
                    counter!("fetch_skipped_seen_total").increment(1);
                    continue;
                }
                if !self
                    .oracle
                    .is_relevant(&item.title, &item.abstract_text, topic)
                    .await
                {
                    continue;
                }

                match self.ledger.insert(&topic.name, &item.id) {
                    Ok(_) => {
                        counter!("fetch_accepted_total").increment(1);
                        relevant += 1;
                        items.push(item);
                    }
                    Err(e) => {
                        error!(target: "fetch", topic = %topic.name, id = %item.id, error = %e, "ledger write failed, stopping");
                        stop = StopReason::LedgerFailed;
                        break 'batches;
                    }
                }
            }
            debug!(target: "fetch", topic = %topic.name, batch, relevant, "batch done");

            if items.len() >= quota {
                stop = StopReason::QuotaReached;
                break;
            }
        }

        info!(
            target: "fetch",
            topic = %topic.name,
            accepted = items.len(),
            pages,
            failed_pulls,
            stop = ?stop,
            "fetch finished"
        );
        FetchReport {
            items,
            pages,
            failed_pulls,
            stop,
        }
    }

    /// Pull one page, retrying transient failures on the same cursor.
    async fn pull(
        &self,
        source: &mut dyn SearchSource,
        topic: &str,
        batch: usize,
        failed_pulls: &mut u32,
    ) -> Pull {
        loop {
            match source.next_page(self.settings.page_size).await {
                Ok(page) => return Pull::Page(page),
                Err(e) => {
                    *failed_pulls += 1;
                    counter!("fetch_failed_pulls_total").increment(1);

                    if !e.is_transient() {
                        warn!(target: "fetch", topic, batch, source = source.name(), error = %e, "source failed, keeping partial result");
                        return Pull::GiveUp(StopReason::SourceFailed);
                    }
                    if *failed_pulls >= self.settings.fetch_attempts {
                        warn!(
                            target: "fetch",
                            topic,
                            batch,
                            attempts = *failed_pulls,
                            error = %e,
                            "giving up after repeated failures, keeping partial result"
                        );
                        return Pull::GiveUp(StopReason::RetriesExhausted);
                    }
                    warn!(
                        target: "fetch",
                        topic,
                        batch,
                        attempt = *failed_pulls,
                        retry_in = ?self.settings.retry_delay,
                        error = %e,
                        "page pull failed, retrying"
                    );
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
            }
        }
    }
}
