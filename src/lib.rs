// src/lib.rs
//! arXiv paper digest: incremental fetch, relevance filtering, dedup ledger and webhook
//! delivery on a daily schedule.

pub mod agent;
pub mod config;
pub mod digest;
pub mod error;
pub mod ledger;
pub mod llm;
pub mod notify;
pub mod pipeline;
pub mod relevance;
pub mod scheduler;
pub mod source;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::agent::{DigestAgent, RunReport};
pub use crate::config::{AppConfig, Topic};
pub use crate::ledger::{parse_ordinal, Boundary, DedupLedger};
pub use crate::pipeline::{FetchPipeline, FetchReport, FetchSettings, StopReason};
pub use crate::relevance::{RelevanceOracle, VerdictPolicy};
pub use crate::source::{CandidateItem, RawResult, SearchBackend, SearchSource};
