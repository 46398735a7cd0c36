// src/config/mod.rs
//! Configuration: `config/config.toml` (or `$CONFIG_PATH`) plus secrets from the environment.
//!
//! Everything is validated once at load into immutable structs; any problem is a single
//! [`ConfigError`] and aborts startup.

pub mod ai;
pub mod topic;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::pipeline::FetchSettings;
use crate::relevance::VerdictPolicy;
use crate::scheduler::Schedule;

pub use ai::AiConfig;
pub use topic::Topic;

pub const ENV_CONFIG_PATH: &str = "CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
const WEBHOOK_ENV_PREFIX: &str = "WEBHOOK_URL_";

/// `schedule_time = "09:00"` or `schedule_time = ["09:00", "18:30"]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

fn default_page_size() -> usize {
    20
}
fn default_max_batches() -> usize {
    3
}
fn default_fetch_attempts() -> u32 {
    3
}
fn default_retry_delay_secs() -> u64 {
    5
}
fn default_poll_interval_secs() -> u64 {
    60
}
fn default_summary_prompt() -> String {
    "Summarize the core contribution of this paper in one sentence based on its abstract: {abstract}"
        .to_string()
}
fn default_ledger_path() -> PathBuf {
    PathBuf::from("paper_history.json")
}

#[derive(Debug, Clone, Deserialize)]
struct RawGeneral {
    schedule_time: OneOrMany,
    /// Page size of each search request.
    #[serde(default = "default_page_size")]
    max_search_results: usize,
    #[serde(default = "default_max_batches")]
    max_batches: usize,
    #[serde(default = "default_fetch_attempts")]
    fetch_attempts: u32,
    #[serde(default = "default_retry_delay_secs")]
    retry_delay_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    poll_interval_secs: u64,
    #[serde(default = "default_summary_prompt")]
    summary_prompt: String,
    #[serde(default)]
    relevance_policy: VerdictPolicy,
    #[serde(default = "default_ledger_path")]
    ledger_path: PathBuf,
    #[serde(default)]
    arxiv: ArxivConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    general: RawGeneral,
    #[serde(default)]
    llm: AiConfig,
    #[serde(default)]
    topics: Vec<topic::RawTopic>,
}

fn default_arxiv_endpoint() -> String {
    "http://export.arxiv.org/api/query".to_string()
}
fn default_request_interval_ms() -> u64 {
    3_000
}
fn default_arxiv_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArxivConfig {
    #[serde(default = "default_arxiv_endpoint")]
    pub endpoint: String,
    /// Minimum spacing between two API requests.
    #[serde(default = "default_request_interval_ms")]
    pub request_interval_ms: u64,
    #[serde(default = "default_arxiv_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            endpoint: default_arxiv_endpoint(),
            request_interval_ms: default_request_interval_ms(),
            timeout_secs: default_arxiv_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneralConfig {
    pub schedule: Schedule,
    pub fetch: FetchSettings,
    pub poll_interval: Duration,
    pub summary_prompt: String,
    pub relevance_policy: VerdictPolicy,
    pub ledger_path: PathBuf,
    pub arxiv: ArxivConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub llm: AiConfig,
    pub topics: Vec<Topic>,
    pub webhook_urls: Vec<String>,
}

impl AppConfig {
    /// Path from `$CONFIG_PATH`, falling back to `config/config.toml`.
    pub fn default_path() -> PathBuf {
        std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load the file at `path` and read secrets from the process environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, &|key| std::env::var(key).ok())
    }

    /// Parse and validate. `lookup` resolves environment variables.
    pub fn from_toml_str(
        content: &str,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;
        let g = raw.general;

        let schedule = Schedule::parse(&g.schedule_time.into_vec())?;
        if g.max_search_results == 0 {
            return Err(ConfigError::invalid("general.max_search_results", "must be > 0"));
        }
        if g.max_batches == 0 {
            return Err(ConfigError::invalid("general.max_batches", "must be > 0"));
        }
        if g.fetch_attempts == 0 {
            return Err(ConfigError::invalid("general.fetch_attempts", "must be > 0"));
        }

        let mut seen = HashSet::new();
        let mut topics = Vec::with_capacity(raw.topics.len());
        for rt in raw.topics {
            let t = rt.into_topic()?;
            if !seen.insert(t.name.clone()) {
                return Err(ConfigError::invalid(
                    "topics.name",
                    format!("duplicate topic `{}`", t.name),
                ));
            }
            topics.push(t);
        }
        if topics.is_empty() {
            return Err(ConfigError::Missing("topics"));
        }

        let llm = raw.llm.resolve(lookup)?;
        let webhook_urls = webhook_urls_from(lookup);
        if webhook_urls.is_empty() {
            return Err(ConfigError::Missing("WEBHOOK_URL_1"));
        }

        Ok(Self {
            general: GeneralConfig {
                schedule,
                fetch: FetchSettings {
                    page_size: g.max_search_results,
                    max_batches: g.max_batches,
                    fetch_attempts: g.fetch_attempts,
                    retry_delay: Duration::from_secs(g.retry_delay_secs),
                },
                poll_interval: Duration::from_secs(g.poll_interval_secs.max(1)),
                summary_prompt: g.summary_prompt,
                relevance_policy: g.relevance_policy,
                ledger_path: g.ledger_path,
                arxiv: g.arxiv,
            },
            llm,
            topics,
            webhook_urls,
        })
    }

    pub fn enabled_topics(&self) -> impl Iterator<Item = &Topic> {
        self.topics.iter().filter(|t| t.enabled)
    }
}

/// `WEBHOOK_URL_1`, `WEBHOOK_URL_2`, ... until the first missing or blank one.
fn webhook_urls_from(lookup: &dyn Fn(&str) -> Option<String>) -> Vec<String> {
    (1..)
        .map(|i| lookup(&format!("{WEBHOOK_ENV_PREFIX}{i}")))
        .take_while(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
        .flatten()
        .map(|s| s.trim().to_string())
        .collect()
}
