// src/source/arxiv.rs
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::ArxivConfig;
use crate::error::SourceError;
use crate::source::{RawResult, SearchBackend, SearchSource};

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    published: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@rel", default)]
    rel: Option<String>,
}

fn parse_rfc3339_to_unix(ts: &str) -> u64 {
    OffsetDateTime::parse(ts.trim(), &Rfc3339)
        .ok()
        .map(|dt| dt.unix_timestamp())
        .and_then(|x| u64::try_from(x).ok())
        .unwrap_or(0)
}

/// Parse an arXiv Atom response. The API reports query errors as a single entry whose id
/// points at `/api/errors`.
pub fn parse_feed(xml: &str) -> Result<Vec<RawResult>, SourceError> {
    let feed: Feed = from_str(xml).map_err(|e| SourceError::Parse(e.to_string()))?;

    let mut out = Vec::with_capacity(feed.entries.len());
    for e in feed.entries {
        if e.id.contains("/api/errors") {
            return Err(SourceError::Api(e.summary.trim().to_string()));
        }
        let url = e
            .links
            .iter()
            .find(|l| l.rel.as_deref() == Some("alternate"))
            .map(|l| l.href.clone());
        out.push(RawResult {
            id: e.id.trim().to_string(),
            title: e.title,
            summary: e.summary,
            url,
            published_at: e.published.as_deref().map_or(0, parse_rfc3339_to_unix),
        });
    }
    Ok(out)
}

/// Enforces a minimum gap between requests across every open cursor.
#[derive(Debug)]
struct Pacer {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Pacer {
    async fn wait_turn(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// arXiv query API backend. Results are sorted by submission date, newest first.
pub struct ArxivSearch {
    client: reqwest::Client,
    endpoint: String,
    max_results: usize,
    pacer: Arc<Pacer>,
}

impl ArxivSearch {
    /// `max_results` caps how far a single cursor may page.
    pub fn new(cfg: &ArxivConfig, max_results: usize) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("arxiv-digest/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            client,
            endpoint: cfg.endpoint.clone(),
            max_results,
            pacer: Arc::new(Pacer {
                min_interval: Duration::from_millis(cfg.request_interval_ms),
                last: Mutex::new(None),
            }),
        })
    }
}

impl SearchBackend for ArxivSearch {
    fn open(&self, query: &str) -> Box<dyn SearchSource> {
        Box::new(ArxivCursor {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            query: query.to_string(),
            start: 0,
            max_results: self.max_results,
            pacer: self.pacer.clone(),
        })
    }
}

pub struct ArxivCursor {
    client: reqwest::Client,
    endpoint: String,
    query: String,
    start: usize,
    max_results: usize,
    pacer: Arc<Pacer>,
}

#[async_trait]
impl SearchSource for ArxivCursor {
    async fn next_page(&mut self, page_size: usize) -> Result<Vec<RawResult>, SourceError> {
        if self.start >= self.max_results || page_size == 0 {
            return Ok(Vec::new());
        }
        let count = page_size.min(self.max_results - self.start);

        let start = self.start.to_string();
        let count = count.to_string();

        self.pacer.wait_turn().await;
        let t0 = Instant::now();
        let body = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("search_query", self.query.as_str()),
                ("start", start.as_str()),
                ("max_results", count.as_str()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        histogram!("arxiv_request_ms").record(t0.elapsed().as_secs_f64() * 1000.0);

        let results = parse_feed(&body)?;
        debug!(
            target: "fetch",
            query = %self.query,
            start = self.start,
            got = results.len(),
            "arxiv page"
        );
        // Only a successful pull moves the cursor.
        self.start += results.len();
        Ok(results)
    }

    fn name(&self) -> &'static str {
        "arxiv"
    }
}
