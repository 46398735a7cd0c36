// src/source/mod.rs
pub mod arxiv;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::SourceError;

/// One result as delivered by a search source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResult {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub url: Option<String>,
    pub published_at: u64, // unix seconds, 0 if unknown
}

/// A search result after normalization, ready for the relevance decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    pub id: String,
    pub title: String,
    pub abstract_text: String,
    pub url: String,
    pub published_at: u64,
}

impl From<RawResult> for CandidateItem {
    fn from(raw: RawResult) -> Self {
        let url = raw
            .url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| raw.id.clone());
        Self {
            id: raw.id,
            title: normalize_text(&raw.title),
            abstract_text: normalize_text(&raw.summary),
            url,
            published_at: raw.published_at,
        }
    }
}

/// Lazy, finite, non-restartable stream of results for one query.
///
/// A failed `next_page` must leave the cursor where it was, so the caller can retry the
/// same pull.
#[async_trait]
pub trait SearchSource: Send {
    async fn next_page(&mut self, page_size: usize) -> Result<Vec<RawResult>, SourceError>;
    fn name(&self) -> &'static str;
}

/// Opens a fresh cursor per query.
pub trait SearchBackend: Send + Sync {
    fn open(&self, query: &str) -> Box<dyn SearchSource>;
}

/// Decode leftover entities and collapse whitespace. Titles and abstracts from arXiv are
/// hard-wrapped plain text; a bare `<` or `>` is math, not markup, so nothing is stripped.
pub fn normalize_text(s: &str) -> String {
    static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

    let decoded = html_escape::decode_html_entities(s);
    RE_WS.replace_all(&decoded, " ").trim().to_string()
}
