// src/digest.rs
use chrono::NaiveDate;
use tracing::warn;

use crate::config::topic::fill_template;
use crate::llm::DynLlmClient;
use crate::source::CandidateItem;

pub const SUMMARY_PLACEHOLDER: &str = "Sorry, the summary could not be generated.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestEntry {
    pub title: String,
    pub summary: String,
    pub url: String,
}

/// A dated list of summarized papers for one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub topic: String,
    pub title: String,
    pub date: NaiveDate,
    pub entries: Vec<DigestEntry>,
}

impl Digest {
    /// `"<title> - YYYY-MM-DD"`
    pub fn heading(&self) -> String {
        format!("{} - {}", self.title, self.date.format("%Y-%m-%d"))
    }

    /// Plain-text block for one paper.
    pub fn render_entry(entry: &DigestEntry) -> String {
        format!(
            "📑 {}\n💡 Summary: {}\n🔗 Link: {}\n\n",
            entry.title, entry.summary, entry.url
        )
    }

    /// All entries as one plain-text body (no heading).
    pub fn render_text(&self) -> String {
        self.entries.iter().map(Self::render_entry).collect()
    }
}

pub struct Summarizer {
    llm: DynLlmClient,
    /// Template with an `{abstract}` placeholder.
    prompt: String,
}

impl Summarizer {
    pub fn new(llm: DynLlmClient, prompt: impl Into<String>) -> Self {
        Self {
            llm,
            prompt: prompt.into(),
        }
    }

    /// One-line summary, or [`SUMMARY_PLACEHOLDER`] if the model call fails.
    pub async fn summarize(&self, abstract_text: &str) -> String {
        let prompt = fill_template(&self.prompt, &[("abstract", abstract_text)]);
        match self.llm.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(target: "digest", error = %e, "summary failed, using placeholder");
                SUMMARY_PLACEHOLDER.to_string()
            }
        }
    }

    /// Summarize papers one after another, preserving order.
    pub async fn summarize_all(&self, items: &[CandidateItem]) -> Vec<DigestEntry> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(DigestEntry {
                title: item.title.clone(),
                summary: self.summarize(&item.abstract_text).await,
                url: item.url.clone(),
            });
        }
        out
    }
}
