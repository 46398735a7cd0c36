// tests/common/mod.rs
// Shared stubs for integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arxiv_digest::config::topic::default_relevance_prompt;
use arxiv_digest::digest::Digest;
use arxiv_digest::error::{LlmError, SourceError};
use arxiv_digest::llm::{LlmClient, LlmFuture};
use arxiv_digest::notify::Notifier;
use arxiv_digest::{
    DedupLedger, FetchPipeline, FetchSettings, RawResult, RelevanceOracle, SearchBackend,
    SearchSource, Topic, VerdictPolicy,
};
use parking_lot::Mutex;

pub fn topic(name: &str, keywords: &[&str], quota: usize) -> Topic {
    let keywords: Vec<String> = keywords.iter().map(|k| k.to_string()).collect();
    Topic {
        name: name.to_string(),
        relevance_prompt: default_relevance_prompt(&keywords, "cat:cs.CL"),
        keywords,
        search_query: "cat:cs.CL".to_string(),
        quota,
        enabled: true,
        title: name.to_uppercase(),
    }
}

/// arXiv-shaped result whose ordinal grows with `n` (`n = 3` is `2403.10003`).
pub fn raw(n: u32, title: &str) -> RawResult {
    RawResult {
        id: format!("http://arxiv.org/abs/2403.{:05}v1", 10000 + n),
        title: title.to_string(),
        summary: format!("Abstract of {title}."),
        url: None,
        published_at: 0,
    }
}

pub fn settings(fetch_attempts: u32) -> FetchSettings {
    FetchSettings {
        page_size: 5,
        max_batches: 10,
        fetch_attempts,
        retry_delay: Duration::ZERO,
    }
}

// ---------------------------------------------------------------------
// Search source
// ---------------------------------------------------------------------

/// Replays scripted pulls in order; once the script runs out every pull is an empty page.
pub struct ScriptedSource {
    script: Arc<Mutex<VecDeque<Result<Vec<RawResult>, SourceError>>>>,
    pulls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl SearchSource for ScriptedSource {
    async fn next_page(&mut self, _page_size: usize) -> Result<Vec<RawResult>, SourceError> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<VecDeque<Result<Vec<RawResult>, SourceError>>>>,
    pub pulls: Arc<AtomicUsize>,
    pub opened: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Result<Vec<RawResult>, SourceError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            ..Default::default()
        }
    }

    pub fn pages(pages: Vec<Vec<RawResult>>) -> Self {
        Self::new(pages.into_iter().map(Ok).collect())
    }

    /// Replace the remaining script (e.g. for a second run).
    pub fn reset(&self, script: Vec<Result<Vec<RawResult>, SourceError>>) {
        *self.script.lock() = script.into();
    }

    pub fn pull_count(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }
}

impl SearchBackend for ScriptedBackend {
    fn open(&self, _query: &str) -> Box<dyn SearchSource> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Box::new(ScriptedSource {
            script: self.script.clone(),
            pulls: self.pulls.clone(),
        })
    }
}

// ---------------------------------------------------------------------
// LLM
// ---------------------------------------------------------------------

/// Fixed answer (or failure) with a call counter.
pub struct StubLlm {
    answer: Option<String>,
    calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl StubLlm {
    pub fn answering(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: Some(answer.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            answer: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmClient for StubLlm {
    fn complete<'a>(&'a self, prompt: &'a str) -> LlmFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        let out = match &self.answer {
            Some(a) => Ok(a.clone()),
            None => Err(LlmError::EmptyResponse),
        };
        Box::pin(async move { out })
    }

    fn provider_name(&self) -> &'static str {
        "stub"
    }
}

pub fn oracle(llm: Arc<StubLlm>) -> Arc<RelevanceOracle> {
    Arc::new(RelevanceOracle::new(llm, VerdictPolicy::AcceptUnlessNegative))
}

pub fn ledger_at(dir: &Path) -> Arc<DedupLedger> {
    Arc::new(DedupLedger::load(dir.join("paper_history.json")).unwrap())
}

pub fn pipeline(
    ledger: Arc<DedupLedger>,
    llm: Arc<StubLlm>,
    backend: &ScriptedBackend,
    settings: FetchSettings,
) -> FetchPipeline {
    FetchPipeline::new(ledger, oracle(llm), Arc::new(backend.clone()), settings)
}

// ---------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------

pub struct RecordingNotifier {
    pub ok: bool,
    pub sent: Arc<Mutex<Vec<Digest>>>,
}

impl RecordingNotifier {
    pub fn new(ok: bool) -> (Self, Arc<Mutex<Vec<Digest>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                ok,
                sent: sent.clone(),
            },
            sent,
        )
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, digest: &Digest) -> anyhow::Result<()> {
        self.sent.lock().push(digest.clone());
        if self.ok {
            Ok(())
        } else {
            anyhow::bail!("endpoint down")
        }
    }

    fn name(&self) -> &'static str {
        "recording"
    }

    fn endpoint(&self) -> String {
        "test://recording".to_string()
    }
}
