// src/relevance.rs
//! Relevance gate: keyword fast path, then a yes/no question to the language model.
//!
//! The model path fails closed. Any error from the client rejects the paper, so a broken
//! endpoint cannot flood the digest with unfiltered results.

use metrics::counter;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::topic::{render_relevance_prompt, Topic};
use crate::llm::DynLlmClient;

const NEGATIVE_MARKERS: &[&str] = &["no", "not", "nope", "none", "否", "不相关"];
const POSITIVE_MARKERS: &[&str] = &["yes", "是"];

/// How a free-text model answer maps to accept/reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictPolicy {
    /// Accept unless the answer contains a negative marker.
    #[default]
    AcceptUnlessNegative,
    /// Accept only when the answer contains a positive marker.
    RejectUnlessPositive,
}

impl VerdictPolicy {
    pub fn accepts(self, answer: &str) -> bool {
        match self {
            VerdictPolicy::AcceptUnlessNegative => !contains_marker(answer, NEGATIVE_MARKERS),
            VerdictPolicy::RejectUnlessPositive => contains_marker(answer, POSITIVE_MARKERS),
        }
    }
}

/// ASCII markers must be whole words ("know" is not "no"); others match as substrings.
fn contains_marker(answer: &str, markers: &[&str]) -> bool {
    let lower = answer.to_lowercase();
    markers.iter().any(|m| {
        if m.is_ascii() {
            lower
                .split(|c: char| !c.is_ascii_alphanumeric())
                .any(|word| word == *m)
        } else {
            lower.contains(m)
        }
    })
}

/// Case-insensitive substring match of any keyword against title or abstract.
pub fn keyword_hit<'k>(title: &str, abstract_text: &str, keywords: &'k [String]) -> Option<&'k str> {
    let title = title.to_lowercase();
    let abstract_text = abstract_text.to_lowercase();
    keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .find(|k| {
            let k = k.to_lowercase();
            title.contains(&k) || abstract_text.contains(&k)
        })
}

pub struct RelevanceOracle {
    llm: DynLlmClient,
    policy: VerdictPolicy,
}

impl RelevanceOracle {
    pub fn new(llm: DynLlmClient, policy: VerdictPolicy) -> Self {
        Self { llm, policy }
    }

    pub fn policy(&self) -> VerdictPolicy {
        self.policy
    }

    pub async fn is_relevant(&self, title: &str, abstract_text: &str, topic: &Topic) -> bool {
        if let Some(k) = keyword_hit(title, abstract_text, &topic.keywords) {
            counter!("relevance_keyword_hits_total").increment(1);
            debug!(target: "relevance", topic = %topic.name, keyword = k, "keyword fast path");
            return true;
        }

        let prompt = render_relevance_prompt(&topic.relevance_prompt, title, abstract_text);
        counter!("relevance_llm_calls_total").increment(1);
        match self.llm.complete(&prompt).await {
            Ok(answer) => {
                let accepted = self.policy.accepts(&answer);
                debug!(
                    target: "relevance",
                    topic = %topic.name,
                    provider = self.llm.provider_name(),
                    answer = %answer.chars().take(40).collect::<String>(),
                    accepted,
                    "model verdict"
                );
                accepted
            }
            Err(e) => {
                counter!("relevance_llm_errors_total").increment(1);
                warn!(target: "relevance", topic = %topic.name, error = %e, "relevance check failed, rejecting");
                false
            }
        }
    }
}
