// src/config/topic.rs
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;
use tracing::warn;

use crate::error::ConfigError;

pub const DEFAULT_QUOTA: usize = 5;

/// One independently fetched and delivered subject, e.g. "llm" or "robotics".
#[derive(Debug, Clone, PartialEq)]
pub struct Topic {
    pub name: String,
    pub keywords: Vec<String>,
    /// Template with `{title}` and `{abstract}` placeholders.
    pub relevance_prompt: String,
    pub search_query: String,
    /// Max accepted papers per run. Always positive.
    pub quota: usize,
    pub enabled: bool,
    /// Digest heading.
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawTopic {
    name: String,
    #[serde(default)]
    keywords: Vec<String>,
    search_query: String,
    #[serde(default)]
    max_papers: Option<usize>,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl RawTopic {
    pub(crate) fn into_topic(self) -> Result<Topic, ConfigError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::invalid("topics.name", "must not be empty"));
        }
        let search_query = self.search_query.trim().to_string();
        if search_query.is_empty() {
            return Err(ConfigError::invalid(
                format!("topics.{name}.search_query"),
                "must not be empty",
            ));
        }

        let keywords: Vec<String> = self
            .keywords
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        let quota = match self.max_papers {
            None => DEFAULT_QUOTA,
            Some(0) => {
                warn!(topic = %name, fallback = DEFAULT_QUOTA, "max_papers = 0 is not usable, using default");
                DEFAULT_QUOTA
            }
            Some(n) => n,
        };

        let relevance_prompt = self
            .prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| default_relevance_prompt(&keywords, &search_query));
        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("Today's {name} paper updates").to_uppercase());

        Ok(Topic {
            name,
            keywords,
            relevance_prompt,
            search_query,
            quota,
            enabled: self.enabled,
            title,
        })
    }
}

/// Yes/no classification prompt built from the topic's keywords and query.
pub fn default_relevance_prompt(keywords: &[String], search_query: &str) -> String {
    let keywords = keywords.join(", ");
    format!(
        "Critically judge whether this paper is related to the following topics: {keywords}.\n\n\
         Title: {{title}}\n\
         Abstract: {{abstract}}\n\n\
         Answer only \"yes\" or \"no\". If the paper mainly studies topics related to the keywords \
         {keywords}, or matches the search condition {search_query}, answer \"yes\"; \
         otherwise answer \"no\"."
    )
}

/// Fill `{title}` and `{abstract}`. Other braces are left alone.
pub fn render_relevance_prompt(template: &str, title: &str, abstract_text: &str) -> String {
    fill_template(template, &[("title", title), ("abstract", abstract_text)])
}

/// Replace `{name}` placeholders from `vars` in a single pass over `template`, so braces inside
/// substituted values are never expanded. Unknown names stay as written.
pub(crate) fn fill_template(template: &str, vars: &[(&str, &str)]) -> String {
    static RE_PLACEHOLDER: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder regex"));

    RE_PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            vars.iter()
                .find(|(name, _)| *name == &caps[1])
                .map_or_else(|| caps[0].to_string(), |(_, value)| value.to_string())
        })
        .into_owned()
}
