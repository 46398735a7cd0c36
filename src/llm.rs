//! LLM adapter: chat-completions provider behind a small trait object.
//!
//! Used for two things: yes/no relevance classification and one-line summaries. No retries
//! here; callers decide what a failure means (reject, or a placeholder summary).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::error::LlmError;

pub type LlmFuture<'a> = Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>>;

/// Trait object used by the relevance oracle and the summarizer.
pub trait LlmClient: Send + Sync {
    /// Send `prompt` as the user message and return the generated text.
    fn complete<'a>(&'a self, prompt: &'a str) -> LlmFuture<'a>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynLlmClient = Arc<dyn LlmClient>;

/// Factory: build a client according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns a client that always answers "yes".
/// * Otherwise the OpenAI-compatible chat-completions client.
pub fn build_llm_client(cfg: &AiConfig) -> Result<DynLlmClient, LlmError> {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(MockClient {
            fixed: "yes".to_string(),
        }));
    }
    Ok(Arc::new(ChatCompletionsClient::new(cfg)?))
}

/// OpenAI-compatible `/chat/completions` client (DeepSeek by default).
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    system_prompt: String,
}

impl ChatCompletionsClient {
    pub fn new(cfg: &AiConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("arxiv-digest/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(LlmError::Client)?;
        Ok(Self {
            http,
            endpoint: cfg.endpoint.clone(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            system_prompt: cfg.system_prompt.clone(),
        })
    }

    async fn complete_impl(&self, prompt: &str) -> Result<String, LlmError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            #[serde(default)]
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            #[serde(default)]
            content: Option<String>,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &self.system_prompt,
                },
                Msg {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let body: Resp = resp.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

impl LlmClient for ChatCompletionsClient {
    fn complete<'a>(&'a self, prompt: &'a str) -> LlmFuture<'a> {
        Box::pin(self.complete_impl(prompt))
    }
    fn provider_name(&self) -> &'static str {
        "chat-completions"
    }
}

/// Fixed answer for local runs (`AI_TEST_MODE=mock`).
#[derive(Clone)]
pub struct MockClient {
    pub fixed: String,
}

impl LlmClient for MockClient {
    fn complete<'a>(&'a self, _prompt: &'a str) -> LlmFuture<'a> {
        let out = self.fixed.clone();
        Box::pin(async move { Ok(out) })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
