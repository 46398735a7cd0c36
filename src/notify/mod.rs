// src/notify/mod.rs
//! Digest delivery to chat webhooks.
//!
//! Every endpoint is tried independently. A delivery counts as successful when at least one
//! endpoint accepted the message.

pub mod discord;
pub mod feishu;
pub mod slack;

use std::time::Duration;

use anyhow::{anyhow, Result};
use metrics::counter;
use reqwest::{Client, Response};
use serde::Serialize;
use tracing::{info, warn};

use crate::digest::Digest;

pub use discord::DiscordNotifier;
pub use feishu::FeishuNotifier;
pub use slack::SlackNotifier;

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, digest: &Digest) -> Result<()>;
    fn name(&self) -> &'static str;
    /// Endpoint for logs, without path or query (webhook URLs carry tokens).
    fn endpoint(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookKind {
    Feishu,
    Slack,
    Discord,
}

impl WebhookKind {
    /// Guess the chat platform from the webhook URL. Unknown hosts are treated as Feishu.
    pub fn detect(url: &str) -> Self {
        let host = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
            .unwrap_or_default();
        if host == "hooks.slack.com" {
            WebhookKind::Slack
        } else if (host.ends_with("discord.com") || host.ends_with("discordapp.com"))
            && url.contains("/api/webhooks")
        {
            WebhookKind::Discord
        } else {
            WebhookKind::Feishu
        }
    }
}

/// Scheme and host only.
pub fn redact_url(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(u) => format!("{}://{}", u.scheme(), u.host_str().unwrap_or("?")),
        Err(_) => "<invalid url>".to_string(),
    }
}

/// Shared HTTP settings for the webhook notifiers.
#[derive(Clone)]
pub(crate) struct WebhookPost {
    pub(crate) url: String,
    pub(crate) client: Client,
    pub(crate) timeout: Duration,
    pub(crate) max_retries: u8,
}

impl WebhookPost {
    pub(crate) fn new(url: String) -> Self {
        Self {
            url,
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }

    /// POST `payload`, retrying failures with exponential backoff (500ms, 1s, 2s, ...).
    pub(crate) async fn post_json<T: Serialize + Sync>(&self, payload: &T) -> Result<Response> {
        let max = self.max_retries.max(1);
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.url)
                .timeout(self.timeout)
                .json(payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status() {
                    Ok(rsp) => return Ok(rsp),
                    Err(e) => anyhow!("webhook HTTP error: {e}"),
                },
                Err(e) => anyhow!("webhook request failed: {e}"),
            };
            if attempt >= max {
                return Err(err);
            }
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }
}

/// Fan-out over all configured endpoints.
pub struct NotifierMux {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub fn from_urls(urls: &[String]) -> Self {
        let notifiers = urls
            .iter()
            .map(|url| -> Box<dyn Notifier> {
                match WebhookKind::detect(url) {
                    WebhookKind::Slack => Box::new(SlackNotifier::new(url.clone())),
                    WebhookKind::Discord => Box::new(DiscordNotifier::new(url.clone())),
                    WebhookKind::Feishu => Box::new(FeishuNotifier::new(url.clone())),
                }
            })
            .collect();
        Self { notifiers }
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Send to every endpoint; true if at least one accepted the digest.
    pub async fn deliver(&self, digest: &Digest) -> bool {
        let mut any_ok = false;
        for n in &self.notifiers {
            match n.send(digest).await {
                Ok(()) => {
                    info!(target: "notify", channel = n.name(), endpoint = %n.endpoint(), topic = %digest.topic, "digest delivered");
                    any_ok = true;
                }
                Err(e) => {
                    counter!("notify_failures_total", "channel" => n.name()).increment(1);
                    warn!(target: "notify", channel = n.name(), endpoint = %n.endpoint(), topic = %digest.topic, error = ?e, "delivery failed");
                }
            }
        }
        any_ok
    }
}
