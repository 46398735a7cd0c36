use anyhow::Result;
use serde::Serialize;

use super::{redact_url, Notifier, WebhookPost};
use crate::digest::Digest;

const TITLE_LIMIT: usize = 256;
const DESCRIPTION_LIMIT: usize = 4096;

#[derive(Clone)]
pub struct DiscordNotifier {
    post: WebhookPost,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            post: WebhookPost::new(webhook),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.post.timeout = std::time::Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.post.max_retries = retries;
        self
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, digest: &Digest) -> Result<()> {
        let payload = DiscordWebhookPayload::embed(&digest.heading(), &digest.render_text());
        self.post.post_json(&payload).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "discord"
    }

    fn endpoint(&self) -> String {
        redact_url(&self.post.url)
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
}

#[derive(Serialize)]
pub(crate) struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn embed(title: &str, description: &str) -> Self {
        Self {
            content: None,
            embeds: vec![DiscordEmbed {
                title: truncate_chars(title, TITLE_LIMIT),
                description: truncate_chars(description, DESCRIPTION_LIMIT),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_descriptions_are_capped() {
        let long = "x".repeat(5000);
        let p = DiscordWebhookPayload::embed("t", &long);
        assert_eq!(p.embeds[0].description.chars().count(), DESCRIPTION_LIMIT);
        assert!(p.embeds[0].description.ends_with('…'));
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
