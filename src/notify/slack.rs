use anyhow::Result;
use serde_json::{json, Value};

use super::{redact_url, Notifier, WebhookPost};
use crate::digest::Digest;

pub struct SlackNotifier {
    post: WebhookPost,
}

impl SlackNotifier {
    pub fn new(url: String) -> Self {
        Self {
            post: WebhookPost::new(url),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.post.timeout = std::time::Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, n: u8) -> Self {
        self.post.max_retries = n;
        self
    }
}

pub fn payload(digest: &Digest) -> Value {
    json!({ "text": format!("*{}*\n\n{}", digest.heading(), digest.render_text()) })
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, digest: &Digest) -> Result<()> {
        self.post.post_json(&payload(digest)).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }

    fn endpoint(&self) -> String {
        redact_url(&self.post.url)
    }
}
