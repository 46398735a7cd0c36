use anyhow::{bail, Context, Result};
use serde_json::{json, Value};

use super::{redact_url, Notifier, WebhookPost};
use crate::digest::Digest;

/// Feishu/Lark custom bot ("post" rich-text message).
#[derive(Clone)]
pub struct FeishuNotifier {
    post: WebhookPost,
}

impl FeishuNotifier {
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

/// One paragraph per paper.
pub fn payload(digest: &Digest) -> Value {
    let content: Vec<Value> = digest
        .entries
        .iter()
        .map(|e| json!([{ "tag": "text", "text": Digest::render_entry(e) }]))
        .collect();
    json!({
        "msg_type": "post",
        "content": {
            "post": {
                "zh_cn": {
                    "title": digest.heading(),
                    "content": content,
                }
            }
        }
    })
}

#[async_trait::async_trait]
impl Notifier for FeishuNotifier {
    async fn send(&self, digest: &Digest) -> Result<()> {
        let rsp = self.post.post_json(&payload(digest)).await?;
        // Feishu answers 200 with a non-zero `code` for rejected messages. Other hosts routed
        // here may reply with an empty or non-JSON body, which counts as accepted.
        let text = rsp.text().await.context("reading feishu reply")?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        let code = body.get("code").and_then(Value::as_i64).unwrap_or(0);
        if code != 0 {
            let msg = body.get("msg").and_then(Value::as_str).unwrap_or("");
            bail!("feishu rejected message: code={code} msg={msg}");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "feishu"
    }

    fn endpoint(&self) -> String {
        redact_url(&self.post.url)
    }
}
