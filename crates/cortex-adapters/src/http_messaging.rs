//! HTTP-backed [`MessagingPlatform`] — posts `{channel, text, blocks?}`
//! (§6) to the messaging platform's own send-message endpoint, bearer-
//! authenticated with the configured bot token.

use async_trait::async_trait;
use serde_json::json;

use crate::error::AdapterError;
use crate::traits::MessagingPlatform;
use crate::types::OutboundMessage;

pub struct HttpMessagingPlatform {
    client: reqwest::Client,
    post_message_url: String,
    bot_token: String,
}

impl HttpMessagingPlatform {
    pub fn new(post_message_url: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            post_message_url: post_message_url.into(),
            bot_token: bot_token.into(),
        }
    }
}

#[async_trait]
impl MessagingPlatform for HttpMessagingPlatform {
    async fn post_message(&self, msg: &OutboundMessage) -> Result<(), AdapterError> {
        let body = json!({
            "channel": msg.recipient_id,
            "text": msg.content,
            "blocks": msg.blocks,
        });

        let resp = self
            .client
            .post(&self.post_message_url)
            .bearer_auth(&self.bot_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdapterError::Timeout { ms: 10_000 }
                } else {
                    AdapterError::ConnectionFailed(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(AdapterError::SendFailed(format!("status {status}: {text}")));
        }
        Ok(())
    }
}
