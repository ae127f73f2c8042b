use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::DigestError;

const DISCORD_API_BASE: &str = "https://discord.com/api/v10";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Discord caps messages at 2000 characters; chunk with margin.
const CHUNK_LIMIT: usize = 1900;

/// Bounded retry: the whole send is attempted at most this many times.
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

/// Outbound side of the pipeline: one message to one recipient per run.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn send(&self, recipient_id: u64, text: &str) -> Result<(), DigestError>;
}

/// Sends the digest as a Discord bot DM.
pub struct DiscordClient {
    http: reqwest::Client,
    base_url: String,
    bot_token: String,
    retry_base_delay: Duration,
}

impl DiscordClient {
    pub fn new(bot_token: &str) -> Result<Self> {
        Self::with_base_url(bot_token, DISCORD_API_BASE)
    }

    pub fn with_base_url(bot_token: &str, base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build Discord HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            retry_base_delay: RETRY_BASE_DELAY,
        })
    }

    #[cfg(test)]
    fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, String> {
        let url = format!("{}{}", self.base_url, path);
        let res = self
            .http
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(200).collect();
            return Err(format!("HTTP {}: {}", status.as_u16(), snippet));
        }
        res.json().await.map_err(|e| e.to_string())
    }

    async fn open_dm_channel(&self, recipient_id: u64) -> Result<String, String> {
        #[derive(Deserialize)]
        struct DmChannel {
            id: String,
        }

        let body = json!({ "recipient_id": recipient_id.to_string() });
        let channel = self.post("/users/@me/channels", body).await?;
        let channel: DmChannel = serde_json::from_value(channel)
            .map_err(|e| format!("DM channel response malformed: {}", e))?;
        Ok(channel.id)
    }

    async fn send_once(&self, recipient_id: u64, text: &str) -> Result<(), String> {
        let channel_id = self.open_dm_channel(recipient_id).await?;
        for chunk in split_message(text, CHUNK_LIMIT) {
            let body = json!({ "content": chunk });
            self.post(&format!("/channels/{}/messages", channel_id), body)
                .await?;
            info!("sent message chunk ({} chars)", chunk.len());
        }
        Ok(())
    }
}

#[async_trait]
impl Delivery for DiscordClient {
    async fn send(&self, recipient_id: u64, text: &str) -> Result<(), DigestError> {
        let mut last_reason = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            match self.send_once(recipient_id, text).await {
                Ok(()) => return Ok(()),
                Err(reason) => {
                    warn!("delivery attempt {}/{} failed: {}", attempt, MAX_ATTEMPTS, reason);
                    last_reason = reason;
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(self.retry_base_delay * 2u32.pow(attempt - 1)).await;
                    }
                }
            }
        }
        Err(DigestError::Delivery {
            attempts: MAX_ATTEMPTS,
            reason: last_reason,
        })
    }
}

/// Split on line boundaries so no chunk exceeds `max_len`.
///
/// A single line longer than `max_len` becomes its own chunk; Discord
/// rejects it rather than us corrupting the layout mid-line.
pub fn split_message(message: &str, max_len: usize) -> Vec<String> {
    if message.len() <= max_len {
        return vec![message.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in message.split('\n') {
        if !current.is_empty() && current.len() + line.len() + 1 > max_len {
            chunks.push(current.trim_end().to_string());
            current = String::new();
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim_end().is_empty() {
        chunks.push(current.trim_end().to_string());
    }
    chunks
}
