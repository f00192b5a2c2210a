use super::INotifier;
use crate::config::TelegramConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

// https://core.telegram.org/bots/api#sendmessage

/// Longest text the Bot API accepts in one message
pub const MAX_MESSAGE_LEN: usize = 4096;

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Cuts `text` to at most `MAX_MESSAGE_LEN` characters
pub fn truncate_message(text: &str) -> String {
    text.chars().take(MAX_MESSAGE_LEN).collect()
}

pub struct TelegramRestApi {
    client: Client,
    config: TelegramConfig,
}

impl TelegramRestApi {
    pub fn new(config: TelegramConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|e| {
                error!("Unable to build Telegram client, using defaults. Error: {:?}", e);
                Client::new()
            });

        Self { client, config }
    }

    async fn send_to_chat(&self, chat_id: &str, text: &str) -> anyhow::Result<()> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.config.api_url.trim_end_matches('/'),
            self.config.bot_token
        );
        let res = self
            .client
            .post(&url)
            .json(&SendMessageRequest {
                chat_id,
                text,
                parse_mode: "Markdown",
                disable_web_page_preview: true,
            })
            .send()
            .await?;

        let status = res.status();
        let body = res.json::<SendMessageResponse>().await?;
        if !body.ok {
            anyhow::bail!(
                "Telegram rejected message to {} with status {}: {}",
                chat_id,
                status,
                body.description.unwrap_or_default()
            );
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl INotifier for TelegramRestApi {
    /// Sends the message to every configured chat and fails when any of them failed
    async fn send_message(&self, text: &str) -> anyhow::Result<()> {
        let text = truncate_message(text);
        let mut failed = 0;

        for chat_id in &self.config.chat_ids {
            if let Err(e) = self.send_to_chat(chat_id, &text).await {
                warn!("Unable to notify chat {}. Error: {:?}", chat_id, e);
                failed += 1;
            }
        }

        if failed > 0 {
            anyhow::bail!(
                "Notification failed for {} of {} chats",
                failed,
                self.config.chat_ids.len()
            );
        }
        Ok(())
    }
}
