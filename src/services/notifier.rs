// src/services/notifier.rs

//! Push notification delivery through the Telegram Bot API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::NotifierConfig;
use crate::utils::http;

/// Delivery channel; each one maps to its own bot credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Keyword-found events
    Primary,
    /// Page change events
    Secondary,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Primary => "primary",
            Channel::Secondary => "secondary",
        }
    }
}

/// Capability to deliver a formatted message to a recipient.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `text` to `recipient` over `channel`.
    ///
    /// An unconfigured channel is a logged no-op, not an error.
    async fn send_message(&self, recipient: &str, text: &str, channel: Channel) -> Result<()>;
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

/// Telegram bot notifier with one token per channel.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    keyword_token: Option<String>,
    updates_token: Option<String>,
}

impl TelegramNotifier {
    /// Create a notifier from configuration.
    pub fn new(config: &NotifierConfig) -> Result<Self> {
        Ok(Self {
            client: http::create_notify_client(config)?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            keyword_token: config.keyword_bot_token.clone(),
            updates_token: config.updates_bot_token.clone(),
        })
    }

    fn token(&self, channel: Channel) -> Option<&str> {
        let token = match channel {
            Channel::Primary => self.keyword_token.as_deref(),
            Channel::Secondary => self.updates_token.as_deref(),
        };
        token.filter(|token| !token.trim().is_empty())
    }

    fn endpoint(&self, token: &str) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, token)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_message(&self, recipient: &str, text: &str, channel: Channel) -> Result<()> {
        let Some(token) = self.token(channel) else {
            log::warn!(
                "No bot token configured for {} channel - notification not sent",
                channel.as_str()
            );
            return Ok(());
        };
        if recipient.trim().is_empty() {
            log::warn!("Empty recipient - notification not sent");
            return Ok(());
        }

        let payload = SendMessage {
            chat_id: recipient,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(self.endpoint(token))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::notify(format!("Telegram returned {status}: {body}")));
        }

        log::debug!("Sent {} notification to {}", channel.as_str(), recipient);
        Ok(())
    }
}
