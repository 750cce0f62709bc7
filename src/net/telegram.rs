//! Telegram Bot API transport.
//!
//! Thin long-poll client over `getUpdates`/`sendMessage`. Only messages
//! from the single configured chat peer are surfaced as text; any other
//! update still advances the poll offset so the burst terminates.

use anyhow::{anyhow, Result};
use log::debug;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;

use super::{ChatTransport, ChatUpdate};

const API_BASE: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

pub struct TelegramTransport {
    client: reqwest::Client,
    base: String,
    chat_id: String,
}

impl TelegramTransport {
    pub fn new(token: &str, chat_id: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(anyhow!("bot token is not configured"));
        }
        if chat_id.is_empty() {
            return Err(anyhow!("chat id is not configured"));
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(TelegramTransport {
            client,
            base: format!("{}/bot{}", API_BASE, token),
            chat_id: chat_id.to_string(),
        })
    }

    fn authorized(&self, chat: i64) -> bool {
        chat.to_string() == self.chat_id
    }
}

impl ChatTransport for TelegramTransport {
    async fn fetch_updates(&mut self, offset: i64) -> Result<Vec<ChatUpdate>> {
        let url = format!("{}/getUpdates", self.base);
        let request = self
            .client
            .get(&url)
            .query(&[("offset", offset.to_string()), ("timeout", "0".to_string())]);

        let response = timeout(REQUEST_TIMEOUT, request.send())
            .await
            .map_err(|_| anyhow!("getUpdates timed out"))?
            .map_err(|e| anyhow!("getUpdates request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(anyhow!("getUpdates returned status {}", response.status()));
        }

        let body: UpdatesResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse getUpdates response: {}", e))?;
        if !body.ok {
            return Err(anyhow!("getUpdates reported not-ok"));
        }

        let updates = body
            .result
            .into_iter()
            .map(|u| {
                let text = u.message.and_then(|m| {
                    if self.authorized(m.chat.id) {
                        m.text
                    } else {
                        debug!("Dropping update {} from unauthorized chat", u.update_id);
                        None
                    }
                });
                ChatUpdate {
                    update_id: u.update_id,
                    text,
                }
            })
            .collect();
        Ok(updates)
    }

    async fn send(&mut self, text: &str) -> Result<()> {
        let url = format!("{}/sendMessage", self.base);
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
        });

        let response = timeout(REQUEST_TIMEOUT, self.client.post(&url).json(&payload).send())
            .await
            .map_err(|_| anyhow!("sendMessage timed out"))?
            .map_err(|e| anyhow!("sendMessage request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(anyhow!("sendMessage returned status {}", response.status()));
        }
        Ok(())
    }
}
