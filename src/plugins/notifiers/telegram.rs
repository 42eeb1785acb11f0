use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;
use tracing::{debug, warn};
use url::Url;

use crate::config::TelegramConfig;
use crate::plugins::traits::{NotificationEvent, NotificationResult, NotifierPlugin};
use crate::utils::error::{AppError, Result};

/// Telegram rejects photo captions longer than this.
const MAX_CAPTION_CHARS: usize = 1024;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    result: Option<Value>,
    description: Option<String>,
}

/// Minimal Bot API client.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_base: String,
    token: String,
}

impl TelegramClient {
    pub fn new(api_base: &str, token: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn call(&self, method: &str, payload: &Value) -> Result<Option<Value>> {
        let url = format!("{}/bot{}/{}", self.api_base, self.token, method);

        // The request URL embeds the bot token, keep it out of error messages.
        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| AppError::Http(e.without_url()))?;
        let status = response.status();
        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| AppError::Http(e.without_url()))?;

        if !body.ok {
            return Err(AppError::Notification(format!(
                "{} failed ({}): {}",
                method,
                status.as_u16(),
                body.description.unwrap_or_else(|| "no description".to_string())
            )));
        }

        Ok(body.result)
    }

    /// Sends a text message and returns its message id.
    pub async fn send_message(&self, chat_id: i64, text: &str, parse_mode: Option<&str>) -> Result<i64> {
        let mut payload = json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": false,
        });
        if let Some(mode) = parse_mode {
            payload["parse_mode"] = json!(mode);
        }

        let result = self.call("sendMessage", &payload).await?;
        Ok(message_id(result))
    }

    /// Sends a photo by URL with an HTML caption and returns its message id.
    pub async fn send_photo(&self, chat_id: i64, photo: &str, caption: &str) -> Result<i64> {
        let payload = json!({
            "chat_id": chat_id,
            "photo": photo,
            "caption": caption,
            "parse_mode": "HTML",
        });

        let result = self.call("sendPhoto", &payload).await?;
        Ok(message_id(result))
    }

    pub async fn get_me(&self) -> Result<String> {
        let result = self.call("getMe", &json!({})).await?;
        Ok(result
            .as_ref()
            .and_then(|user| user.get("username"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }
}

fn message_id(result: Option<Value>) -> i64 {
    result
        .as_ref()
        .and_then(|message| message.get("message_id"))
        .and_then(Value::as_i64)
        .unwrap_or_default()
}

/// Escapes text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Posts every new lot to the configured chats.
pub struct TelegramNotifier {
    client: TelegramClient,
    chat_ids: Vec<i64>,
    retry_attempts: usize,
    retry_delay_ms: u64,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let token = config
            .bot_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| AppError::Validation("Telegram bot token is not configured".to_string()))?;

        Ok(Self {
            client: TelegramClient::new(&config.api_base, token)?,
            chat_ids: config.chat_ids.clone(),
            retry_attempts: config.retry_attempts,
            retry_delay_ms: config.retry_delay_ms,
        })
    }

    pub fn client(&self) -> &TelegramClient {
        &self.client
    }

    fn format_caption(&self, event: &NotificationEvent) -> String {
        let price = if event.price.is_empty() {
            "не указана"
        } else {
            event.price.as_str()
        };

        format!(
            "🆕 <b>{}</b>\nЦена: {}\n🔗 {}",
            escape_html(&event.title),
            escape_html(price),
            escape_html(&event.link)
        )
    }

    /// Absolute URL of the event image; relative paths resolve against the lot link.
    fn resolve_image(&self, event: &NotificationEvent) -> Option<String> {
        let image = event.image.as_deref().map(str::trim).filter(|i| !i.is_empty())?;
        let lower = image.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Some(image.to_string());
        }

        Url::parse(&event.link)
            .or_else(|_| Url::parse(&event.source_url))
            .and_then(|base| base.join(image))
            .map(|url| url.to_string())
            .ok()
    }

    async fn send_to_chat(&self, chat_id: i64, caption: &str, photo: Option<&str>) -> Result<i64> {
        if let Some(photo) = photo {
            if caption.chars().count() <= MAX_CAPTION_CHARS {
                match self.client.send_photo(chat_id, photo, caption).await {
                    Ok(id) => return Ok(id),
                    Err(e) => warn!("sendPhoto to {} failed, sending text instead: {}", chat_id, e),
                }
            }
        }

        self.client.send_message(chat_id, caption, Some("HTML")).await
    }

    fn retry_strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(2)
            .factor((self.retry_delay_ms / 2).max(1))
            .take(self.retry_attempts)
    }
}

#[async_trait]
impl NotifierPlugin for TelegramNotifier {
    fn name(&self) -> &str {
        "Telegram Notifier"
    }

    fn plugin_type(&self) -> &str {
        "telegram"
    }

    fn description(&self) -> &str {
        "Posts new lots with photo and price to Telegram chats"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult> {
        if self.chat_ids.is_empty() {
            return Ok(NotificationResult::failed("no chat ids configured"));
        }

        let caption = self.format_caption(event);
        let photo = self.resolve_image(event);
        let mut delivered = Vec::new();
        let mut errors = Vec::new();

        for &chat_id in &self.chat_ids {
            let attempt = Retry::spawn(self.retry_strategy(), || {
                self.send_to_chat(chat_id, &caption, photo.as_deref())
            })
            .await;

            match attempt {
                Ok(message_id) => {
                    debug!("Sent {} to chat {} as message {}", event.link, chat_id, message_id);
                    delivered.push(message_id.to_string());
                }
                Err(e) => errors.push(format!("chat {}: {}", chat_id, e)),
            }
        }

        if errors.is_empty() {
            Ok(NotificationResult::delivered(Some(delivered.join(","))))
        } else {
            Ok(NotificationResult {
                success: false,
                message_id: (!delivered.is_empty()).then(|| delivered.join(",")),
                error: Some(errors.join("; ")),
            })
        }
    }

    async fn test_connection(&self) -> Result<bool> {
        let username = self.client.get_me().await?;
        debug!("Connected to Telegram as @{}", username);
        Ok(true)
    }
}
