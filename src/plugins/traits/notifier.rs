use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{MonitoredPage, Record};
use crate::utils::error::Result;

/// A newly listed lot, ready to be delivered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationEvent {
    pub title: String,
    pub price: String,
    pub image: Option<String>,
    pub link: String,
    pub source_url: String,
    pub source_label: Option<String>,
}

impl NotificationEvent {
    pub fn from_record(record: &Record, page: &MonitoredPage) -> Self {
        Self {
            title: record.title().to_string(),
            price: record.price().to_string(),
            image: record.image().map(str::to_string),
            link: record.link().to_string(),
            source_url: page.url.clone(),
            source_label: page.label.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl NotificationResult {
    pub fn delivered(message_id: Option<String>) -> Self {
        Self {
            success: true,
            message_id,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

/// Trait for implementing notification channels (Telegram, logs, ...)
#[async_trait]
pub trait NotifierPlugin: Send + Sync {
    /// Plugin metadata
    fn name(&self) -> &str;
    fn plugin_type(&self) -> &str;
    fn description(&self) -> &str;

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult>;

    /// Checks that the channel is reachable with the configured credentials.
    async fn test_connection(&self) -> Result<bool> {
        Ok(true)
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
