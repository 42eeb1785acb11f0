use async_trait::async_trait;
use tracing::info;

use crate::plugins::traits::{NotificationEvent, NotificationResult, NotifierPlugin};
use crate::utils::error::Result;

/// Writes new lots to the application log. Used when no bot token is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotifierPlugin for LogNotifier {
    fn name(&self) -> &str {
        "Log Notifier"
    }

    fn plugin_type(&self) -> &str {
        "log"
    }

    fn description(&self) -> &str {
        "Writes new lots to the application log"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult> {
        info!(
            link = %event.link,
            price = %event.price,
            source = event.source_label.as_deref().unwrap_or(&event.source_url),
            "New lot: {}",
            event.title
        );
        Ok(NotificationResult::delivered(None))
    }
}
