use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::traits::{NotificationEvent, NotificationResult, NotifierPlugin};
use crate::utils::error::AppError;

pub type NotifierPluginBox = Box<dyn NotifierPlugin>;

/// Registry of notification channels. Every event is fanned out to all of them.
#[derive(Clone)]
pub struct PluginManager {
    notifiers: Arc<RwLock<HashMap<String, NotifierPluginBox>>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            notifiers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a notifier plugin, replacing any plugin of the same type
    pub async fn register_notifier(&self, plugin: NotifierPluginBox) -> Result<(), AppError> {
        let plugin_type = plugin.plugin_type().to_string();
        if plugin_type.trim().is_empty() {
            return Err(AppError::Plugin {
                plugin_type,
                message: "plugin type must not be empty".to_string(),
            });
        }

        let mut notifiers = self.notifiers.write().await;
        if let Some(previous) = notifiers.insert(plugin_type.clone(), plugin) {
            warn!("Replacing notifier plugin '{}' ({})", plugin_type, previous.name());
        }
        Ok(())
    }

    /// Check if a notifier plugin exists
    pub async fn has_notifier(&self, plugin_type: &str) -> bool {
        let notifiers = self.notifiers.read().await;
        notifiers.contains_key(plugin_type)
    }

    /// List all registered notifier types, sorted
    pub async fn list_notifier_types(&self) -> Vec<String> {
        let notifiers = self.notifiers.read().await;
        let mut types: Vec<String> = notifiers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Delivers `event` through every registered notifier, once each.
    ///
    /// Plugin errors are turned into failed results; nothing is retried here.
    pub async fn notify_all(&self, event: &NotificationEvent) -> Vec<(String, NotificationResult)> {
        let notifiers = self.notifiers.read().await;
        let mut results = Vec::with_capacity(notifiers.len());

        for (plugin_type, notifier) in notifiers.iter() {
            let result = match notifier.notify(event).await {
                Ok(result) => result,
                Err(e) => NotificationResult::failed(e.to_string()),
            };

            if result.success {
                debug!("Notifier {} delivered {}", plugin_type, event.link);
            } else {
                warn!(
                    "Notifier {} failed for {}: {}",
                    plugin_type,
                    event.link,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push((plugin_type.clone(), result));
        }

        results
    }

    /// Probes every notifier, returning the types that are not reachable.
    pub async fn test_connections(&self) -> Vec<String> {
        let notifiers = self.notifiers.read().await;
        let mut unreachable = Vec::new();

        for (plugin_type, notifier) in notifiers.iter() {
            match notifier.test_connection().await {
                Ok(true) => debug!("Notifier {} is reachable", plugin_type),
                Ok(false) => unreachable.push(plugin_type.clone()),
                Err(e) => {
                    warn!("Connection test for notifier {} failed: {}", plugin_type, e);
                    unreachable.push(plugin_type.clone());
                }
            }
        }

        unreachable
    }

    /// Shutdown all plugins
    pub async fn shutdown(&self) -> Result<(), AppError> {
        let mut notifiers = self.notifiers.write().await;
        for (_, plugin) in notifiers.drain() {
            if let Err(e) = plugin.shutdown().await {
                warn!("Error shutting down notifier plugin: {}", e);
            }
        }

        Ok(())
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}
