//! Forwards `ERROR` events to the admin chats.
//!
//! The layer never performs I/O: it formats the alert and hands it to a
//! channel. [`spawn_alert_worker`] drains the channel and talks to Telegram.
//! Delivery problems of the worker go to stderr, so they can never produce
//! another alert.

use chrono::{DateTime, Utc};
use std::fmt::{self, Write as _};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::plugins::notifiers::TelegramClient;

pub const MAX_ALERT_LENGTH: usize = 3500;

pub struct AdminAlertLayer {
    sender: mpsc::UnboundedSender<String>,
}

impl AdminAlertLayer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl<S: Subscriber> Layer<S> for AdminAlertLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() != Level::ERROR {
            return;
        }

        let mut visitor = AlertVisitor::default();
        event.record(&mut visitor);

        let location = match (metadata.file(), metadata.line()) {
            (Some(file), Some(line)) => format!("{}:{}", file, line),
            (Some(file), None) => file.to_string(),
            _ => metadata.module_path().unwrap_or("unknown").to_string(),
        };

        let alert = build_alert(
            metadata.level(),
            metadata.target(),
            &location,
            &visitor.finish(),
            Utc::now(),
        );
        // Receiver gone means the worker stopped; alerts are best effort.
        let _ = self.sender.send(alert);
    }
}

#[derive(Default)]
struct AlertVisitor {
    message: String,
    fields: String,
}

impl AlertVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{}\n{}", self.message, self.fields.trim_end())
        }
    }
}

impl Visit for AlertVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            let _ = writeln!(self.fields, "{} = {}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            let _ = writeln!(self.fields, "{} = {:?}", field.name(), value);
        }
    }
}

/// Formats an alert; only the last [`MAX_ALERT_LENGTH`] chars of `details` are kept.
pub fn build_alert(
    level: &Level,
    target: &str,
    location: &str,
    details: &str,
    at: DateTime<Utc>,
) -> String {
    let total = details.chars().count();
    let details: String = details
        .chars()
        .skip(total.saturating_sub(MAX_ALERT_LENGTH))
        .collect();

    format!(
        "⚠️ Ошибка уровня {}\nВремя: {}\nЛоггер: {}\nИсточник: {}\n\n{}",
        level,
        at.format("%Y-%m-%d %H:%M:%S UTC"),
        target,
        location,
        details
    )
}

/// Sends every queued alert to each admin chat until all senders are dropped.
pub fn spawn_alert_worker(
    client: TelegramClient,
    chat_ids: Vec<i64>,
    mut receiver: mpsc::UnboundedReceiver<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(alert) = receiver.recv().await {
            for &chat_id in &chat_ids {
                if let Err(e) = client.send_message(chat_id, &alert, None).await {
                    eprintln!("Failed to notify admin {}: {}", chat_id, e);
                }
            }
        }
    })
}
