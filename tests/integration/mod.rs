// Integration tests for lot-watcher
// These tests drive the whole fetch -> extract -> diff -> notify pipeline

pub mod pipeline_tests;
pub mod scheduler_tests;

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use lot_watcher::{
    config::ExtractorConfig,
    extractor::Extractor,
    fetcher::Fetcher,
    monitor::Monitor,
    plugins::{NotificationEvent, NotificationResult, NotifierPlugin, PluginManager},
    AppError, MonitoredPage, Result,
};

pub const SSSR: &str = "https://coins.ay.by/sssr/yubilejnye/iz-dragocennyh-metallov/";
pub const ROSSIYA: &str = "https://coins.ay.by/rossiya/?f=1&ti1=6";

/// Fetcher that replays queued responses per URL.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: Mutex<HashMap<String, VecDeque<Result<String>>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, url: &str, markup: String) -> &Self {
        self.queue(url, Ok(markup))
    }

    pub fn push_failure(&self, url: &str, reason: &str) -> &Self {
        self.queue(url, Err(AppError::fetch(url, reason)))
    }

    fn queue(&self, url: &str, response: Result<String>) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.calls.lock().unwrap().push(url.to_string());
        self.responses
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(AppError::fetch(url, "no scripted response")))
    }
}

/// Notifier that keeps every event it receives.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn links(&self) -> Vec<String> {
        self.events().into_iter().map(|event| event.link).collect()
    }
}

#[async_trait]
impl NotifierPlugin for RecordingNotifier {
    fn name(&self) -> &str {
        "Recording Notifier"
    }

    fn plugin_type(&self) -> &str {
        "recording"
    }

    fn description(&self) -> &str {
        "Keeps notifications in memory"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult> {
        self.events.lock().unwrap().push(event.clone());
        if self.fail {
            Err(AppError::Notification("chat not found".to_string()))
        } else {
            Ok(NotificationResult::delivered(None))
        }
    }
}

/// A listing page laid out like the coins.ay.by catalogue.
pub fn listing_page(lots: &[(u32, &str, &str)]) -> String {
    let cards: String = lots
        .iter()
        .map(|(id, title, price)| {
            format!(
                r#"
                <li class="viewer-type-card__li">
                    <div class="item-type-card__card">
                        <a class="item-type-card__link" href="/lot/{id}/">
                            <img class="item-type-card__img" src="https://img.ay.by/lots/{id}.jpg" alt="{title}">
                        </a>
                        <p class="item-type-card__title"><a href="/lot/{id}/">{title}</a></p>
                        <div class="item-type-card__info">
                            <strong class="item-type-card__price">{price}</strong>
                            <span class="item-type-card__currency">бел. руб.</span>
                        </div>
                    </div>
                </li>"#
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
        <html lang="ru">
            <head><title>Монеты</title><script>var dataLayer = [];</script></head>
            <body>
                <header><a href="/">ay.by</a><a href="/sssr/">СССР</a></header>
                <ul class="viewer-type-card">{cards}</ul>
                <footer>© ay.by</footer>
            </body>
        </html>"#
    )
}

pub fn coin(id: u32) -> (u32, &'static str, &'static str) {
    (id, "Юбилейная монета", "135,01")
}

pub async fn build_monitor(
    fetcher: Arc<ScriptedFetcher>,
    notifier: RecordingNotifier,
    pages: Vec<MonitoredPage>,
) -> anyhow::Result<Monitor> {
    let notifiers = PluginManager::new();
    notifiers.register_notifier(Box::new(notifier)).await?;
    let extractor = Extractor::new(ExtractorConfig::default())?;

    Ok(Monitor::new(fetcher, extractor, notifiers, pages))
}
