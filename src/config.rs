use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::Path;
use url::Url;

use crate::models::MonitoredPage;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub fetcher: FetcherConfig,
    pub extractor: ExtractorConfig,
    pub telegram: TelegramConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub pages: Vec<MonitoredPage>,
    pub check_interval_minutes: u64,
    /// Run one cycle right after startup to establish baselines.
    pub run_on_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub user_agent: String,
    /// Seconds.
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub base_origin: String,
    pub detail_path_segment: String,
    pub currency_markers: Vec<String>,
    /// Class-name block lookup, used only when no detail links are present.
    pub fallback_block_class: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_ids: Vec<i64>,
    pub api_base: String,
    pub retry_attempts: usize,
    pub retry_delay_ms: u64,
    pub alerts_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub json: bool,
    pub directory: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            pages: vec![
                MonitoredPage::new("https://coins.ay.by/sssr/yubilejnye/iz-dragocennyh-metallov/"),
                MonitoredPage::new("https://coins.ay.by/rossiya/?f=1&ti1=6/"),
            ],
            check_interval_minutes: 60,
            run_on_start: true,
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string(),
            request_timeout: 10,
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            base_origin: "https://coins.ay.by".to_string(),
            detail_path_segment: "/lot/".to_string(),
            currency_markers: vec!["руб".to_string(), "byn".to_string()],
            fallback_block_class: None,
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_ids: Vec::new(),
            api_base: "https://api.telegram.org".to_string(),
            retry_attempts: 3,
            retry_delay_ms: 1000,
            alerts_enabled: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "lot_watcher=info".to_string(),
            json: false,
            directory: None,
        }
    }
}

impl AppConfig {
    /// Layered load: config files, `LOT_WATCHER__*` variables, then the plain
    /// deployment variables (`MONITOR_URLS`, `CHECK_INTERVAL_MINUTES`, ...).
    pub fn from_env(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let s = Self::file_sources(config_file)
            // Add environment variables such as LOT_WATCHER__MONITOR__RUN_ON_START
            .add_source(Environment::with_prefix("LOT_WATCHER").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config: AppConfig = Self::file_sources(Some(path)).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn file_sources(config_file: Option<&Path>) -> ConfigBuilder<DefaultState> {
        match config_file {
            Some(path) => Config::builder().add_source(File::from(path)),
            None => {
                let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
                Config::builder()
                    .add_source(File::with_name("config/default").required(false))
                    .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
                    // Add local config (ignored by git)
                    .add_source(File::with_name("config/local").required(false))
            }
        }
    }

    /// Applies the variables used by existing deployments. `lookup` returns the
    /// raw value of a variable, if set.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(urls) = lookup("MONITOR_URLS") {
            let mut seen = HashSet::new();
            self.monitor.pages = urls
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .filter(|url| seen.insert(url.to_string()))
                .map(MonitoredPage::new)
                .collect();
        }

        if let Some(minutes) = lookup("CHECK_INTERVAL_MINUTES") {
            self.monitor.check_interval_minutes = minutes.trim().parse().map_err(|_| {
                ConfigError::Message(format!(
                    "CHECK_INTERVAL_MINUTES must be a positive integer, got '{}'",
                    minutes
                ))
            })?;
        }

        if let Some(token) = lookup("BOT_TOKEN") {
            let token = token.trim();
            if !token.is_empty() {
                self.telegram.bot_token = Some(token.to_string());
            }
        }

        if let Some(ids) = lookup("ADMIN_CHAT_IDS") {
            self.telegram.chat_ids = ids
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(|id| {
                    id.parse::<i64>().map_err(|_| {
                        ConfigError::Message(format!("Invalid chat id in ADMIN_CHAT_IDS: '{}'", id))
                    })
                })
                .collect::<Result<_, _>>()?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate monitor configuration
        if self.monitor.pages.is_empty() {
            return Err(ConfigError::Message("At least one monitor URL is required".into()));
        }

        let mut seen = HashSet::new();
        for page in &self.monitor.pages {
            if Url::parse(&page.url).is_err() {
                return Err(ConfigError::Message(format!("Invalid monitor URL: {}", page.url)));
            }
            if !seen.insert(page.url.as_str()) {
                return Err(ConfigError::Message(format!("Duplicate monitor URL: {}", page.url)));
            }
        }

        if self.monitor.check_interval_minutes == 0 {
            return Err(ConfigError::Message("Check interval must be greater than 0".into()));
        }

        // Validate fetcher configuration
        if self.fetcher.request_timeout == 0 {
            return Err(ConfigError::Message("Fetcher request_timeout must be greater than 0".into()));
        }

        // Validate extractor configuration
        if Url::parse(&self.extractor.base_origin).is_err() {
            return Err(ConfigError::Message("Invalid base origin format".into()));
        }

        if self.extractor.detail_path_segment.trim().is_empty() {
            return Err(ConfigError::Message("Detail path segment must not be empty".into()));
        }

        if self.extractor.currency_markers.iter().all(|m| m.trim().is_empty()) {
            return Err(ConfigError::Message("At least one currency marker is required".into()));
        }

        // Validate telegram configuration
        if self.telegram.bot_token.is_some() && self.telegram.chat_ids.is_empty() {
            return Err(ConfigError::Message("Telegram chat_ids are required when bot_token is set".into()));
        }

        if Url::parse(&self.telegram.api_base).is_err() {
            return Err(ConfigError::Message("Invalid Telegram API base URL".into()));
        }

        Ok(())
    }

    pub fn enabled_pages(&self) -> impl Iterator<Item = &MonitoredPage> {
        self.monitor.pages.iter().filter(|page| page.enabled)
    }
}
