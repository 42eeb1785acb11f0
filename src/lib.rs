pub mod config;
pub mod extractor;
pub mod fetcher;
pub mod models;
pub mod monitor;
pub mod plugins;
pub mod scheduler;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use models::{MonitoredPage, Record};
pub use utils::error::{AppError, Result};
