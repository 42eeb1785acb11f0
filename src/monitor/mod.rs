//! One check cycle: fetch every enabled page, extract its lots, diff them
//! against the previous observation and notify about the new ones.

pub mod differ;
pub mod store;

pub use differ::diff;
pub use store::ObservationStore;

use futures::future::join_all;
use metrics::counter;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::extractor::Extractor;
use crate::fetcher::Fetcher;
use crate::models::{MonitoredPage, Record};
use crate::plugins::{NotificationEvent, PluginManager};
use crate::utils::error::Result;

/// Outcome of checking a single page.
#[derive(Debug, Clone, Serialize)]
pub struct PageCheckReport {
    pub url: String,
    pub items_found: usize,
    pub new_items: usize,
    /// First successful check of the page; nothing was notified.
    pub baseline: bool,
    pub notified: usize,
    pub failed_notifications: usize,
}

/// Outcome of a whole cycle across all enabled pages.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub pages_checked: usize,
    pub pages_failed: Vec<String>,
    pub items_found: usize,
    pub new_items: usize,
    pub failed_notifications: usize,
}

impl CycleReport {
    pub fn is_success(&self) -> bool {
        self.pages_failed.is_empty()
    }
}

pub struct Monitor {
    fetcher: Arc<dyn Fetcher>,
    extractor: Extractor,
    notifiers: PluginManager,
    pages: Vec<MonitoredPage>,
    store: Mutex<ObservationStore>,
    page_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Monitor {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        extractor: Extractor,
        notifiers: PluginManager,
        pages: Vec<MonitoredPage>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            notifiers,
            pages,
            store: Mutex::new(ObservationStore::new()),
            page_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn pages(&self) -> &[MonitoredPage] {
        &self.pages
    }

    pub fn notifiers(&self) -> &PluginManager {
        &self.notifiers
    }

    /// Extracts records from `markup` and diffs them against the baseline for `url`.
    pub fn process(&self, store: &mut ObservationStore, url: &str, markup: &str) -> Vec<Record> {
        let current = self.extractor.extract_markup(markup);
        if current.is_empty() {
            warn!("No items found at {}", url);
        }
        diff(store, url, current)
    }

    /// Checks one page. A failed fetch leaves the stored baseline untouched.
    pub async fn check_page(&self, page: &MonitoredPage) -> Result<PageCheckReport> {
        let page_lock = self.page_lock(&page.url).await;
        let _guard = page_lock.lock().await;

        info!("Checking {}", page.display_name());
        counter!("lot_watcher_checks_total").increment(1);

        let markup = match self.fetcher.fetch(&page.url).await {
            Ok(markup) => markup,
            Err(e) => {
                counter!("lot_watcher_check_failures_total").increment(1);
                return Err(e);
            }
        };

        let (baseline, items_found, new_records) = {
            let mut store = self.store.lock().await;
            let baseline = !store.contains_url(&page.url);
            let new_records = self.process(&mut store, &page.url, &markup);
            let items_found = store.get(&page.url).map_or(0, |records| records.len());
            (baseline, items_found, new_records)
        };

        let mut notified = 0;
        let mut failed_notifications = 0;
        for record in &new_records {
            let event = NotificationEvent::from_record(record, page);
            let results = self.notifiers.notify_all(&event).await;

            if results.iter().any(|(_, result)| result.success) {
                notified += 1;
            }
            let failures = results.iter().filter(|(_, result)| !result.success).count();
            if failures > 0 {
                failed_notifications += 1;
                counter!("lot_watcher_notifications_failed_total").increment(failures as u64);
            }
        }
        counter!("lot_watcher_new_items_total").increment(new_records.len() as u64);

        if baseline {
            info!("Baseline of {} items recorded for {}", items_found, page.display_name());
        } else {
            info!("Found {} new items at {}", new_records.len(), page.display_name());
        }

        Ok(PageCheckReport {
            url: page.url.clone(),
            items_found,
            new_items: new_records.len(),
            baseline,
            notified,
            failed_notifications,
        })
    }

    /// Checks every enabled page concurrently. Errors stay per page.
    pub async fn check_all(&self) -> CycleReport {
        let pages: Vec<&MonitoredPage> = self.pages.iter().filter(|page| page.enabled).collect();
        info!("Starting monitoring check of {} pages", pages.len());

        let outcomes = join_all(pages.iter().map(|page| self.check_page(page))).await;

        let mut report = CycleReport::default();
        for (page, outcome) in pages.iter().zip(outcomes) {
            match outcome {
                Ok(page_report) => {
                    report.pages_checked += 1;
                    report.items_found += page_report.items_found;
                    report.new_items += page_report.new_items;
                    report.failed_notifications += page_report.failed_notifications;
                }
                Err(e) => {
                    error!("Error checking URL {}: {}", page.url, e);
                    report.pages_failed.push(page.url.clone());
                }
            }
        }

        info!(
            "Monitoring check finished: {} pages ok, {} failed, {} new items",
            report.pages_checked,
            report.pages_failed.len(),
            report.new_items
        );
        report
    }

    /// Whether `url` has a recorded baseline.
    pub async fn has_baseline(&self, url: &str) -> bool {
        self.store.lock().await.contains_url(url)
    }

    async fn page_lock(&self, url: &str) -> Arc<Mutex<()>> {
        let mut locks = self.page_locks.lock().await;
        locks.entry(url.to_string()).or_default().clone()
    }
}
