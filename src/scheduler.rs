use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::monitor::{CycleReport, Monitor};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: Uuid,
    pub interval_minutes: u64,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub skipped_count: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobStatus {
    Active,
    Error,
}

/// Runs monitoring cycles on a fixed minute interval.
pub struct MonitorScheduler {
    scheduler: JobScheduler,
    monitor: Arc<Monitor>,
    job: Arc<RwLock<Option<JobInfo>>>,
    cycle_lock: Arc<Mutex<()>>,
    start_time: DateTime<Utc>,
}

impl MonitorScheduler {
    pub async fn new(monitor: Arc<Monitor>) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            monitor,
            job: Arc::new(RwLock::new(None)),
            cycle_lock: Arc::new(Mutex::new(())),
            start_time: Utc::now(),
        })
    }

    pub async fn start(&self) -> Result<()> {
        self.scheduler.start().await?;
        tracing::info!("Monitor scheduler started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler.shutdown().await?;
        tracing::info!("Monitor scheduler shutdown");
        Ok(())
    }

    /// Schedules a cycle every `interval_minutes`, replacing any existing job.
    pub async fn schedule(&self, interval_minutes: u64) -> Result<Uuid> {
        if interval_minutes == 0 {
            return Err(anyhow!("Check interval must be greater than 0"));
        }

        let previous = self.job.write().await.take();
        if let Some(previous) = &previous {
            self.scheduler.remove(&previous.id).await?;
            tracing::debug!("Removed job {}", previous.id);
        }

        let monitor = Arc::clone(&self.monitor);
        let job_info = Arc::clone(&self.job);
        let cycle_lock = Arc::clone(&self.cycle_lock);

        let job = Job::new_repeated_async(
            Duration::from_secs(interval_minutes * 60),
            move |_uuid, _l| {
                let monitor = Arc::clone(&monitor);
                let job_info = Arc::clone(&job_info);
                let cycle_lock = Arc::clone(&cycle_lock);

                Box::pin(async move {
                    Self::run_cycle(&monitor, &job_info, &cycle_lock).await;
                })
            },
        )?;
        let id = self.scheduler.add(job).await?;

        let info = match previous {
            Some(previous) => JobInfo {
                id,
                interval_minutes,
                ..previous
            },
            None => JobInfo {
                id,
                interval_minutes,
                status: JobStatus::Active,
                created_at: Utc::now(),
                last_run: None,
                run_count: 0,
                success_count: 0,
                error_count: 0,
                skipped_count: 0,
                last_error: None,
            },
        };
        *self.job.write().await = Some(info);

        tracing::info!("Monitoring every {} minutes (job {})", interval_minutes, id);
        Ok(id)
    }

    /// Schedules the job, optionally runs the startup cycle, then starts ticking.
    ///
    /// The job exists before the startup cycle so that cycle is counted in [`JobInfo`].
    pub async fn launch(
        &self,
        interval_minutes: u64,
        run_on_start: bool,
    ) -> Result<Option<CycleReport>> {
        self.schedule(interval_minutes).await?;

        let startup = if run_on_start {
            Some(self.run_now().await?)
        } else {
            None
        };

        self.start().await?;
        Ok(startup)
    }

    /// Changes the interval of the running job. Counters are kept.
    pub async fn reschedule(&self, interval_minutes: u64) -> Result<Uuid> {
        if self.job.read().await.is_none() {
            return Err(anyhow!("No monitoring job is scheduled"));
        }
        self.schedule(interval_minutes).await
    }

    /// Runs a cycle immediately, outside of the schedule.
    pub async fn run_now(&self) -> Result<CycleReport> {
        tracing::info!("Running immediate monitoring check");
        Self::run_cycle(&self.monitor, &self.job, &self.cycle_lock)
            .await
            .ok_or_else(|| anyhow!("A monitoring cycle is already running"))
    }

    pub async fn get_job_info(&self) -> Option<JobInfo> {
        self.job.read().await.clone()
    }

    pub fn uptime_seconds(&self) -> u64 {
        Utc::now()
            .signed_duration_since(self.start_time)
            .num_seconds()
            .max(0) as u64
    }

    /// `None` when another cycle holds the lock; ticks never overlap.
    async fn run_cycle(
        monitor: &Monitor,
        job: &RwLock<Option<JobInfo>>,
        cycle_lock: &Mutex<()>,
    ) -> Option<CycleReport> {
        let Ok(_guard) = cycle_lock.try_lock() else {
            tracing::warn!("Previous monitoring cycle is still running, skipping this one");
            if let Some(info) = job.write().await.as_mut() {
                info.skipped_count += 1;
            }
            return None;
        };

        let report = monitor.check_all().await;
        Self::update_job_stats(job, &report).await;
        Some(report)
    }

    async fn update_job_stats(job: &RwLock<Option<JobInfo>>, report: &CycleReport) {
        let mut job = job.write().await;
        let Some(info) = job.as_mut() else {
            return;
        };

        info.last_run = Some(Utc::now());
        info.run_count += 1;

        if report.is_success() {
            info.success_count += 1;
            info.last_error = None;
            info.status = JobStatus::Active;
        } else {
            info.error_count += 1;
            info.last_error = Some(format!("Failed pages: {}", report.pages_failed.join(", ")));
            info.status = JobStatus::Error;
        }
    }
}
