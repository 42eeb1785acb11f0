use super::*;
use lot_watcher::scheduler::{JobStatus, MonitorScheduler};

#[tokio::test(flavor = "multi_thread")]
async fn test_scheduler_basic_operations() -> anyhow::Result<()> {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher
        .push(SSSR, listing_page(&[coin(1)]))
        .push(SSSR, listing_page(&[coin(1), coin(2)]));
    let notifier = RecordingNotifier::new();
    let monitor = build_monitor(fetcher, notifier.clone(), vec![MonitoredPage::new(SSSR)]).await?;

    let mut scheduler = MonitorScheduler::new(Arc::new(monitor)).await?;
    assert!(scheduler.get_job_info().await.is_none());

    // Startup cycle records the baseline
    let startup = scheduler.run_now().await?;
    assert_eq!(startup.new_items, 0);

    scheduler.schedule(60).await?;
    scheduler.start().await?;

    let report = scheduler.run_now().await?;
    assert_eq!(report.new_items, 1);
    assert_eq!(notifier.links(), vec!["https://coins.ay.by/lot/2/"]);

    let info = scheduler.get_job_info().await.expect("job scheduled");
    assert_eq!(info.interval_minutes, 60);
    assert_eq!(info.status, JobStatus::Active);
    assert_eq!(info.run_count, 1);

    scheduler.reschedule(5).await?;
    assert_eq!(scheduler.get_job_info().await.map(|info| info.interval_minutes), Some(5));

    scheduler.shutdown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scheduler_records_failed_cycles() -> anyhow::Result<()> {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.push_failure(SSSR, "unexpected status 503");
    let monitor = build_monitor(fetcher, RecordingNotifier::new(), vec![MonitoredPage::new(SSSR)]).await?;

    let scheduler = MonitorScheduler::new(Arc::new(monitor)).await?;
    scheduler.schedule(1).await?;

    let report = scheduler.run_now().await?;
    assert!(!report.is_success());

    let info = scheduler.get_job_info().await.expect("job scheduled");
    assert_eq!(info.status, JobStatus::Error);
    assert_eq!(info.error_count, 1);
    Ok(())
}
