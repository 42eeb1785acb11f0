use super::*;

#[tokio::test]
async fn test_cold_start_then_new_lot() -> anyhow::Result<()> {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher
        .push(SSSR, listing_page(&[coin(1), coin(2)]))
        .push(SSSR, listing_page(&[coin(1), coin(2)]))
        .push(SSSR, listing_page(&[coin(3), coin(1), coin(2)]));
    let notifier = RecordingNotifier::new();
    let monitor = build_monitor(fetcher, notifier.clone(), vec![MonitoredPage::new(SSSR)]).await?;

    let first = monitor.check_all().await;
    assert_eq!(first.items_found, 2);
    assert_eq!(first.new_items, 0);

    let second = monitor.check_all().await;
    assert_eq!(second.new_items, 0);
    assert!(notifier.events().is_empty());

    let third = monitor.check_all().await;
    assert_eq!(third.new_items, 1);
    assert_eq!(notifier.links(), vec!["https://coins.ay.by/lot/3/"]);

    let event = &notifier.events()[0];
    assert_eq!(event.title, "Юбилейная монета");
    assert_eq!(event.price, "135,01 бел. руб.");
    assert_eq!(event.image.as_deref(), Some("https://img.ay.by/lots/3.jpg"));
    assert_eq!(event.source_url, SSSR);
    Ok(())
}

#[tokio::test]
async fn test_pages_have_independent_baselines() -> anyhow::Result<()> {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher
        .push(SSSR, listing_page(&[coin(1)]))
        .push(ROSSIYA, listing_page(&[coin(1), coin(50)]))
        .push(SSSR, listing_page(&[coin(1), coin(50)]))
        .push(ROSSIYA, listing_page(&[coin(1), coin(50)]));
    let notifier = RecordingNotifier::new();
    let pages = vec![
        MonitoredPage::new(SSSR).with_label("СССР"),
        MonitoredPage::new(ROSSIYA).with_label("Россия"),
    ];
    let monitor = build_monitor(fetcher, notifier.clone(), pages).await?;

    monitor.check_all().await;
    let report = monitor.check_all().await;

    assert_eq!(report.pages_checked, 2);
    assert_eq!(report.new_items, 1);
    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].link, "https://coins.ay.by/lot/50/");
    assert_eq!(events[0].source_label.as_deref(), Some("СССР"));
    Ok(())
}

#[tokio::test]
async fn test_fetch_failure_is_isolated_and_keeps_baseline() -> anyhow::Result<()> {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher
        .push(SSSR, listing_page(&[coin(1)]))
        .push(ROSSIYA, listing_page(&[coin(7)]))
        .push_failure(SSSR, "unexpected status 502")
        .push(ROSSIYA, listing_page(&[coin(7), coin(8)]))
        .push(SSSR, listing_page(&[coin(1), coin(2)]));
    let notifier = RecordingNotifier::new();
    let pages = vec![MonitoredPage::new(SSSR), MonitoredPage::new(ROSSIYA)];
    let monitor = build_monitor(fetcher.clone(), notifier.clone(), pages).await?;

    monitor.check_all().await;
    let failed_cycle = monitor.check_all().await;

    assert_eq!(failed_cycle.pages_failed, vec![SSSR.to_string()]);
    assert_eq!(notifier.links(), vec!["https://coins.ay.by/lot/8/"]);
    assert!(monitor.has_baseline(SSSR).await);

    let report = monitor.check_page(&MonitoredPage::new(SSSR)).await?;
    assert!(!report.baseline);
    assert_eq!(report.new_items, 1);
    assert_eq!(
        notifier.links(),
        vec!["https://coins.ay.by/lot/8/", "https://coins.ay.by/lot/2/"]
    );
    assert_eq!(fetcher.calls().iter().filter(|url| url.as_str() == SSSR).count(), 3);
    Ok(())
}

#[tokio::test]
async fn test_failure_before_first_success_is_not_a_baseline() -> anyhow::Result<()> {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher
        .push_failure(SSSR, "request timed out")
        .push(SSSR, listing_page(&[coin(1), coin(2)]));
    let notifier = RecordingNotifier::new();
    let monitor = build_monitor(fetcher, notifier.clone(), vec![MonitoredPage::new(SSSR)]).await?;

    assert!(monitor.check_page(&MonitoredPage::new(SSSR)).await.is_err());
    assert!(!monitor.has_baseline(SSSR).await);

    let report = monitor.check_page(&MonitoredPage::new(SSSR)).await?;
    assert!(report.baseline);
    assert!(notifier.events().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_disappeared_lot_is_notified_again() -> anyhow::Result<()> {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher
        .push(SSSR, listing_page(&[coin(1), coin(2)]))
        .push(SSSR, listing_page(&[coin(1)]))
        .push(SSSR, listing_page(&[coin(1), coin(2)]));
    let notifier = RecordingNotifier::new();
    let monitor = build_monitor(fetcher, notifier.clone(), vec![MonitoredPage::new(SSSR)]).await?;

    for _ in 0..3 {
        monitor.check_all().await;
    }

    assert_eq!(notifier.links(), vec!["https://coins.ay.by/lot/2/"]);
    Ok(())
}

#[tokio::test]
async fn test_price_change_is_not_a_new_lot() -> anyhow::Result<()> {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher
        .push(SSSR, listing_page(&[(1, "Рубль 1924", "135,01")]))
        .push(SSSR, listing_page(&[(1, "Рубль 1924 (снижена цена)", "99,00")]));
    let notifier = RecordingNotifier::new();
    let monitor = build_monitor(fetcher, notifier.clone(), vec![MonitoredPage::new(SSSR)]).await?;

    monitor.check_all().await;
    let report = monitor.check_all().await;

    assert_eq!(report.new_items, 0);
    assert!(notifier.events().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_empty_page_wipes_baseline() -> anyhow::Result<()> {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher
        .push(SSSR, listing_page(&[coin(1)]))
        .push(SSSR, "<html><body><p>Технические работы</p></body></html>".to_string())
        .push(SSSR, listing_page(&[coin(1)]));
    let notifier = RecordingNotifier::new();
    let monitor = build_monitor(fetcher, notifier.clone(), vec![MonitoredPage::new(SSSR)]).await?;

    monitor.check_all().await;
    let empty = monitor.check_all().await;
    assert_eq!(empty.items_found, 0);
    assert!(empty.is_success());

    monitor.check_all().await;
    assert_eq!(notifier.links(), vec!["https://coins.ay.by/lot/1/"]);
    Ok(())
}

#[tokio::test]
async fn test_notify_failure_is_counted_not_retried() -> anyhow::Result<()> {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher
        .push(SSSR, listing_page(&[coin(1)]))
        .push(SSSR, listing_page(&[coin(1), coin(2)]))
        .push(SSSR, listing_page(&[coin(1), coin(2)]));
    let notifier = RecordingNotifier::failing();
    let monitor = build_monitor(fetcher, notifier.clone(), vec![MonitoredPage::new(SSSR)]).await?;

    monitor.check_all().await;
    let report = monitor.check_all().await;
    assert_eq!(report.new_items, 1);
    assert_eq!(report.failed_notifications, 1);

    let next = monitor.check_all().await;
    assert_eq!(next.new_items, 0);
    assert_eq!(notifier.events().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_checks_of_one_page_notify_once() -> anyhow::Result<()> {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher
        .push(SSSR, listing_page(&[coin(1)]))
        .push(SSSR, listing_page(&[coin(1), coin(2)]))
        .push(SSSR, listing_page(&[coin(1), coin(2)]));
    let notifier = RecordingNotifier::new();
    let monitor = build_monitor(fetcher, notifier.clone(), vec![MonitoredPage::new(SSSR)]).await?;
    let page = MonitoredPage::new(SSSR);

    monitor.check_page(&page).await?;
    let (a, b) = tokio::join!(monitor.check_page(&page), monitor.check_page(&page));

    assert_eq!(a?.new_items + b?.new_items, 1);
    assert_eq!(notifier.links(), vec!["https://coins.ay.by/lot/2/"]);
    Ok(())
}
