//! Batch runner: pacing, ordering and per-item isolation.

use std::sync::Arc;
use std::time::Duration;

use discovery_engine::testing::{hit, MockFetcher, MockProvider, StaticProviderFactory};
use discovery_engine::{
    BatchOptions, BusinessQuery, DiscoveryConfig, DiscoveryEngine, PlatformKey, ProviderCredentials,
    SearchProvider,
};
use tokio::time::Instant;

fn engine(providers: Vec<Arc<MockProvider>>, config: DiscoveryConfig) -> DiscoveryEngine {
    let providers: Vec<Arc<dyn SearchProvider>> = providers
        .into_iter()
        .map(|p| p as Arc<dyn SearchProvider>)
        .collect();
    DiscoveryEngine::builder()
        .config(config)
        .fetcher(Arc::new(MockFetcher::new()))
        .provider_factory(Arc::new(StaticProviderFactory::new(providers)))
        .build()
        .expect("engine builds with injected fetcher")
}

fn businesses(names: &[&str]) -> Vec<BusinessQuery> {
    names
        .iter()
        .map(|n| BusinessQuery::new(*n).with_address("London"))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn items_are_paced_by_the_configured_delay() {
    let engine = engine(vec![], DiscoveryConfig::default());
    let started = Instant::now();

    let report = engine
        .discover_batch(
            businesses(&["Acme Cafe", "Zenith Bakery", "Harbour Fish Bar"]),
            &ProviderCredentials::default(),
            BatchOptions::default(),
        )
        .await;

    let elapsed = started.elapsed();
    assert_eq!(report.total, 3);
    assert_eq!(report.processed, 3);
    assert_eq!(report.failed, 0);
    // Two gaps of one second; no delay after the last item.
    assert!(elapsed >= Duration::from_secs(2), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn delay_never_drops_below_the_floor() {
    let config = DiscoveryConfig {
        batch_delay: Duration::from_millis(50),
        ..Default::default()
    };
    let engine = engine(vec![], config);
    let started = Instant::now();

    engine
        .discover_batch(
            businesses(&["Acme Cafe", "Zenith Bakery", "Harbour Fish Bar"]),
            &ProviderCredentials::default(),
            BatchOptions::default(),
        )
        .await;

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(1000), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1500), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn failures_and_panics_are_isolated_per_item() {
    let serper = Arc::new(
        MockProvider::new("serper")
            .panicking_for("Broken Bakery")
            .on_platform(
                PlatformKey::Yell,
                vec![hit("https://www.yell.com/biz/acme-cafe-london/", "Acme Cafe", "London")],
            ),
    );
    let engine = engine(vec![serper], DiscoveryConfig::default());

    let report = engine
        .discover_batch(
            businesses(&["Acme Cafe", "Broken Bakery", "  ", "Zenith Bakery"]),
            &ProviderCredentials::default(),
            BatchOptions::default(),
        )
        .await;

    assert_eq!(report.total, 4);
    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 2);

    let names: Vec<&str> = report.items.iter().map(|i| i.business_name.as_str()).collect();
    assert_eq!(names, vec!["Acme Cafe", "Broken Bakery", "  ", "Zenith Bakery"]);

    let acme = report.items[0].result.as_ref().unwrap();
    assert_eq!(acme.url(PlatformKey::Yell), Some("https://www.yell.com/biz/acme-cafe-london"));

    let panicked = report.items[1].error.as_deref().unwrap();
    assert!(panicked.contains("panicked"), "{panicked}");
    assert!(report.items[1].result.is_none());

    let invalid = report.items[2].error.as_deref().unwrap();
    assert!(invalid.starts_with("Invalid input"), "{invalid}");

    assert!(report.items[3].is_ok());
}

#[tokio::test(start_paused = true)]
async fn stalled_item_times_out_and_batch_continues() {
    let slow = Arc::new(MockProvider::new("serper").with_latency(Duration::from_secs(600)));
    let config = DiscoveryConfig {
        provider_timeout: Duration::from_secs(600),
        batch_item_timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let engine = engine(vec![slow], config);

    let report = engine
        .discover_batch(
            businesses(&["Acme Cafe", "Zenith Bakery"]),
            &ProviderCredentials::default(),
            BatchOptions::default(),
        )
        .await;

    assert_eq!(report.failed, 2);
    for item in &report.items {
        assert_eq!(item.error.as_deref(), Some("timed out after 5s"));
        assert!(item.duration_ms >= 5000);
    }
}

#[tokio::test(start_paused = true)]
async fn clear_cache_first_forces_fresh_lookups() {
    let serper = Arc::new(MockProvider::new("serper"));
    let engine = engine(vec![serper.clone()], DiscoveryConfig::default());
    let creds = ProviderCredentials::default();
    let queries = businesses(&["Acme Cafe"]);

    engine.discover_batch(queries.clone(), &creds, BatchOptions::default()).await;
    let calls = serper.call_count();
    assert!(calls > 0);

    // Cached: no new provider calls.
    engine.discover_batch(queries.clone(), &creds, BatchOptions::default()).await;
    assert_eq!(serper.call_count(), calls);

    engine
        .discover_batch(queries, &creds, BatchOptions { clear_cache_first: true })
        .await;
    assert_eq!(serper.call_count(), calls * 2);
}

#[tokio::test(start_paused = true)]
async fn report_serializes_with_summary_fields() {
    let engine = engine(vec![], DiscoveryConfig::default());
    let report = engine
        .discover_batch(
            businesses(&["Acme Cafe", "Zenith Bakery"]),
            &ProviderCredentials::default(),
            BatchOptions::default(),
        )
        .await;

    assert!(report.duration_ms >= 1000);
    assert_eq!(report.avg_per_business_ms, report.duration_ms / 2);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["total"], 2);
    assert_eq!(json["processed"], 2);
    assert!(json["run_id"].is_string());
    assert_eq!(json["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
    let engine = engine(vec![], DiscoveryConfig::default());
    let report = engine
        .discover_batch(vec![], &ProviderCredentials::default(), BatchOptions::default())
        .await;
    assert_eq!(report.total, 0);
    assert_eq!(report.avg_per_business_ms, 0);
    assert!(report.items.is_empty());
}
