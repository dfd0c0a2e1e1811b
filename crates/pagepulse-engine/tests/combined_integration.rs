use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};

use pagepulse_core::config::{Config, SiteInfo};
use pagepulse_core::RawEvent;
use pagepulse_engine::AnalyticsEngine;
use pagepulse_store::{EventStore, MemoryStore};

fn site(id: &str) -> SiteInfo {
    SiteInfo {
        site_id: id.to_string(),
        name: format!("Site {id}"),
        domain: format!("{id}.example"),
    }
}

fn event_on(site_id: &str, anon: &str, url: &str, date: NaiveDate) -> RawEvent {
    RawEvent {
        id: uuid::Uuid::new_v4().to_string(),
        site_id: site_id.to_string(),
        event_type: Some("pageview".to_string()),
        anon_id: anon.to_string(),
        url: url.to_string(),
        referrer: None,
        user_agent: "Mozilla/5.0".to_string(),
        timestamp: Some(Utc.from_utc_datetime(&date.and_hms_opt(11, 0, 0).expect("valid time"))),
        country: "PL".to_string(),
        city: None,
    }
}

fn config_with(sites: Vec<SiteInfo>) -> Config {
    Config {
        sites,
        combine_concurrency: 4,
        scheduler_enabled: false,
    }
}

#[tokio::test]
async fn combined_metrics_sum_across_the_roster() {
    let store = Arc::new(MemoryStore::new());
    let today = Utc::now().date_naive();
    store
        .insert_events(&[
            event_on("s1", "a", "/", today),
            event_on("s1", "b", "/docs", today),
            event_on("s2", "c", "/docs", today),
        ])
        .await
        .expect("insert");

    let engine = AnalyticsEngine::new(
        store.clone(),
        store,
        config_with(vec![site("s1"), site("s2")]),
    );
    let combined = engine.get_combined_metrics("7d").await.expect("combined");

    assert_eq!(combined.sites.len(), 2);
    assert_eq!(combined.total_visitors, 3);
    assert_eq!(combined.total_today_visitors, 3);
    // Sites come back in roster order regardless of task completion order.
    assert_eq!(combined.sites[0].site_id, "s1");
    assert_eq!(combined.sites[1].site_id, "s2");
    // "/docs" is key-summed across both sites.
    assert_eq!(combined.top_pages[0].url, "/docs");
    assert_eq!(combined.top_pages[0].count, 2);
    assert!(!combined.daily_visitors.is_empty());
}

#[tokio::test]
async fn empty_roster_combines_to_the_zero_portfolio() {
    let store = Arc::new(MemoryStore::new());
    let engine = AnalyticsEngine::new(store.clone(), store, config_with(Vec::new()));
    let combined = engine.get_combined_metrics("all").await.expect("combined");
    assert!(combined.sites.is_empty());
    assert_eq!(combined.total_visitors, 0);
}

/// Event store whose by-site scan fails for one site.
struct FlakyEventStore {
    inner: Arc<MemoryStore>,
    failing_site: String,
}

#[async_trait::async_trait]
impl EventStore for FlakyEventStore {
    async fn insert_events(&self, events: &[RawEvent]) -> anyhow::Result<()> {
        self.inner.insert_events(events).await
    }

    async fn find_by_site(&self, site_id: &str) -> anyhow::Result<Vec<RawEvent>> {
        if site_id == self.failing_site {
            anyhow::bail!("connection reset");
        }
        self.inner.find_by_site(site_id).await
    }

    async fn find_all(&self) -> anyhow::Result<Vec<RawEvent>> {
        self.inner.find_all().await
    }
}

#[tokio::test]
async fn failing_site_is_omitted_and_the_rest_still_combine() {
    let store = Arc::new(MemoryStore::new());
    let today = Utc::now().date_naive();
    store
        .insert_events(&[
            event_on("up", "a", "/", today),
            event_on("up", "b", "/", today),
            event_on("down", "c", "/", today),
        ])
        .await
        .expect("insert");

    let events = Arc::new(FlakyEventStore {
        inner: store.clone(),
        failing_site: "down".to_string(),
    });
    let engine = AnalyticsEngine::new(
        events,
        store,
        config_with(vec![site("up"), site("down")]),
    );

    let combined = engine.get_combined_metrics("7d").await.expect("combined");
    assert_eq!(combined.sites.len(), 1);
    assert_eq!(combined.sites[0].site_id, "up");
    // Totals reflect only the site that succeeded.
    assert_eq!(combined.total_visitors, 2);
}
