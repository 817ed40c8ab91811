use async_trait::async_trait;
use shelf_harvest::adapters::browser::{BrowserAdapter, BrowserSession, SessionFactory};
use shelf_harvest::config::{
    AdapterConfig, BrowserConfig, CrawlConfig, DelayRange, PageRange, SelectorMap, StaticConfig,
    ThrottleConfig,
};
use shelf_harvest::storage::{RecordFilter, SqliteStorage, Storage};
use shelf_harvest::{Adapter, HarvestRequest, JobStatus, Orchestrator};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Opens a fresh on-disk store inside `dir`
fn open_store(dir: &TempDir) -> SqliteStorage {
    SqliteStorage::new(&dir.path().join("harvest.db")).expect("Failed to open store")
}

fn selectors() -> SelectorMap {
    SelectorMap {
        container: "div.product".into(),
        name: "h2 a".into(),
        price: "span.price".into(),
        link: "h2 a".into(),
        image: "img".into(),
        availability: "p.stock".into(),
        condition: Default::default(),
    }
}

/// A listing page with `count` products; `unlinked` of them carry no href
fn listing(prefix: &str, count: usize, unlinked: usize) -> String {
    let items: String = (0..count)
        .map(|i| {
            if i < unlinked {
                format!(
                    r#"<div class="product"><h2><a>{prefix} item {i}</a></h2><span class="price">$4.99</span></div>"#
                )
            } else {
                format!(
                    r#"<div class="product">
                         <h2><a href="/p/{prefix}-{i}">{prefix} item {i}</a></h2>
                         <img src="/img/{prefix}-{i}.jpg">
                         <span class="price">$1,2{i}0.50</span>
                         <p class="stock">In stock</p>
                       </div>"#
                )
            }
        })
        .collect();
    format!("<html><body>{}</body></html>", items)
}

fn static_config(server: &MockServer, max_pages: u32) -> StaticConfig {
    StaticConfig {
        url_template: format!("{}/search?q={{query}}&page={{page}}", server.uri()),
        pages: PageRange {
            start_page: 1,
            max_pages,
        },
        selectors: selectors(),
        delay: DelayRange::NONE,
        timeout_ms: 2000,
        workers: 2,
    }
}

async fn mount_listing(server: &MockServer, query: &str, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", query))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_static_harvest_drops_unlinked_items() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_listing(&server, "lamp", 1, listing("lamp", 20, 2)).await;

    let config = AdapterConfig::Static(static_config(&server, 1));
    let mut orchestrator = Orchestrator::new(open_store(&dir), 2);
    let summary = orchestrator
        .run(vec![HarvestRequest::new("shop", "lamp", config)])
        .await
        .unwrap();

    assert_eq!(summary.total_persisted, 18);
    assert_eq!(summary.succeeded.len(), 1);

    let records = orchestrator.storage().query_records(None).unwrap();
    assert_eq!(records.len(), 18);
    let expected_link = format!("{}/p/lamp-2", server.uri());
    let first = records
        .iter()
        .find(|r| r.link.as_deref() == Some(expected_link.as_str()))
        .expect("lamp-2 should be stored");
    assert_eq!(first.price_numeric, Some(1220.5));
    assert_eq!(first.currency.as_deref(), Some("USD"));
    assert_eq!(first.source, "shop");
    assert_eq!(first.search_term, "lamp");
    assert_eq!(
        first.image.as_deref(),
        Some(format!("{}/img/lamp-2.jpg", server.uri()).as_str())
    );
}

#[tokio::test]
async fn test_repeated_run_inserts_nothing_new() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_listing(&server, "mug", 1, listing("mug", 5, 0)).await;

    let config = AdapterConfig::Static(static_config(&server, 1));
    let mut orchestrator = Orchestrator::new(open_store(&dir), 1);

    let first = orchestrator
        .run(vec![HarvestRequest::new("shop", "mug", config.clone())])
        .await
        .unwrap();
    let second = orchestrator
        .run(vec![HarvestRequest::new("shop", "mug", config)])
        .await
        .unwrap();

    assert_eq!(first.total_persisted, 5);
    assert_eq!(second.total_persisted, 0);
    assert_eq!(second.succeeded[0].extracted, 5);
    assert_eq!(orchestrator.storage().count_records().unwrap(), 5);

    // stored rows still point at the first job
    let records = orchestrator.storage().query_records(None).unwrap();
    assert!(records
        .iter()
        .all(|r| r.job_id == Some(first.succeeded[0].job_id)));
}

/// A browser whose results never render
struct NeverRenders {
    closed: Arc<AtomicUsize>,
}

struct BlankSession {
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserSession for BlankSession {
    async fn navigate(&mut self, _url: &str) -> shelf_harvest::Result<()> {
        Ok(())
    }

    async fn wait_for(&mut self, _selector: &str, timeout: Duration) -> shelf_harvest::Result<bool> {
        tokio::time::sleep(timeout).await;
        Ok(false)
    }

    async fn content(&mut self) -> shelf_harvest::Result<String> {
        Ok(String::new())
    }

    async fn close(&mut self) -> shelf_harvest::Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl SessionFactory for NeverRenders {
    async fn open(&self) -> shelf_harvest::Result<Box<dyn BrowserSession>> {
        Ok(Box::new(BlankSession {
            closed: Arc::clone(&self.closed),
        }))
    }
}

#[tokio::test]
async fn test_browser_wait_timeout_completes_empty() {
    let dir = TempDir::new().unwrap();
    let closed = Arc::new(AtomicUsize::new(0));

    let config = BrowserConfig {
        url_template: "https://spa.example/search?q={query}&p={page}".to_string(),
        pages: PageRange {
            start_page: 1,
            max_pages: 2,
        },
        wait_selector: "div.product".to_string(),
        selectors: selectors(),
        delay: DelayRange::NONE,
        timeout_ms: 50,
        headless: true,
        chrome_path: None,
    };
    let adapter: Arc<dyn Adapter> = Arc::new(
        BrowserAdapter::new(
            config,
            NeverRenders {
                closed: Arc::clone(&closed),
            },
        )
        .unwrap(),
    );

    let mut orchestrator = Orchestrator::new(open_store(&dir), 1);
    let summary = orchestrator
        .run(vec![HarvestRequest::with_adapter("spa", "desk lamp", adapter)])
        .await
        .unwrap();

    assert!(summary.is_clean());
    assert_eq!(summary.succeeded[0].extracted, 0);

    let job = orchestrator
        .storage()
        .get_job(summary.succeeded[0].job_id)
        .unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_crawl_block_fails_job_but_keeps_records() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let sink = TempDir::new().unwrap();
    mount_listing(&server, "hub", 1, listing("hub", 6, 0)).await;
    mount_listing(
        &server,
        "hub",
        2,
        "<html><body>Enter the characters you see below (captcha)</body></html>".to_string(),
    )
    .await;
    mount_listing(&server, "hub", 3, listing("late", 6, 0)).await;

    let config = AdapterConfig::ManagedCrawl(CrawlConfig {
        url_template: format!("{}/search?q={{query}}&page={{page}}", server.uri()),
        pages: PageRange {
            start_page: 1,
            max_pages: 3,
        },
        selectors: selectors(),
        delay: DelayRange::NONE,
        throttle: ThrottleConfig {
            start_delay_ms: 0,
            min_delay_ms: 0,
            max_delay_ms: 20,
            target_concurrency: 1.0,
        },
        timeout_ms: 2000,
        max_retries: 1,
        retry_statuses: vec![503],
        block_indicators: vec!["captcha".to_string()],
        sink_dir: Some(sink.path().to_path_buf()),
    });

    let mut orchestrator = Orchestrator::new(open_store(&dir), 1);
    let summary = orchestrator
        .run(vec![HarvestRequest::new("shop", "hub", config)])
        .await
        .unwrap();

    assert_eq!(summary.failed.len(), 1);
    let failure = &summary.failed[0];
    assert_eq!(failure.reason, "blocked");
    assert_eq!(failure.persisted, 6);

    let job = orchestrator.storage().get_job(failure.job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure_reason.as_deref(), Some("blocked"));

    let records = orchestrator.storage().query_records(None).unwrap();
    assert_eq!(records.len(), 6);
    assert!(records.iter().all(|r| r.name.starts_with("hub item")));

    // page 3 is never requested after the block
    let requested: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.query().unwrap_or_default().to_string())
        .collect();
    assert!(!requested.iter().any(|q| q.contains("page=3")));
    assert!(std::fs::read_dir(sink.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_parallel_queries_do_not_mix() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    for page in 1..=2 {
        mount_listing(&server, "kettle", page, listing(&format!("kettle{}", page), 4, 0)).await;
        mount_listing(&server, "teapot", page, listing(&format!("teapot{}", page), 3, 0)).await;
    }

    let config = AdapterConfig::Static(static_config(&server, 2));
    let requests = HarvestRequest::for_queries("shop", ["kettle", "teapot"], &config);

    let mut orchestrator = Orchestrator::new(open_store(&dir), 3);
    let summary = orchestrator.run(requests).await.unwrap();

    assert!(summary.is_clean());
    assert_eq!(summary.per_query["kettle"], 8);
    assert_eq!(summary.per_query["teapot"], 6);
    assert_eq!(summary.per_source["shop"], 14);

    let store = orchestrator.storage();
    let kettles = store
        .query_records(Some(&RecordFilter::search_term("kettle")))
        .unwrap();
    assert_eq!(kettles.len(), 8);
    assert!(kettles.iter().all(|r| r.name.starts_with("kettle")));

    let teapots = store
        .query_records(Some(&RecordFilter::search_term("teapot").with_source("shop")))
        .unwrap();
    assert_eq!(teapots.len(), 6);
    assert!(teapots.iter().all(|r| r.name.starts_with("teapot")));

    let counts = store.record_counts_by_query().unwrap();
    assert_eq!(counts["kettle"], 8);
    assert_eq!(counts["teapot"], 6);
}

#[tokio::test]
async fn test_bad_selector_fails_before_any_request() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_listing(&server, "lamp", 1, listing("lamp", 3, 0)).await;

    let mut config = static_config(&server, 1);
    config.selectors.price = "span[[price".into();

    let mut orchestrator = Orchestrator::new(open_store(&dir), 1);
    let summary = orchestrator
        .run(vec![HarvestRequest::new(
            "shop",
            "lamp",
            AdapterConfig::Static(config),
        )])
        .await
        .unwrap();

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].reason, "configuration-error");
    assert!(server.received_requests().await.unwrap().is_empty());

    let job = orchestrator
        .storage()
        .get_job(summary.failed[0].job_id)
        .unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.started_at.is_none());
}
