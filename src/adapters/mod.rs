//! Extraction adapters
//!
//! Three strategies pull raw product listings out of a storefront:
//!
//! - `static`: plain GET and parse, pages spread over a few worker sessions
//! - `browser`: a headless browser that waits for results to render
//! - `managed-crawl`: a middleware-driven crawl with identity rotation,
//!   adaptive throttling, retries and block detection
//!
//! All three implement [`Adapter`]; the orchestrator only ever sees the trait.

pub mod browser;
pub mod crawl;
pub mod extract;
pub mod fetcher;
pub mod identity;
pub mod politeness;
pub mod static_doc;

pub use browser::BrowserAdapter;
pub use crawl::CrawlAdapter;
pub use static_doc::StaticAdapter;

use crate::config::{validate_adapter, AdapterConfig};
use crate::model::RawRecord;
use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between the caller and running adapters
///
/// Adapters check it between pages; the orchestrator checks it before
/// dispatching each queued request.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a single adapter invocation should harvest
#[derive(Debug, Clone)]
pub struct ScrapeTarget {
    /// Source label, used in log fields
    pub source: String,
    /// Search term substituted into `{query}`
    pub query: String,
    pub stop: StopHandle,
}

impl ScrapeTarget {
    pub fn new(source: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            query: query.into(),
            stop: StopHandle::new(),
        }
    }

    pub fn with_stop(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }
}

/// The target answered with a block page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockNotice {
    pub url: String,
    /// The indicator that matched
    pub indicator: String,
    pub page: u32,
}

/// Result of one adapter invocation
#[derive(Debug, Default)]
pub struct ScrapeOutcome {
    pub records: Vec<RawRecord>,
    /// Set when the run was cut short by a block; `records` holds what was
    /// collected before it
    pub blocked: Option<BlockNotice>,
}

impl ScrapeOutcome {
    pub fn completed(records: Vec<RawRecord>) -> Self {
        Self {
            records,
            blocked: None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked.is_some()
    }
}

/// A strategy for turning a search query into raw records
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Short strategy name for logs
    fn kind(&self) -> &'static str;

    /// Harvests every configured page for `target.query`
    ///
    /// Page-level network failures are absorbed; an `Err` means the whole
    /// invocation is unusable.
    async fn scrape(&self, target: &ScrapeTarget) -> Result<ScrapeOutcome>;
}

/// Builds the adapter described by `config`
///
/// The config is validated first, so a bad selector or page window is
/// reported before any network activity.
pub fn build_adapter(config: &AdapterConfig) -> Result<Box<dyn Adapter>> {
    validate_adapter(config)?;

    let adapter: Box<dyn Adapter> = match config {
        AdapterConfig::Static(c) => Box::new(StaticAdapter::new(c.clone())?),
        AdapterConfig::Browser(c) => browser::build_browser_adapter(c)?,
        AdapterConfig::ManagedCrawl(c) => Box::new(CrawlAdapter::new(c.clone())?),
    };
    Ok(adapter)
}

/// Fills a URL template's `{query}` and `{page}` placeholders
///
/// The query is form-encoded, so spaces become `+`.
///
/// # Example
///
/// ```
/// use shelf_harvest::adapters::render_url;
///
/// let url = render_url("https://shop.example/s?k={query}&page={page}", "usb hub", 2);
/// assert_eq!(url, "https://shop.example/s?k=usb+hub&page=2");
/// ```
pub fn render_url(template: &str, query: &str, page: u32) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    template
        .replace("{query}", &encoded)
        .replace("{page}", &page.to_string())
}
