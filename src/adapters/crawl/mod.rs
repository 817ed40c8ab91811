//! Managed-crawl adapter
//!
//! For targets that push back on plain clients. The crawl engine runs as its
//! own task and drives every request through a [`MiddlewareChain`]:
//!
//! 1. identity rotation picks a fresh client profile per request
//! 2. the adaptive throttle waits, then learns from each response latency
//! 3. anti-block inspects bodies for block-page markers
//! 4. status retry asks for another attempt on configured codes
//!
//! Extracted items flow over a channel to the collector, which is drained once
//! after the engine halts. A detected block stops the engine; whatever was
//! collected before it is still returned.

pub mod antiblock;
pub mod collector;
pub mod middleware;
pub mod throttle;

pub use antiblock::AntiBlock;
pub use collector::CollectorSink;
pub use middleware::{
    IdentityRotation, InboundResponse, Middleware, MiddlewareChain, OutboundRequest,
    RequestFailure, ResponseAction, RetryStatus,
};
pub use throttle::AdaptiveThrottle;

use crate::adapters::extract::{extract_items, CompiledSelectors};
use crate::adapters::fetcher::{build_http_client, fetch_page, FetchResult};
use crate::adapters::{render_url, Adapter, BlockNotice, ScrapeOutcome, ScrapeTarget};
use crate::config::{validate_crawl, CrawlConfig};
use crate::model::RawRecord;
use crate::{HarvestError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

/// Items buffered between the engine and the collector
const COLLECTOR_CAPACITY: usize = 256;

pub struct CrawlAdapter {
    config: Arc<CrawlConfig>,
    selectors: Arc<CompiledSelectors>,
}

impl CrawlAdapter {
    /// Validates `config` and compiles its selectors
    pub fn new(config: CrawlConfig) -> Result<Self> {
        validate_crawl(&config)?;
        let selectors = CompiledSelectors::compile(&config.selectors)?;
        Ok(Self {
            config: Arc::new(config),
            selectors: Arc::new(selectors),
        })
    }
}

#[async_trait]
impl Adapter for CrawlAdapter {
    fn kind(&self) -> &'static str {
        "managed-crawl"
    }

    async fn scrape(&self, target: &ScrapeTarget) -> Result<ScrapeOutcome> {
        let sink = CollectorSink::create(self.config.sink_dir.as_deref())?;
        let (tx, rx) = mpsc::channel(COLLECTOR_CAPACITY);
        let writer = sink.spawn_writer(rx);

        let engine = CrawlEngine {
            config: Arc::clone(&self.config),
            selectors: Arc::clone(&self.selectors),
            target: target.clone(),
        };
        let engine_result = tokio::spawn(engine.run(tx)).await;
        let writer_result = writer.await;

        let blocked = engine_result
            .map_err(|e| HarvestError::Adapter(format!("crawl engine failed: {}", e)))??;
        let written = writer_result
            .map_err(|e| HarvestError::Adapter(format!("collector failed: {}", e)))??;

        let records = sink.drain()?;
        tracing::debug!(
            source = %target.source,
            query = %target.query,
            "Collector drained {} of {} items",
            records.len(),
            written
        );

        Ok(ScrapeOutcome { records, blocked })
    }
}

/// Result of fetching one page through the chain
enum PageFetch {
    Body { final_url: String, body: String },
    Blocked(BlockNotice),
    Abandoned,
}

/// Per-invocation crawl state; owns the middleware chain
struct CrawlEngine {
    config: Arc<CrawlConfig>,
    selectors: Arc<CompiledSelectors>,
    target: ScrapeTarget,
}

impl CrawlEngine {
    /// Crawls every page, sending items to the collector
    ///
    /// Returns the block notice if the target blocked the crawl.
    async fn run(self, items: mpsc::Sender<RawRecord>) -> Result<Option<BlockNotice>> {
        let client = build_http_client(Duration::from_millis(self.config.timeout_ms), None)?;
        let mut chain = MiddlewareChain::standard(&self.config);

        for page in self.config.pages.iter() {
            if self.target.stop.is_stopped() {
                tracing::debug!("Stop requested, skipping page {} onwards", page);
                break;
            }

            let url = render_url(&self.config.url_template, &self.target.query, page);
            let (final_url, body) = match self.fetch_with_retries(&client, &mut chain, &url, page).await {
                PageFetch::Body { final_url, body } => (final_url, body),
                PageFetch::Blocked(notice) => {
                    tracing::warn!(
                        source = %self.target.source,
                        query = %self.target.query,
                        "Crawl stopped on page {}: blocked ({})",
                        notice.page,
                        notice.indicator
                    );
                    return Ok(Some(notice));
                }
                PageFetch::Abandoned => continue,
            };

            for item in self.extract(&final_url, &body, page) {
                items
                    .send(item)
                    .await
                    .map_err(|_| HarvestError::Adapter("collector closed early".to_string()))?;
            }
        }

        Ok(None)
    }

    fn extract(&self, final_url: &str, body: &str, page: u32) -> Vec<RawRecord> {
        let base = match Url::parse(final_url) {
            Ok(base) => base,
            Err(e) => {
                tracing::warn!(url = final_url, "Skipping page {}: {}", page, e);
                return Vec::new();
            }
        };

        let extraction = extract_items(body, &base, &self.selectors, page);
        if extraction.containers == 0 {
            tracing::warn!(url = final_url, "Skipping page {}: no containers matched", page);
        } else {
            tracing::debug!(
                url = final_url,
                "Page {}: {} containers, {} items kept",
                page,
                extraction.containers,
                extraction.items.len()
            );
        }
        extraction.items
    }

    /// Sends one page request, retrying up to `max_retries` extra times
    async fn fetch_with_retries(
        &self,
        client: &Client,
        chain: &mut MiddlewareChain,
        url: &str,
        page: u32,
    ) -> PageFetch {
        let attempts = self.config.max_retries.saturating_add(1);

        for attempt in 0..attempts {
            let mut request = OutboundRequest::new(url, page, attempt);
            chain.process_request(&mut request).await;

            let failure = match fetch_page(client, &request.url, Some(request.headers)).await {
                FetchResult::Success {
                    final_url,
                    status_code,
                    body,
                    latency,
                } => {
                    let response = InboundResponse {
                        url: final_url,
                        page,
                        status: status_code,
                        body,
                        latency,
                    };
                    match chain.process_response(&response) {
                        ResponseAction::Continue if (200..300).contains(&response.status) => {
                            return PageFetch::Body {
                                final_url: response.url,
                                body: response.body,
                            };
                        }
                        ResponseAction::Continue => {
                            tracing::warn!(url, status = response.status, "Abandoning page {}: HTTP {}", page, response.status);
                            return PageFetch::Abandoned;
                        }
                        ResponseAction::Blocked(indicator) => {
                            return PageFetch::Blocked(BlockNotice {
                                url: response.url,
                                indicator,
                                page,
                            });
                        }
                        ResponseAction::Retry(reason) => reason,
                    }
                }
                FetchResult::Timeout { .. } => {
                    chain.process_failure(&RequestFailure {
                        url: request.url.clone(),
                        page,
                        latency: Duration::from_millis(self.config.timeout_ms),
                        timed_out: true,
                    });
                    "timeout".to_string()
                }
                FetchResult::NetworkError { error, latency } => {
                    chain.process_failure(&RequestFailure {
                        url: request.url.clone(),
                        page,
                        latency,
                        timed_out: false,
                    });
                    error
                }
            };

            tracing::debug!(url, "Page {} attempt {}/{} failed: {}", page, attempt + 1, attempts, failure);
        }

        tracing::warn!(url, "Abandoning page {} after {} attempts", page, attempts);
        PageFetch::Abandoned
    }
}
