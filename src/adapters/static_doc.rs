//! Static-document adapter
//!
//! Fetches each listing page with a plain GET and parses it in place. Pages
//! are dealt round-robin to a small set of workers; each worker owns its own
//! HTTP client and client profile, so the target sees independent sessions.

use crate::adapters::extract::{extract_items, CompiledSelectors};
use crate::adapters::fetcher::{build_http_client, fetch_page, FetchResult};
use crate::adapters::identity::ClientProfile;
use crate::adapters::politeness::politeness_delay;
use crate::adapters::{render_url, Adapter, ScrapeOutcome, ScrapeTarget};
use crate::config::{validate_static, StaticConfig};
use crate::model::RawRecord;
use crate::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use url::Url;

pub struct StaticAdapter {
    config: Arc<StaticConfig>,
    selectors: Arc<CompiledSelectors>,
}

impl StaticAdapter {
    /// Validates `config` and compiles its selectors
    pub fn new(config: StaticConfig) -> Result<Self> {
        validate_static(&config)?;
        let selectors = CompiledSelectors::compile(&config.selectors)?;
        Ok(Self {
            config: Arc::new(config),
            selectors: Arc::new(selectors),
        })
    }
}

#[async_trait]
impl Adapter for StaticAdapter {
    fn kind(&self) -> &'static str {
        "static"
    }

    async fn scrape(&self, target: &ScrapeTarget) -> Result<ScrapeOutcome> {
        let pages: Vec<u32> = self.config.pages.iter().collect();
        let worker_count = self.config.workers.clamp(1, pages.len().max(1));

        let mut assignments: Vec<Vec<u32>> = vec![Vec::new(); worker_count];
        for (i, page) in pages.into_iter().enumerate() {
            assignments[i % worker_count].push(page);
        }

        tracing::debug!(
            source = %target.source,
            query = %target.query,
            "Static harvest over {} pages with {} workers",
            self.config.pages.max_pages,
            worker_count
        );

        let handles: Vec<_> = assignments
            .into_iter()
            .filter(|pages| !pages.is_empty())
            .map(|pages| {
                let config = Arc::clone(&self.config);
                let selectors = Arc::clone(&self.selectors);
                let target = target.clone();
                tokio::spawn(async move { run_worker(config, selectors, target, pages).await })
            })
            .collect();

        let records = merge_worker_pages(join_all(handles).await)?;
        Ok(ScrapeOutcome::completed(records))
    }
}

type WorkerPages = Vec<(u32, Vec<RawRecord>)>;

/// Orders the pages of every worker that finished
///
/// A panicked worker loses only its own pages. A worker error, such as a
/// client that could not be built, fails the whole scrape.
fn merge_worker_pages(
    joined: Vec<std::result::Result<Result<WorkerPages>, JoinError>>,
) -> Result<Vec<RawRecord>> {
    let mut harvested: WorkerPages = Vec::new();
    for outcome in joined {
        match outcome {
            Ok(pages) => harvested.extend(pages?),
            Err(e) => tracing::error!("Page worker died, its pages are lost: {}", e),
        }
    }

    harvested.sort_by_key(|(page, _)| *page);
    Ok(harvested.into_iter().flat_map(|(_, items)| items).collect())
}

/// Fetches the assigned pages in order over one session
async fn run_worker(
    config: Arc<StaticConfig>,
    selectors: Arc<CompiledSelectors>,
    target: ScrapeTarget,
    pages: Vec<u32>,
) -> Result<WorkerPages> {
    let profile = ClientProfile::random();
    let client = build_http_client(Duration::from_millis(config.timeout_ms), Some(profile))?;

    let mut results = Vec::with_capacity(pages.len());
    for page in pages {
        if target.stop.is_stopped() {
            tracing::debug!("Stop requested, skipping page {} onwards", page);
            break;
        }

        politeness_delay(&config.delay).await;

        let url = render_url(&config.url_template, &target.query, page);
        if let Some(items) = harvest_page(&client, &url, &selectors, page).await {
            results.push((page, items));
        }
    }

    Ok(results)
}

/// Fetches and parses one page; `None` means the page was skipped
async fn harvest_page(
    client: &reqwest::Client,
    url: &str,
    selectors: &CompiledSelectors,
    page: u32,
) -> Option<Vec<RawRecord>> {
    let (final_url, body) = match fetch_page(client, url, None).await {
        FetchResult::Success {
            final_url,
            status_code,
            body,
            ..
        } => {
            if !(200..300).contains(&status_code) {
                tracing::warn!(url, status = status_code, "Skipping page {}: HTTP {}", page, status_code);
                return None;
            }
            (final_url, body)
        }
        FetchResult::Timeout { .. } => {
            tracing::warn!(url, "Skipping page {}: request timed out", page);
            return None;
        }
        FetchResult::NetworkError { error, .. } => {
            tracing::warn!(url, "Skipping page {}: {}", page, error);
            return None;
        }
    };

    let base = match Url::parse(&final_url) {
        Ok(base) => base,
        Err(e) => {
            tracing::warn!(url, "Skipping page {}: bad final URL: {}", page, e);
            return None;
        }
    };

    let extraction = extract_items(&body, &base, selectors, page);
    if extraction.containers == 0 {
        tracing::warn!(url, "Skipping page {}: no containers matched", page);
        return None;
    }

    tracing::debug!(
        url,
        "Page {}: {} containers, {} items kept",
        page,
        extraction.containers,
        extraction.items.len()
    );
    Some(extraction.items)
}
