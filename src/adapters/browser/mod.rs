//! Interactive-browser adapter
//!
//! For storefronts that render results client-side. Each scrape opens one
//! browser session on the first page that needs it, navigates page by page,
//! waits for the results selector and parses the rendered document.

#[cfg(feature = "browser")]
mod chrome;
mod session;

#[cfg(feature = "browser")]
pub use chrome::{ChromeFactory, ChromeSession};
pub use session::{BrowserSession, SessionFactory, SessionGuard};

use crate::adapters::extract::{extract_items, CompiledSelectors};
use crate::adapters::politeness::politeness_delay;
use crate::adapters::{render_url, Adapter, ScrapeOutcome, ScrapeTarget};
use crate::config::{validate_browser, BrowserConfig};
use crate::model::RawRecord;
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

pub struct BrowserAdapter<F> {
    config: BrowserConfig,
    selectors: CompiledSelectors,
    factory: F,
}

impl<F: SessionFactory> BrowserAdapter<F> {
    pub fn new(config: BrowserConfig, factory: F) -> Result<Self> {
        validate_browser(&config)?;
        let selectors = CompiledSelectors::compile(&config.selectors)?;
        Ok(Self {
            config,
            selectors,
            factory,
        })
    }

    /// Navigates, waits and extracts a single page
    ///
    /// Navigation and read failures are logged and yield no items; the
    /// session stays usable for the next page.
    async fn harvest_page(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
        page: u32,
    ) -> Vec<RawRecord> {
        if let Err(e) = session.navigate(url).await {
            tracing::warn!(url, "Skipping page {}: navigation failed: {}", page, e);
            return Vec::new();
        }

        let timeout = Duration::from_millis(self.config.timeout_ms);
        match session.wait_for(&self.config.wait_selector, timeout).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    url,
                    selector = %self.config.wait_selector,
                    "Page {}: results did not render within {}ms",
                    page,
                    self.config.timeout_ms
                );
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(url, "Skipping page {}: wait failed: {}", page, e);
                return Vec::new();
            }
        }

        let html = match session.content().await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(url, "Skipping page {}: could not read document: {}", page, e);
                return Vec::new();
            }
        };

        // Relative links resolve against where the tab landed
        let landed = match session.current_url().await {
            Ok(Some(current)) => current,
            Ok(None) => url.to_string(),
            Err(e) => {
                tracing::debug!(url, "Page {}: current URL unavailable: {}", page, e);
                url.to_string()
            }
        };
        let base = match Url::parse(&landed) {
            Ok(base) => base,
            Err(e) => {
                tracing::warn!(url, "Skipping page {}: bad page URL {}: {}", page, landed, e);
                return Vec::new();
            }
        };

        let extraction = extract_items(&html, &base, &self.selectors, page);
        tracing::debug!(
            url,
            "Page {}: {} containers, {} items kept",
            page,
            extraction.containers,
            extraction.items.len()
        );
        extraction.items
    }
}

#[async_trait]
impl<F: SessionFactory> Adapter for BrowserAdapter<F> {
    fn kind(&self) -> &'static str {
        "browser"
    }

    async fn scrape(&self, target: &ScrapeTarget) -> Result<ScrapeOutcome> {
        let mut guard: Option<SessionGuard> = None;
        let mut records = Vec::new();

        for page in self.config.pages.iter() {
            if target.stop.is_stopped() {
                tracing::debug!("Stop requested, skipping page {} onwards", page);
                break;
            }

            politeness_delay(&self.config.delay).await;

            if guard.is_none() {
                tracing::debug!(source = %target.source, "Opening browser session");
                guard = Some(SessionGuard::new(self.factory.open().await?));
            }
            let Some(session) = guard.as_mut().and_then(SessionGuard::session) else {
                break;
            };

            let url = render_url(&self.config.url_template, &target.query, page);
            records.extend(self.harvest_page(session, &url, page).await);
        }

        if let Some(guard) = guard {
            guard.release().await;
        }

        Ok(ScrapeOutcome::completed(records))
    }
}

/// Builds a browser adapter backed by Chrome
#[cfg(feature = "browser")]
pub fn build_browser_adapter(config: &BrowserConfig) -> Result<Box<dyn Adapter>> {
    let factory = ChromeFactory::new(config.headless, config.chrome_path.clone());
    Ok(Box::new(BrowserAdapter::new(config.clone(), factory)?))
}

/// Without the `browser` feature there is no driver to build against
#[cfg(not(feature = "browser"))]
pub fn build_browser_adapter(_config: &BrowserConfig) -> Result<Box<dyn Adapter>> {
    Err(crate::ConfigError::Unsupported(
        "the browser adapter needs shelf-harvest built with the `browser` feature".to_string(),
    )
    .into())
}
