//! Chrome DevTools sessions via chromiumoxide

use super::session::{BrowserSession, SessionFactory};
use crate::{HarvestError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Launches a fresh Chrome process per session
pub struct ChromeFactory {
    headless: bool,
    chrome_path: Option<PathBuf>,
}

impl ChromeFactory {
    pub fn new(headless: bool, chrome_path: Option<PathBuf>) -> Self {
        Self {
            headless,
            chrome_path,
        }
    }
}

#[async_trait]
impl SessionFactory for ChromeFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        let mut builder = ChromeConfig::builder()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run");
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(HarvestError::Browser)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| HarvestError::Browser(format!("failed to launch Chrome: {}", e)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(HarvestError::Browser(format!("failed to open tab: {}", e)));
            }
        };

        tracing::debug!("Chrome session started");
        Ok(Box::new(ChromeSession {
            browser,
            page: Some(page),
            handler_task,
        }))
    }
}

pub struct ChromeSession {
    browser: Browser,
    page: Option<Page>,
    handler_task: JoinHandle<()>,
}

impl ChromeSession {
    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| HarvestError::Browser("session already closed".to_string()))
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.page()?
            .goto(url)
            .await
            .map_err(|e| HarvestError::Browser(format!("navigation to {} failed: {}", url, e)))?;
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool> {
        let page = self.page()?;
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }

            match tokio::time::timeout(remaining, page.find_element(selector)).await {
                Ok(Ok(_)) => return Ok(true),
                Ok(Err(_)) => tokio::time::sleep(POLL_INTERVAL.min(remaining)).await,
                Err(_) => return Ok(false),
            }
        }
    }

    async fn content(&mut self) -> Result<String> {
        self.page()?
            .content()
            .await
            .map_err(|e| HarvestError::Browser(format!("failed to read content: {}", e)))
    }

    async fn current_url(&mut self) -> Result<Option<String>> {
        self.page()?
            .url()
            .await
            .map_err(|e| HarvestError::Browser(format!("failed to read page URL: {}", e)))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                tracing::debug!("Tab close failed: {}", e);
            }
        }

        let closed = self
            .browser
            .close()
            .await
            .map_err(|e| HarvestError::Browser(format!("failed to close Chrome: {}", e)));
        if closed.is_ok() {
            let _ = self.browser.wait().await;
        }
        self.handler_task.abort();

        tracing::debug!("Chrome session closed");
        closed.map(|_| ())
    }
}
