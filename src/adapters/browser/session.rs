//! Browser session seam
//!
//! The adapter drives a browser only through these traits, which keeps the
//! DevTools implementation optional and lets tests script page behavior.

use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

/// One live browser tab
#[async_trait]
pub trait BrowserSession: Send {
    /// Loads `url` in the tab
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Waits up to `timeout` for `selector` to match
    ///
    /// Returns `Ok(false)` on timeout.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool>;

    /// Rendered HTML of the current document
    async fn content(&mut self) -> Result<String>;

    /// URL of the current document after redirects, if the driver knows it
    async fn current_url(&mut self) -> Result<Option<String>> {
        Ok(None)
    }

    /// Releases the tab and the browser behind it
    async fn close(&mut self) -> Result<()>;
}

/// Opens browser sessions
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserSession>>;
}

/// Owns a session for the length of one scrape
///
/// Call [`SessionGuard::release`] on every normal exit. If the guard is
/// dropped while still holding a session, e.g. because the scrape future was
/// cancelled, the session is closed from a spawned task.
pub struct SessionGuard {
    session: Option<Box<dyn BrowserSession>>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn BrowserSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn session(&mut self) -> Option<&mut (dyn BrowserSession + 'static)> {
        self.session.as_deref_mut()
    }

    /// Closes the session now, logging rather than returning close errors
    pub async fn release(mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close().await {
                tracing::warn!("Failed to close browser session: {}", e);
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        tracing::warn!("Failed to close abandoned browser session: {}", e);
                    }
                });
            }
            Err(_) => {
                tracing::warn!("Browser session dropped outside a runtime; not closed");
            }
        }
    }
}
