//! Request/response middleware for the managed crawl
//!
//! Every outbound request passes through each middleware in order before it
//! is sent, and every response is offered to each middleware after it
//! arrives. The standard chain is identity rotation, adaptive throttle,
//! block detection, then status retry.

use crate::adapters::crawl::antiblock::AntiBlock;
use crate::adapters::crawl::throttle::AdaptiveThrottle;
use crate::adapters::identity::ClientProfile;
use crate::config::CrawlConfig;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::time::Duration;

/// A page request about to be sent
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: String,
    pub page: u32,
    /// Zero for the first try
    pub attempt: u32,
    pub headers: HeaderMap,
}

impl OutboundRequest {
    pub fn new(url: impl Into<String>, page: u32, attempt: u32) -> Self {
        Self {
            url: url.into(),
            page,
            attempt,
            headers: HeaderMap::new(),
        }
    }
}

/// A response body received for a page request
#[derive(Debug, Clone)]
pub struct InboundResponse {
    /// Final URL after redirects
    pub url: String,
    pub page: u32,
    pub status: u16,
    pub body: String,
    pub latency: Duration,
}

/// A page request that produced no response
#[derive(Debug, Clone)]
pub struct RequestFailure {
    pub url: String,
    pub page: u32,
    /// Time spent before giving up; the full timeout when `timed_out`
    pub latency: Duration,
    pub timed_out: bool,
}

/// What the chain wants done with a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseAction {
    Continue,
    /// Try the page again, if attempts remain
    Retry(String),
    /// The target served a block page; carries the matched indicator
    Blocked(String),
}

#[async_trait]
pub trait Middleware: Send {
    fn name(&self) -> &'static str;

    async fn process_request(&mut self, _request: &mut OutboundRequest) {}

    fn process_response(&mut self, _response: &InboundResponse) -> ResponseAction {
        ResponseAction::Continue
    }

    /// Sees timeouts and network errors; these are always retried
    fn process_failure(&mut self, _failure: &RequestFailure) {}
}

/// Rotates the client profile on every request
#[derive(Debug, Default)]
pub struct IdentityRotation;

#[async_trait]
impl Middleware for IdentityRotation {
    fn name(&self) -> &'static str {
        "identity-rotation"
    }

    async fn process_request(&mut self, request: &mut OutboundRequest) {
        let profile = ClientProfile::random();
        tracing::trace!(url = %request.url, "Using profile {}", profile.user_agent);
        request.headers.extend(profile.headers());
    }
}

/// Asks for a retry on configured status codes
#[derive(Debug)]
pub struct RetryStatus {
    statuses: Vec<u16>,
}

impl RetryStatus {
    pub fn new(statuses: Vec<u16>) -> Self {
        Self { statuses }
    }
}

impl Middleware for RetryStatus {
    fn name(&self) -> &'static str {
        "retry-status"
    }

    fn process_response(&mut self, response: &InboundResponse) -> ResponseAction {
        if self.statuses.contains(&response.status) {
            ResponseAction::Retry(format!("HTTP {}", response.status))
        } else {
            ResponseAction::Continue
        }
    }
}

/// Ordered middleware stack
#[derive(Default)]
pub struct MiddlewareChain {
    layers: Vec<Box<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stack used by the crawl adapter
    pub fn standard(config: &CrawlConfig) -> Self {
        Self::new()
            .with(IdentityRotation)
            .with(AdaptiveThrottle::new(&config.throttle, config.delay))
            .with(AntiBlock::new(&config.block_indicators))
            .with(RetryStatus::new(config.retry_statuses.clone()))
    }

    pub fn with<M: Middleware + 'static>(mut self, layer: M) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub async fn process_request(&mut self, request: &mut OutboundRequest) {
        for layer in self.layers.iter_mut() {
            layer.process_request(request).await;
        }
    }

    pub fn process_failure(&mut self, failure: &RequestFailure) {
        for layer in self.layers.iter_mut() {
            layer.process_failure(failure);
        }
    }

    /// Offers the response to every layer; the first non-`Continue` wins
    pub fn process_response(&mut self, response: &InboundResponse) -> ResponseAction {
        let mut action = ResponseAction::Continue;
        for layer in self.layers.iter_mut() {
            let verdict = layer.process_response(response);
            if action == ResponseAction::Continue && verdict != ResponseAction::Continue {
                tracing::trace!("{} -> {:?}", layer.name(), verdict);
                action = verdict;
            }
        }
        action
    }
}
