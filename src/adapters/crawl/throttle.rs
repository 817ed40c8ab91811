//! Latency-driven auto-throttle
//!
//! The delay tracks `latency / target_concurrency`: it moves halfway toward
//! that target on each response, never drops below it, and error responses
//! can only widen it. A timed-out request counts as a failed response that
//! took the whole timeout.

use crate::adapters::crawl::middleware::{
    InboundResponse, Middleware, OutboundRequest, RequestFailure, ResponseAction,
};
use crate::adapters::politeness::sample_delay;
use crate::config::{DelayRange, ThrottleConfig};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug)]
pub struct AdaptiveThrottle {
    delay: Duration,
    min_delay: Duration,
    max_delay: Duration,
    target_concurrency: f64,
    politeness: DelayRange,
}

impl AdaptiveThrottle {
    pub fn new(config: &ThrottleConfig, politeness: DelayRange) -> Self {
        let min_delay = Duration::from_millis(config.min_delay_ms);
        // inverted bounds collapse to the minimum
        let max_delay = Duration::from_millis(config.max_delay_ms).max(min_delay);
        Self {
            delay: Duration::from_millis(config.start_delay_ms).clamp(min_delay, max_delay),
            min_delay,
            max_delay,
            target_concurrency: config.target_concurrency,
            politeness,
        }
    }

    pub fn current_delay(&self) -> Duration {
        self.delay
    }

    /// Folds one response latency into the delay
    pub fn observe(&mut self, latency: Duration, status: u16) {
        let target_nanos = (latency.as_nanos() as f64 / self.target_concurrency).round();
        let target = Duration::from_nanos(target_nanos.min(u64::MAX as f64) as u64);
        let averaged = (self.delay + target) / 2;
        let mut next = averaged.max(target);

        if status != 200 && next < self.delay {
            next = self.delay;
        }

        self.delay = next.clamp(self.min_delay, self.max_delay);
    }

    /// Wait applied before the next request: the throttle delay or a
    /// politeness draw, whichever is longer
    pub fn next_wait(&self) -> Duration {
        self.delay.max(sample_delay(&self.politeness))
    }
}

#[async_trait]
impl Middleware for AdaptiveThrottle {
    fn name(&self) -> &'static str {
        "adaptive-throttle"
    }

    async fn process_request(&mut self, request: &mut OutboundRequest) {
        let wait = self.next_wait();
        if !wait.is_zero() {
            tracing::trace!(url = %request.url, "Throttle wait {}ms", wait.as_millis());
            tokio::time::sleep(wait).await;
        }
    }

    fn process_response(&mut self, response: &InboundResponse) -> ResponseAction {
        self.observe_logged(response.latency, response.status);
        ResponseAction::Continue
    }

    fn process_failure(&mut self, failure: &RequestFailure) {
        if failure.timed_out {
            self.observe_logged(failure.latency, 0);
        }
    }
}

impl AdaptiveThrottle {
    fn observe_logged(&mut self, latency: Duration, status: u16) {
        let before = self.delay;
        self.observe(latency, status);
        if self.delay != before {
            tracing::debug!(
                status,
                latency_ms = latency.as_millis() as u64,
                "Throttle delay {}ms -> {}ms",
                before.as_millis(),
                self.delay.as_millis()
            );
        }
    }
}
