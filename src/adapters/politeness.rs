use crate::config::DelayRange;
use rand::Rng;
use std::time::Duration;

/// Draws a delay uniformly from `[min_ms, max_ms]`
pub fn sample_delay(range: &DelayRange) -> Duration {
    if range.max_ms <= range.min_ms {
        return Duration::from_millis(range.min_ms);
    }
    let ms = rand::thread_rng().gen_range(range.min_ms..=range.max_ms);
    Duration::from_millis(ms)
}

/// Sleeps for a randomized politeness delay before a request
pub async fn politeness_delay(range: &DelayRange) {
    let delay = sample_delay(range);
    if !delay.is_zero() {
        tracing::trace!("Politeness delay {}ms", delay.as_millis());
        tokio::time::sleep(delay).await;
    }
}
