use crate::adapters::crawl::middleware::{InboundResponse, Middleware, ResponseAction};

/// Flags responses whose body carries a block-page marker
///
/// Matching is case-insensitive. A match is reported through
/// [`ResponseAction::Blocked`]; this layer never fails the request itself.
#[derive(Debug)]
pub struct AntiBlock {
    indicators: Vec<String>,
}

impl AntiBlock {
    pub fn new(indicators: &[String]) -> Self {
        Self {
            indicators: indicators
                .iter()
                .map(|i| i.trim().to_lowercase())
                .filter(|i| !i.is_empty())
                .collect(),
        }
    }

    /// First indicator found in `body`, if any
    pub fn detect(&self, body: &str) -> Option<&str> {
        let body = body.to_lowercase();
        self.indicators
            .iter()
            .find(|indicator| body.contains(indicator.as_str()))
            .map(String::as_str)
    }
}

impl Middleware for AntiBlock {
    fn name(&self) -> &'static str {
        "anti-block"
    }

    fn process_response(&mut self, response: &InboundResponse) -> ResponseAction {
        match self.detect(&response.body) {
            Some(indicator) => {
                tracing::warn!(
                    url = %response.url,
                    page = response.page,
                    status = response.status,
                    indicator,
                    "Block page detected"
                );
                ResponseAction::Blocked(indicator.to_string())
            }
            None => ResponseAction::Continue,
        }
    }
}
