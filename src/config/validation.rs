use crate::adapters::render_url;
use crate::config::types::{
    AdapterConfig, BrowserConfig, Config, CrawlConfig, DelayRange, HarvestSettings, PageRange,
    SelectorChain, SelectorMap, SourceConfig, StaticConfig, ThrottleConfig,
};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_settings(&config.harvest)?;

    if config.sources.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[source]] is required".to_string(),
        ));
    }

    for source in &config.sources {
        validate_source(source)?;
    }
    Ok(())
}

/// Validates run-wide settings
fn validate_settings(settings: &HarvestSettings) -> Result<(), ConfigError> {
    if settings.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if settings.max_workers < 1 || settings.max_workers > 64 {
        return Err(ConfigError::Validation(format!(
            "max_workers must be between 1 and 64, got {}",
            settings.max_workers
        )));
    }

    Ok(())
}

/// Validates a source entry and its adapter
fn validate_source(source: &SourceConfig) -> Result<(), ConfigError> {
    if source.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "source name cannot be empty".to_string(),
        ));
    }

    if source.queries.is_empty() || source.queries.iter().any(|q| q.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "source '{}' needs at least one non-empty query",
            source.name
        )));
    }

    validate_adapter(&source.adapter)
}

/// Validates a single adapter configuration
///
/// Runs before any network activity, so a bad selector or page window fails
/// the job without touching the target.
pub fn validate_adapter(adapter: &AdapterConfig) -> Result<(), ConfigError> {
    match adapter {
        AdapterConfig::Static(config) => validate_static(config),
        AdapterConfig::Browser(config) => validate_browser(config),
        AdapterConfig::ManagedCrawl(config) => validate_crawl(config),
    }
}

pub fn validate_static(config: &StaticConfig) -> Result<(), ConfigError> {
    validate_common(
        &config.url_template,
        &config.pages,
        &config.delay,
        &config.selectors,
    )?;
    validate_timeout(config.timeout_ms)?;
    if config.workers < 1 {
        return Err(ConfigError::Validation(
            "static adapter needs at least one worker".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_browser(config: &BrowserConfig) -> Result<(), ConfigError> {
    validate_common(
        &config.url_template,
        &config.pages,
        &config.delay,
        &config.selectors,
    )?;
    validate_timeout(config.timeout_ms)?;
    if config.wait_selector.trim().is_empty() {
        return Err(ConfigError::MissingSelector("wait-selector".to_string()));
    }
    validate_selector(&config.wait_selector)
}

pub fn validate_crawl(config: &CrawlConfig) -> Result<(), ConfigError> {
    validate_common(
        &config.url_template,
        &config.pages,
        &config.delay,
        &config.selectors,
    )?;
    validate_timeout(config.timeout_ms)?;
    validate_throttle(&config.throttle)?;
    if config.block_indicators.iter().any(|i| i.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "block indicators cannot be empty strings".to_string(),
        ));
    }
    Ok(())
}

fn validate_common(
    template: &str,
    pages: &PageRange,
    delay: &DelayRange,
    selectors: &SelectorMap,
) -> Result<(), ConfigError> {
    validate_url_template(template)?;
    validate_page_range(pages)?;
    validate_delay(delay)?;
    validate_selector_map(selectors)
}

fn validate_url_template(template: &str) -> Result<(), ConfigError> {
    if template.trim().is_empty() {
        return Err(ConfigError::Validation(
            "url-template cannot be empty".to_string(),
        ));
    }

    let sample = render_url(template, "sample", 1);
    let url = Url::parse(&sample)
        .map_err(|e| ConfigError::Validation(format!("Invalid url-template '{}': {}", template, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "url-template '{}' must use http or https",
            template
        )));
    }

    Ok(())
}

fn validate_page_range(pages: &PageRange) -> Result<(), ConfigError> {
    if pages.max_pages < 1 {
        return Err(ConfigError::InvalidPageRange(format!(
            "max-pages must be >= 1, got {}",
            pages.max_pages
        )));
    }

    if pages.start_page.checked_add(pages.max_pages).is_none() {
        return Err(ConfigError::InvalidPageRange(format!(
            "start-page {} + max-pages {} overflows",
            pages.start_page, pages.max_pages
        )));
    }

    Ok(())
}

fn validate_delay(delay: &DelayRange) -> Result<(), ConfigError> {
    if delay.min_ms > delay.max_ms {
        return Err(ConfigError::Validation(format!(
            "delay min-ms ({}) must not exceed max-ms ({})",
            delay.min_ms, delay.max_ms
        )));
    }
    Ok(())
}

fn validate_timeout(timeout_ms: u64) -> Result<(), ConfigError> {
    if timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "timeout-ms must be > 0".to_string(),
        ));
    }
    Ok(())
}

fn validate_throttle(throttle: &ThrottleConfig) -> Result<(), ConfigError> {
    if throttle.min_delay_ms > throttle.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "throttle min-delay-ms ({}) must not exceed max-delay-ms ({})",
            throttle.min_delay_ms, throttle.max_delay_ms
        )));
    }

    if throttle.target_concurrency.is_nan() || throttle.target_concurrency <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "throttle target-concurrency must be > 0, got {}",
            throttle.target_concurrency
        )));
    }

    Ok(())
}

/// Container, name and link are required; every listed selector must parse
fn validate_selector_map(selectors: &SelectorMap) -> Result<(), ConfigError> {
    for (field, chain) in [
        ("container", &selectors.container),
        ("name", &selectors.name),
        ("link", &selectors.link),
    ] {
        if chain.is_empty() {
            return Err(ConfigError::MissingSelector(field.to_string()));
        }
    }

    for (_, chain) in selectors.fields() {
        validate_chain(chain)?;
    }

    Ok(())
}

fn validate_chain(chain: &SelectorChain) -> Result<(), ConfigError> {
    for selector in chain.iter() {
        validate_selector(selector)?;
    }
    Ok(())
}

fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector {
            selector: selector.to_string(),
            message: format!("{:?}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selectors() -> SelectorMap {
        SelectorMap {
            container: "article.product_pod".into(),
            name: "h3 a".into(),
            price: "p.price_color".into(),
            link: "h3 a".into(),
            image: "img".into(),
            availability: "p.availability".into(),
            condition: SelectorChain::default(),
        }
    }

    fn static_adapter() -> StaticConfig {
        StaticConfig {
            url_template: "https://books.example/catalogue/page-{page}.html".to_string(),
            pages: PageRange {
                start_page: 1,
                max_pages: 5,
            },
            selectors: selectors(),
            delay: DelayRange::NONE,
            timeout_ms: 1000,
            workers: 2,
        }
    }

    #[test]
    fn test_valid_static_adapter() {
        assert!(validate_adapter(&AdapterConfig::Static(static_adapter())).is_ok());
    }

    #[test]
    fn test_missing_container_selector() {
        let mut config = static_adapter();
        config.selectors.container = SelectorChain::default();

        let result = validate_adapter(&AdapterConfig::Static(config));
        assert!(matches!(result, Err(ConfigError::MissingSelector(f)) if f == "container"));
    }

    #[test]
    fn test_missing_link_selector() {
        let mut config = static_adapter();
        config.selectors.link = SelectorChain::new(["  "]);

        let result = validate_adapter(&AdapterConfig::Static(config));
        assert!(matches!(result, Err(ConfigError::MissingSelector(f)) if f == "link"));
    }

    #[test]
    fn test_invalid_css_selector() {
        let mut config = static_adapter();
        config.selectors.price = SelectorChain::new(["p.price", "div[[broken"]);

        let result = validate_adapter(&AdapterConfig::Static(config));
        assert!(matches!(result, Err(ConfigError::InvalidSelector { .. })));
    }

    #[test]
    fn test_zero_pages() {
        let mut config = static_adapter();
        config.pages.max_pages = 0;

        let result = validate_adapter(&AdapterConfig::Static(config));
        assert!(matches!(result, Err(ConfigError::InvalidPageRange(_))));
    }

    #[test]
    fn test_inverted_delay() {
        let mut config = static_adapter();
        config.delay = DelayRange {
            min_ms: 500,
            max_ms: 100,
        };

        assert!(validate_adapter(&AdapterConfig::Static(config)).is_err());
    }

    #[test]
    fn test_bad_url_template() {
        let mut config = static_adapter();
        config.url_template = "books.example/{page}".to_string();
        assert!(validate_adapter(&AdapterConfig::Static(config)).is_err());

        let mut config = static_adapter();
        config.url_template = "ftp://books.example/{page}".to_string();
        assert!(validate_adapter(&AdapterConfig::Static(config)).is_err());
    }

    #[test]
    fn test_crawl_throttle_bounds() {
        let mut config = CrawlConfig {
            url_template: "https://shop.example/s?k={query}&page={page}".to_string(),
            pages: PageRange::default(),
            selectors: selectors(),
            delay: DelayRange::NONE,
            throttle: ThrottleConfig::default(),
            timeout_ms: 1000,
            max_retries: 3,
            retry_statuses: vec![503],
            block_indicators: vec!["captcha".to_string()],
            sink_dir: None,
        };
        assert!(validate_adapter(&AdapterConfig::ManagedCrawl(config.clone())).is_ok());

        config.throttle.target_concurrency = 0.0;
        assert!(validate_adapter(&AdapterConfig::ManagedCrawl(config.clone())).is_err());

        config.throttle.target_concurrency = 1.0;
        config.throttle.min_delay_ms = 20_000;
        assert!(validate_adapter(&AdapterConfig::ManagedCrawl(config)).is_err());
    }
}
