use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Shelf-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub harvest: HarvestSettings,
    #[serde(rename = "source", default)]
    pub sources: Vec<SourceConfig>,
}

/// Run-wide settings
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestSettings {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Maximum number of jobs running at once
    #[serde(rename = "max-workers", default = "default_max_workers")]
    pub max_workers: usize,

    /// Optional log file fed through the log relay
    #[serde(rename = "log-file", default)]
    pub log_file: Option<PathBuf>,
}

/// One storefront to harvest, with the queries to run against it
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Source label stored on every job and record
    pub name: String,

    /// Search terms; each becomes its own job
    pub queries: Vec<String>,

    pub adapter: AdapterConfig,
}

/// Extraction strategy, selected by the `kind` key
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AdapterConfig {
    Static(StaticConfig),
    Browser(BrowserConfig),
    ManagedCrawl(CrawlConfig),
}

impl AdapterConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Static(_) => "static",
            Self::Browser(_) => "browser",
            Self::ManagedCrawl(_) => "managed-crawl",
        }
    }

    pub fn pages(&self) -> &PageRange {
        match self {
            Self::Static(c) => &c.pages,
            Self::Browser(c) => &c.pages,
            Self::ManagedCrawl(c) => &c.pages,
        }
    }

    pub fn url_template(&self) -> &str {
        match self {
            Self::Static(c) => &c.url_template,
            Self::Browser(c) => &c.url_template,
            Self::ManagedCrawl(c) => &c.url_template,
        }
    }

    pub fn selectors(&self) -> &SelectorMap {
        match self {
            Self::Static(c) => &c.selectors,
            Self::Browser(c) => &c.selectors,
            Self::ManagedCrawl(c) => &c.selectors,
        }
    }

    pub fn delay(&self) -> &DelayRange {
        match self {
            Self::Static(c) => &c.delay,
            Self::Browser(c) => &c.delay,
            Self::ManagedCrawl(c) => &c.delay,
        }
    }
}

/// Plain fetch-and-parse over a page range
#[derive(Debug, Clone, Deserialize)]
pub struct StaticConfig {
    /// URL with `{query}` and `{page}` placeholders
    #[serde(rename = "url-template")]
    pub url_template: String,

    #[serde(default)]
    pub pages: PageRange,

    pub selectors: SelectorMap,

    #[serde(default)]
    pub delay: DelayRange,

    /// Per-request timeout (milliseconds)
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Independent page workers, each with its own HTTP session
    #[serde(default = "default_page_workers")]
    pub workers: usize,
}

/// Headless browser navigation with wait-for-results
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    #[serde(rename = "url-template")]
    pub url_template: String,

    #[serde(default)]
    pub pages: PageRange,

    /// Selector whose appearance means results have rendered
    #[serde(rename = "wait-selector")]
    pub wait_selector: String,

    pub selectors: SelectorMap,

    #[serde(default)]
    pub delay: DelayRange,

    /// How long to wait for `wait-selector` (milliseconds)
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_true")]
    pub headless: bool,

    /// Chrome executable; auto-detected when absent
    #[serde(rename = "chrome-path", default)]
    pub chrome_path: Option<PathBuf>,
}

/// Middleware-driven crawl for protected targets
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    #[serde(rename = "url-template")]
    pub url_template: String,

    #[serde(default)]
    pub pages: PageRange,

    pub selectors: SelectorMap,

    #[serde(default)]
    pub delay: DelayRange,

    #[serde(default)]
    pub throttle: ThrottleConfig,

    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries per page after the first attempt
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(rename = "retry-statuses", default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,

    /// Case-insensitive body markers that mean the target blocked us
    #[serde(rename = "block-indicators", default = "default_block_indicators")]
    pub block_indicators: Vec<String>,

    /// Directory for the collector's intermediate file; system temp when absent
    #[serde(rename = "sink-dir", default)]
    pub sink_dir: Option<PathBuf>,
}

/// Inclusive-start page window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRange {
    #[serde(rename = "start-page", default = "default_start_page")]
    pub start_page: u32,

    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,
}

impl PageRange {
    /// Page numbers in order
    pub fn iter(&self) -> impl Iterator<Item = u32> {
        let end = self.start_page.saturating_add(self.max_pages);
        self.start_page..end
    }
}

impl Default for PageRange {
    fn default() -> Self {
        Self {
            start_page: default_start_page(),
            max_pages: default_max_pages(),
        }
    }
}

/// Politeness delay bounds (milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DelayRange {
    #[serde(rename = "min-ms")]
    pub min_ms: u64,

    #[serde(rename = "max-ms")]
    pub max_ms: u64,
}

impl DelayRange {
    pub const NONE: DelayRange = DelayRange {
        min_ms: 0,
        max_ms: 0,
    };
}

impl Default for DelayRange {
    fn default() -> Self {
        Self {
            min_ms: 1000,
            max_ms: 3000,
        }
    }
}

/// Auto-throttle tuning for the managed crawl
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ThrottleConfig {
    #[serde(rename = "start-delay-ms", default = "default_throttle_start")]
    pub start_delay_ms: u64,

    #[serde(rename = "min-delay-ms", default)]
    pub min_delay_ms: u64,

    #[serde(rename = "max-delay-ms", default = "default_throttle_max")]
    pub max_delay_ms: u64,

    /// Average parallel requests the target should see
    #[serde(rename = "target-concurrency", default = "default_target_concurrency")]
    pub target_concurrency: f64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            start_delay_ms: default_throttle_start(),
            min_delay_ms: 0,
            max_delay_ms: default_throttle_max(),
            target_concurrency: default_target_concurrency(),
        }
    }
}

/// Field selectors; each field is a fallback chain
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectorMap {
    /// One match per item
    pub container: SelectorChain,
    pub name: SelectorChain,
    #[serde(default)]
    pub price: SelectorChain,
    #[serde(default)]
    pub link: SelectorChain,
    #[serde(default)]
    pub image: SelectorChain,
    #[serde(default)]
    pub availability: SelectorChain,
    /// New/used/refurbished text, for marketplaces that show it
    #[serde(default)]
    pub condition: SelectorChain,
}

impl SelectorMap {
    /// Named chains, for validation and logging
    pub fn fields(&self) -> [(&'static str, &SelectorChain); 7] {
        [
            ("container", &self.container),
            ("name", &self.name),
            ("price", &self.price),
            ("link", &self.link),
            ("image", &self.image),
            ("availability", &self.availability),
            ("condition", &self.condition),
        ]
    }
}

/// Ordered CSS selectors tried until one yields a value
///
/// Accepts either a single string or a list in TOML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "ChainRepr")]
pub struct SelectorChain(pub Vec<String>);

impl SelectorChain {
    pub fn new<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(selectors.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|s| s.trim().is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<&str> for SelectorChain {
    fn from(selector: &str) -> Self {
        Self(vec![selector.to_string()])
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChainRepr {
    One(String),
    Many(Vec<String>),
}

impl From<ChainRepr> for SelectorChain {
    fn from(repr: ChainRepr) -> Self {
        match repr {
            ChainRepr::One(s) => Self(vec![s]),
            ChainRepr::Many(v) => Self(v),
        }
    }
}

fn default_max_workers() -> usize {
    3
}

fn default_page_workers() -> usize {
    1
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

fn default_start_page() -> u32 {
    1
}

fn default_max_pages() -> u32 {
    1
}

fn default_max_retries() -> u32 {
    3
}

pub(crate) fn default_retry_statuses() -> Vec<u16> {
    vec![500, 502, 503, 504, 408, 429, 403]
}

pub(crate) fn default_block_indicators() -> Vec<String> {
    ["captcha", "unusual traffic", "automated"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_throttle_start() -> u64 {
    1000
}

fn default_throttle_max() -> u64 {
    10_000
}

fn default_target_concurrency() -> f64 {
    0.5
}
