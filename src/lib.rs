//! Shelf-Harvest: a job-tracked product harvester
//!
//! This crate pulls product listings (name, price, availability, link) out of
//! storefront search pages using one of three extraction strategies, normalizes
//! them, and stores them in a deduplicated SQLite ledger keyed by product link.

pub mod adapters;
pub mod config;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod storage;

use thiserror::Error;

/// Main error type for Shelf-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Invalid job transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: model::JobStatus,
        to: model::JobStatus,
    },

    #[error("Collector sink error: {0}")]
    Sink(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Adapter error: {0}")]
    Adapter(String),
}

impl HarvestError {
    /// Maps the error onto the reason string recorded on a failed job
    pub fn failure_reason(&self) -> &'static str {
        match self {
            Self::Config(_) => model::FailureReason::ConfigurationError.as_str(),
            Self::Timeout { .. } => model::FailureReason::Timeout.as_str(),
            Self::Database(_) | Self::Storage(_) => model::FailureReason::StorageError.as_str(),
            Self::Reqwest(e) if e.is_timeout() => model::FailureReason::Timeout.as_str(),
            _ => model::FailureReason::AdapterError.as_str(),
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing required selector: {0}")]
    MissingSelector(String),

    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Invalid page range: {0}")]
    InvalidPageRange(String),

    #[error("Unsupported adapter: {0}")]
    Unsupported(String),
}

/// Result type alias for Shelf-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use adapters::{build_adapter, Adapter, ScrapeOutcome, ScrapeTarget, StopHandle};
pub use config::{AdapterConfig, Config};
pub use model::{AvailabilityStatus, ItemCondition, Job, JobStatus, RawRecord, Record};
pub use orchestrator::{HarvestRequest, Orchestrator, RunSummary};
pub use storage::{SqliteStorage, Storage};
