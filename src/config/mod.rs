//! Configuration module for Shelf-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. The library itself only consumes the plain structs defined here;
//! file loading is a convenience for the CLI.
//!
//! # Example
//!
//! ```no_run
//! use shelf_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Harvesting {} sources", config.sources.len());
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    AdapterConfig, BrowserConfig, Config, CrawlConfig, DelayRange, HarvestSettings, PageRange,
    SelectorChain, SelectorMap, SourceConfig, StaticConfig, ThrottleConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{
    validate, validate_adapter, validate_browser, validate_crawl, validate_static,
};
