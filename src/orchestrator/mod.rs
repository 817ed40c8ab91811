//! Concurrency orchestrator
//!
//! Turns a batch of [`HarvestRequest`]s into jobs, runs them on a bounded
//! worker pool and funnels every write through one aggregation loop.

mod coordinator;
mod summary;

pub use coordinator::Orchestrator;
pub use summary::{FailedRequest, JobReport, RunSummary};

use crate::adapters::Adapter;
use crate::config::{AdapterConfig, Config};
use std::fmt;
use std::sync::Arc;

/// How a request obtains its adapter
#[derive(Clone)]
pub enum AdapterSpec {
    /// Built and validated when the run starts
    Config(AdapterConfig),
    /// Supplied ready-made by the caller
    Prebuilt(Arc<dyn Adapter>),
}

impl fmt::Debug for AdapterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(config) => f.debug_tuple("Config").field(&config.kind()).finish(),
            Self::Prebuilt(adapter) => f.debug_tuple("Prebuilt").field(&adapter.kind()).finish(),
        }
    }
}

/// One query against one source; becomes exactly one job
#[derive(Debug, Clone)]
pub struct HarvestRequest {
    /// Query or label; stored as the job label and the record search term
    pub label: String,
    pub source: String,
    pub adapter: AdapterSpec,
}

impl HarvestRequest {
    pub fn new(source: impl Into<String>, label: impl Into<String>, config: AdapterConfig) -> Self {
        Self {
            label: label.into(),
            source: source.into(),
            adapter: AdapterSpec::Config(config),
        }
    }

    pub fn with_adapter(
        source: impl Into<String>,
        label: impl Into<String>,
        adapter: Arc<dyn Adapter>,
    ) -> Self {
        Self {
            label: label.into(),
            source: source.into(),
            adapter: AdapterSpec::Prebuilt(adapter),
        }
    }

    /// One request per query, all sharing an adapter configuration
    pub fn for_queries<I, Q>(source: &str, queries: I, config: &AdapterConfig) -> Vec<Self>
    where
        I: IntoIterator<Item = Q>,
        Q: Into<String>,
    {
        queries
            .into_iter()
            .map(|query| Self::new(source, query, config.clone()))
            .collect()
    }

    /// Every query of every configured source, in file order
    pub fn from_config(config: &Config) -> Vec<Self> {
        config
            .sources
            .iter()
            .flat_map(|source| Self::for_queries(&source.name, &source.queries, &source.adapter))
            .collect()
    }
}
