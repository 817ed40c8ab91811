//! Storage module for the job ledger and product store
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Job queueing and lifecycle transitions
//! - At-most-once product insertion keyed by link
//! - Read-only record queries

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::model::FailureReason;
use std::path::Path;

/// Opens (or creates) a storage database
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Terminal outcome applied by [`Storage::finish_job`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed(String),
}

impl JobOutcome {
    pub fn failed(reason: FailureReason) -> Self {
        Self::Failed(reason.as_str().to_string())
    }
}

/// Filter for [`Storage::query_records`]
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub search_term: Option<String>,
    pub source: Option<String>,
}

impl RecordFilter {
    pub fn search_term(term: impl Into<String>) -> Self {
        Self {
            search_term: Some(term.into()),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}
