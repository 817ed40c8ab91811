//! Storage traits and error types
//!
//! This module defines the trait interface for the job ledger and product
//! store, and the associated error types.

use crate::model::{Job, JobStatus, Record};
use crate::storage::{JobOutcome, RecordFilter};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Job not found: {0}")]
    JobNotFound(i64),

    #[error("Invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: i64,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Mutating calls take `&mut self`, so a single owner serializes all writes.
pub trait Storage {
    // ===== Job Ledger =====

    /// Inserts a new pending job and returns its ID
    fn queue_job(&mut self, label: &str, source: &str) -> StorageResult<i64>;

    /// Gets a job by ID
    fn get_job(&self, job_id: i64) -> StorageResult<Job>;

    /// Lists jobs still waiting for a worker, oldest first
    fn pending_jobs(&self) -> StorageResult<Vec<Job>>;

    /// Moves a pending job to running and stamps `started_at`
    fn mark_job_running(&mut self, job_id: i64) -> StorageResult<()>;

    /// Moves a pending or running job to completed
    ///
    /// Calling this twice is a caller error and returns `InvalidTransition`.
    fn mark_job_complete(&mut self, job_id: i64) -> StorageResult<()>;

    /// Moves a pending or running job to failed with a reason
    fn mark_job_failed(&mut self, job_id: i64, reason: &str) -> StorageResult<()>;

    // ===== Products =====

    /// Inserts records at most once per link
    ///
    /// Records whose link is already stored are ignored, never overwritten.
    /// Invalid records are skipped.
    ///
    /// # Returns
    ///
    /// The number of rows actually inserted
    fn insert_records(&mut self, records: &[Record], job_id: i64) -> StorageResult<usize>;

    /// Inserts records and applies the terminal job transition atomically
    fn finish_job(
        &mut self,
        job_id: i64,
        records: &[Record],
        outcome: &JobOutcome,
    ) -> StorageResult<usize>;

    /// Reads stored records, optionally filtered
    fn query_records(&self, filter: Option<&RecordFilter>) -> StorageResult<Vec<Record>>;

    // ===== Statistics =====

    /// Total number of stored products
    fn count_records(&self) -> StorageResult<u64>;

    /// Stored product counts keyed by search term
    fn record_counts_by_query(&self) -> StorageResult<BTreeMap<String, u64>>;
}
