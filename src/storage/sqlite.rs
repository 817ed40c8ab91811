//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::model::{AvailabilityStatus, ItemCondition, Job, JobStatus, Record};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{JobOutcome, RecordFilter};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;

const JOB_COLUMNS: &str = "id, label, source, status, created_at, started_at, completed_at, \
                           failure_reason, record_count";

const RECORD_COLUMNS: &str = "name, price_raw, price_numeric, currency, link, image, \
                              availability_raw, availability_status, brand, model, \
                              condition_raw, condition, source, search_term, scrape_time, \
                              page_number, position_on_page, job_id";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl Storage for SqliteStorage {
    // ===== Job Ledger =====

    fn queue_job(&mut self, label: &str, source: &str) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO jobs (label, source, status, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![label, source, JobStatus::Pending.to_db_string(), now()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_job(&self, job_id: i64) -> StorageResult<Job> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS),
                params![job_id],
                map_job,
            )
            .optional()?
            .ok_or(StorageError::JobNotFound(job_id))
    }

    fn pending_jobs(&self) -> StorageResult<Vec<Job>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM jobs WHERE status = ?1 ORDER BY id",
            JOB_COLUMNS
        ))?;

        let jobs = stmt
            .query_map(params![JobStatus::Pending.to_db_string()], map_job)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(jobs)
    }

    fn mark_job_running(&mut self, job_id: i64) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE jobs SET status = ?1, started_at = ?2 WHERE id = ?3 AND status = 'pending'",
            params![JobStatus::Running.to_db_string(), now(), job_id],
        )?;

        if changed == 0 {
            return Err(transition_error(&self.conn, job_id, JobStatus::Running));
        }
        Ok(())
    }

    fn mark_job_complete(&mut self, job_id: i64) -> StorageResult<()> {
        finish_on(&self.conn, job_id, &JobOutcome::Completed)
    }

    fn mark_job_failed(&mut self, job_id: i64, reason: &str) -> StorageResult<()> {
        finish_on(&self.conn, job_id, &JobOutcome::Failed(reason.to_string()))
    }

    // ===== Products =====

    fn insert_records(&mut self, records: &[Record], job_id: i64) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let inserted = insert_on(&tx, records, job_id)?;
        tx.commit()?;
        Ok(inserted)
    }

    fn finish_job(
        &mut self,
        job_id: i64,
        records: &[Record],
        outcome: &JobOutcome,
    ) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let inserted = insert_on(&tx, records, job_id)?;
        finish_on(&tx, job_id, outcome)?;
        tx.commit()?;
        Ok(inserted)
    }

    fn query_records(&self, filter: Option<&RecordFilter>) -> StorageResult<Vec<Record>> {
        let mut clauses = Vec::new();
        let mut values: Vec<&str> = Vec::new();

        if let Some(term) = filter.and_then(|f| f.search_term.as_deref()) {
            values.push(term);
            clauses.push(format!("search_term = ?{}", values.len()));
        }
        if let Some(source) = filter.and_then(|f| f.source.as_deref()) {
            values.push(source);
            clauses.push(format!("source = ?{}", values.len()));
        }

        let mut sql = format!("SELECT {} FROM products", RECORD_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(values.iter()), map_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    // ===== Statistics =====

    fn count_records(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn record_counts_by_query(&self) -> StorageResult<BTreeMap<String, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT search_term, COUNT(*) FROM products GROUP BY search_term")?;

        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(counts)
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Inserts valid records, ignoring links that already exist
fn insert_on(conn: &Connection, records: &[Record], job_id: i64) -> StorageResult<usize> {
    let mut stmt = conn.prepare_cached(&format!(
        "INSERT OR IGNORE INTO products ({}) VALUES \
         (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        RECORD_COLUMNS
    ))?;

    let mut inserted = 0;
    for record in records.iter().filter(|r| r.is_valid()) {
        inserted += stmt.execute(params![
            record.name,
            record.price_raw,
            record.price_numeric,
            record.currency,
            record.link,
            record.image,
            record.availability_raw,
            record.availability_status.to_db_string(),
            record.brand,
            record.model,
            record.condition_raw,
            record.condition.to_db_string(),
            record.source,
            record.search_term,
            record.scrape_time.to_rfc3339(),
            record.page_number,
            record.position_on_page,
            job_id,
        ])?;
    }

    let skipped = records.len() - inserted;
    if skipped > 0 {
        tracing::debug!(
            "Job {}: {} of {} records were invalid or already stored",
            job_id,
            skipped,
            records.len()
        );
    }

    Ok(inserted)
}

/// Applies a terminal transition and snapshots the job's product count
fn finish_on(conn: &Connection, job_id: i64, outcome: &JobOutcome) -> StorageResult<()> {
    let (status, reason) = match outcome {
        JobOutcome::Completed => (JobStatus::Completed, None),
        JobOutcome::Failed(reason) => (JobStatus::Failed, Some(reason.as_str())),
    };

    let changed = conn.execute(
        "UPDATE jobs
         SET status = ?1, failure_reason = ?2, completed_at = ?3,
             record_count = (SELECT COUNT(*) FROM products WHERE job_id = ?4)
         WHERE id = ?4 AND status IN ('pending', 'running')",
        params![status.to_db_string(), reason, now(), job_id],
    )?;

    if changed == 0 {
        return Err(transition_error(conn, job_id, status));
    }
    Ok(())
}

fn transition_error(conn: &Connection, job_id: i64, to: JobStatus) -> StorageError {
    let current: Result<Option<String>, rusqlite::Error> = conn
        .query_row(
            "SELECT status FROM jobs WHERE id = ?1",
            params![job_id],
            |row| row.get(0),
        )
        .optional();

    match current {
        Ok(Some(status)) => match JobStatus::from_db_string(&status) {
            Some(from) => StorageError::InvalidTransition { job_id, from, to },
            None => StorageError::Corrupt(format!("job {} has status '{}'", job_id, status)),
        },
        Ok(None) => StorageError::JobNotFound(job_id),
        Err(e) => StorageError::Sqlite(e),
    }
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(StorageError::Corrupt(message)),
    )
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, format!("bad timestamp '{}': {}", raw, e)))
}

fn optional_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(_) => timestamp(row, idx).map(Some),
        None => Ok(None),
    }
}

fn map_job(row: &Row<'_>) -> rusqlite::Result<Job> {
    let status: String = row.get(3)?;
    Ok(Job {
        id: row.get(0)?,
        label: row.get(1)?,
        source: row.get(2)?,
        status: JobStatus::from_db_string(&status)
            .ok_or_else(|| conversion_error(3, format!("unknown job status '{}'", status)))?,
        created_at: timestamp(row, 4)?,
        started_at: optional_timestamp(row, 5)?,
        completed_at: optional_timestamp(row, 6)?,
        failure_reason: row.get(7)?,
        record_count: row.get::<_, i64>(8)? as u64,
    })
}

fn map_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    let availability: String = row.get(7)?;
    let condition: String = row.get(11)?;
    Ok(Record {
        name: row.get(0)?,
        price_raw: row.get(1)?,
        price_numeric: row.get(2)?,
        currency: row.get(3)?,
        link: row.get(4)?,
        image: row.get(5)?,
        availability_raw: row.get(6)?,
        availability_status: AvailabilityStatus::from_db_string(&availability)
            .unwrap_or_default(),
        brand: row.get(8)?,
        model: row.get(9)?,
        condition_raw: row.get(10)?,
        condition: ItemCondition::from_db_string(&condition).unwrap_or_default(),
        source: row.get(12)?,
        search_term: row.get(13)?,
        scrape_time: timestamp(row, 14)?,
        page_number: row.get(15)?,
        position_on_page: row.get(16)?,
        job_id: row.get(17)?,
    })
}
