//! Orchestrator - bounded job pool with a single write path
//!
//! This module handles:
//! - Queueing one job per request before anything runs
//! - Failing requests with bad adapter configs before dispatch
//! - Running adapters on at most `max_workers` concurrent tasks
//! - Normalizing each adapter's output inside its worker
//! - Persisting records and job transitions from one aggregation loop
//!
//! Workers never touch storage. They report `Started` and `Finished` events
//! over a channel, and the loop applies each `Finished` event with
//! [`Storage::finish_job`], so a job's records and its terminal status land
//! in one transaction.

use crate::adapters::{build_adapter, Adapter, BlockNotice, ScrapeTarget, StopHandle};
use crate::model::{normalize_record, FailureReason, Record, RecordContext};
use crate::orchestrator::summary::{FailedRequest, JobReport, RunSummary};
use crate::orchestrator::{AdapterSpec, HarvestRequest};
use crate::storage::{JobOutcome, Storage};
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

/// Messages from workers to the aggregation loop
#[derive(Debug)]
enum WorkerEvent {
    Started {
        job_id: i64,
    },
    Finished {
        job_id: i64,
        records: Vec<Record>,
        verdict: Verdict,
    },
    /// Stop was requested before the worker got a slot
    Cancelled {
        job_id: i64,
    },
}

#[derive(Debug)]
enum Verdict {
    Completed,
    Blocked(BlockNotice),
    Failed { reason: String, message: String },
}

/// Identity of a dispatched job, kept until its outcome is stored
#[derive(Debug, Clone)]
struct JobMeta {
    source: String,
    label: String,
}

/// Runs harvest requests against a store
pub struct Orchestrator<S: Storage> {
    storage: S,
    max_workers: usize,
    stop: StopHandle,
}

impl<S: Storage> Orchestrator<S> {
    /// Creates an orchestrator owning `storage`
    ///
    /// # Arguments
    ///
    /// * `storage` - The store; only the aggregation loop writes to it
    /// * `max_workers` - Concurrent adapter invocations, at least one
    pub fn new(storage: S, max_workers: usize) -> Self {
        Self {
            storage,
            max_workers: max_workers.max(1),
            stop: StopHandle::new(),
        }
    }

    /// Uses an externally owned stop flag
    pub fn with_stop(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Runs every request to a terminal job state
    ///
    /// A failing adapter only fails its own job. The returned error is
    /// reserved for a store that cannot even queue the batch.
    pub async fn run(&mut self, requests: Vec<HarvestRequest>) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let mut dispatch = Vec::with_capacity(requests.len());

        for request in requests {
            let job_id = self.storage.queue_job(&request.label, &request.source)?;
            dispatch.push((job_id, request));
        }

        tracing::info!(
            "Queued {} jobs, running with {} workers",
            dispatch.len(),
            self.max_workers
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut workers = JoinSet::new();
        let mut in_flight: HashMap<i64, JobMeta> = HashMap::new();

        for (job_id, request) in dispatch {
            let adapter = match resolve_adapter(&request.adapter) {
                Ok(adapter) => adapter,
                Err(e) => {
                    let reason = e.failure_reason();
                    tracing::error!(
                        job_id,
                        source = %request.source,
                        query = %request.label,
                        "Job not dispatched: {}",
                        e
                    );
                    self.fail_job(&mut summary, job_id, &request.source, &request.label, reason, e.to_string());
                    continue;
                }
            };

            in_flight.insert(
                job_id,
                JobMeta {
                    source: request.source.clone(),
                    label: request.label.clone(),
                },
            );

            workers.spawn(run_worker(
                job_id,
                request,
                adapter,
                Arc::clone(&semaphore),
                self.stop.clone(),
                tx.clone(),
            ));
        }
        drop(tx);

        while let Some(event) = rx.recv().await {
            self.apply_event(event, &mut in_flight, &mut summary);
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Worker task ended abnormally: {}", e);
            }
        }

        // A worker that vanished without reporting leaves its job open
        for (job_id, meta) in in_flight.drain() {
            self.fail_job(
                &mut summary,
                job_id,
                &meta.source,
                &meta.label,
                FailureReason::AdapterError.as_str(),
                "worker exited without a result".to_string(),
            );
        }

        tracing::info!(
            "Run finished: {} succeeded, {} failed, {} records persisted",
            summary.succeeded.len(),
            summary.failed.len(),
            summary.total_persisted
        );

        Ok(summary)
    }

    fn apply_event(
        &mut self,
        event: WorkerEvent,
        in_flight: &mut HashMap<i64, JobMeta>,
        summary: &mut RunSummary,
    ) {
        match event {
            WorkerEvent::Started { job_id } => {
                if let Err(e) = self.storage.mark_job_running(job_id) {
                    tracing::warn!(job_id, "Could not mark job running: {}", e);
                }
            }
            WorkerEvent::Cancelled { job_id } => {
                if let Some(meta) = in_flight.remove(&job_id) {
                    tracing::info!(job_id, query = %meta.label, "Job cancelled before dispatch");
                    self.fail_job(
                        summary,
                        job_id,
                        &meta.source,
                        &meta.label,
                        FailureReason::Cancelled.as_str(),
                        "stop requested".to_string(),
                    );
                }
            }
            WorkerEvent::Finished {
                job_id,
                records,
                verdict,
            } => {
                let Some(meta) = in_flight.remove(&job_id) else {
                    tracing::warn!(job_id, "Result for unknown job ignored");
                    return;
                };
                self.persist(summary, job_id, &meta, &records, verdict);
            }
        }
    }

    /// Stores one job's records and terminal state together
    fn persist(
        &mut self,
        summary: &mut RunSummary,
        job_id: i64,
        meta: &JobMeta,
        records: &[Record],
        verdict: Verdict,
    ) {
        let (outcome, failure) = match verdict {
            Verdict::Completed => (JobOutcome::Completed, None),
            Verdict::Blocked(notice) => (
                JobOutcome::failed(FailureReason::Blocked),
                Some((
                    FailureReason::Blocked.as_str().to_string(),
                    format!("'{}' on page {} ({})", notice.indicator, notice.page, notice.url),
                )),
            ),
            Verdict::Failed { reason, message } => {
                (JobOutcome::Failed(reason.clone()), Some((reason, message)))
            }
        };

        let persisted = match self.storage.finish_job(job_id, records, &outcome) {
            Ok(persisted) => persisted,
            Err(e) => {
                tracing::error!(job_id, query = %meta.label, "Failed to store job result: {}", e);
                self.fail_job(
                    summary,
                    job_id,
                    &meta.source,
                    &meta.label,
                    FailureReason::StorageError.as_str(),
                    e.to_string(),
                );
                return;
            }
        };

        summary.record_persisted(&meta.source, &meta.label, persisted);

        match failure {
            None => {
                tracing::info!(
                    job_id,
                    source = %meta.source,
                    query = %meta.label,
                    "Job completed: {} records, {} new",
                    records.len(),
                    persisted
                );
                summary.succeeded.push(JobReport {
                    job_id,
                    source: meta.source.clone(),
                    label: meta.label.clone(),
                    extracted: records.len(),
                    persisted,
                });
            }
            Some((reason, message)) => {
                tracing::error!(
                    job_id,
                    source = %meta.source,
                    query = %meta.label,
                    "Job failed ({}): {}; kept {} records",
                    reason,
                    message,
                    persisted
                );
                summary.failed.push(FailedRequest {
                    job_id,
                    source: meta.source.clone(),
                    label: meta.label.clone(),
                    reason,
                    message,
                    persisted,
                });
            }
        }
    }

    /// Marks a job failed with no records and notes it in the summary
    fn fail_job(
        &mut self,
        summary: &mut RunSummary,
        job_id: i64,
        source: &str,
        label: &str,
        reason: &str,
        message: String,
    ) {
        if let Err(e) = self.storage.mark_job_failed(job_id, reason) {
            tracing::error!(job_id, "Could not mark job failed: {}", e);
        }
        summary.failed.push(FailedRequest {
            job_id,
            source: source.to_string(),
            label: label.to_string(),
            reason: reason.to_string(),
            message,
            persisted: 0,
        });
    }
}

fn resolve_adapter(spec: &AdapterSpec) -> Result<Arc<dyn Adapter>> {
    match spec {
        AdapterSpec::Config(config) => Ok(Arc::from(build_adapter(config)?)),
        AdapterSpec::Prebuilt(adapter) => Ok(Arc::clone(adapter)),
    }
}

/// Runs one adapter invocation once a pool slot is free
async fn run_worker(
    job_id: i64,
    request: HarvestRequest,
    adapter: Arc<dyn Adapter>,
    semaphore: Arc<Semaphore>,
    stop: StopHandle,
    events: mpsc::UnboundedSender<WorkerEvent>,
) {
    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            let _ = events.send(WorkerEvent::Cancelled { job_id });
            return;
        }
    };

    if stop.is_stopped() {
        let _ = events.send(WorkerEvent::Cancelled { job_id });
        return;
    }

    let _ = events.send(WorkerEvent::Started { job_id });
    tracing::info!(
        job_id,
        source = %request.source,
        query = %request.label,
        adapter = adapter.kind(),
        "Job started"
    );

    let target = ScrapeTarget::new(&request.source, &request.label).with_stop(stop);

    // Inner task so an adapter panic surfaces as a JoinError
    let scrape = tokio::spawn(async move { adapter.scrape(&target).await }).await;

    let (raw, verdict) = match scrape {
        Ok(Ok(outcome)) => {
            let verdict = match outcome.blocked {
                Some(notice) => Verdict::Blocked(notice),
                None => Verdict::Completed,
            };
            (outcome.records, verdict)
        }
        Ok(Err(e)) => (
            Vec::new(),
            Verdict::Failed {
                reason: e.failure_reason().to_string(),
                message: e.to_string(),
            },
        ),
        Err(e) => (
            Vec::new(),
            Verdict::Failed {
                reason: FailureReason::AdapterError.as_str().to_string(),
                message: if e.is_panic() {
                    "adapter panicked".to_string()
                } else {
                    format!("adapter task failed: {}", e)
                },
            },
        ),
    };

    let context = RecordContext::new(&request.source, &request.label).with_job(job_id);
    let records: Vec<Record> = raw
        .iter()
        .filter_map(|item| normalize_record(item, &context))
        .collect();

    if records.len() < raw.len() {
        tracing::debug!(
            job_id,
            "Dropped {} invalid records during normalization",
            raw.len() - records.len()
        );
    }

    let _ = events.send(WorkerEvent::Finished {
        job_id,
        records,
        verdict,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ScrapeOutcome;
    use crate::config::{AdapterConfig, DelayRange, PageRange, SelectorMap, StaticConfig};
    use crate::model::{Job, JobStatus, RawRecord};
    use crate::storage::{RecordFilter, SqliteStorage, StorageError, StorageResult};
    use crate::HarvestError;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn item(name: &str) -> RawRecord {
        RawRecord {
            name: Some(name.to_string()),
            price_raw: Some("$9.99".to_string()),
            link: Some(format!("https://shop.example/p/{}", name)),
            page: 1,
            ..Default::default()
        }
    }

    /// Returns a fixed set of items, prefixed by the query
    struct FixedAdapter {
        per_query: usize,
    }

    #[async_trait]
    impl Adapter for FixedAdapter {
        fn kind(&self) -> &'static str {
            "fixed"
        }

        async fn scrape(&self, target: &ScrapeTarget) -> Result<ScrapeOutcome> {
            let records = (0..self.per_query)
                .map(|i| item(&format!("{}-{}", target.query.replace(' ', "-"), i)))
                .collect();
            Ok(ScrapeOutcome::completed(records))
        }
    }

    struct FailingAdapter;

    #[async_trait]
    impl Adapter for FailingAdapter {
        fn kind(&self) -> &'static str {
            "failing"
        }

        async fn scrape(&self, target: &ScrapeTarget) -> Result<ScrapeOutcome> {
            Err(HarvestError::Timeout {
                url: format!("https://shop.example/{}", target.query),
            })
        }
    }

    struct PanickingAdapter;

    #[async_trait]
    impl Adapter for PanickingAdapter {
        fn kind(&self) -> &'static str {
            "panicking"
        }

        async fn scrape(&self, _target: &ScrapeTarget) -> Result<ScrapeOutcome> {
            panic!("selector engine exploded");
        }
    }

    struct BlockedAdapter;

    #[async_trait]
    impl Adapter for BlockedAdapter {
        fn kind(&self) -> &'static str {
            "blocked"
        }

        async fn scrape(&self, _target: &ScrapeTarget) -> Result<ScrapeOutcome> {
            Ok(ScrapeOutcome {
                records: vec![item("early-1"), item("early-2")],
                blocked: Some(BlockNotice {
                    url: "https://shop.example/s?page=2".to_string(),
                    indicator: "captcha".to_string(),
                    page: 2,
                }),
            })
        }
    }

    /// Tracks peak concurrency
    #[derive(Default)]
    struct SlowAdapter {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Adapter for SlowAdapter {
        fn kind(&self) -> &'static str {
            "slow"
        }

        async fn scrape(&self, _target: &ScrapeTarget) -> Result<ScrapeOutcome> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(ScrapeOutcome::default())
        }
    }

    /// Delegates to SQLite but refuses to commit job results
    struct FullDiskStorage {
        inner: SqliteStorage,
    }

    impl Storage for FullDiskStorage {
        fn queue_job(&mut self, label: &str, source: &str) -> StorageResult<i64> {
            self.inner.queue_job(label, source)
        }

        fn get_job(&self, job_id: i64) -> StorageResult<Job> {
            self.inner.get_job(job_id)
        }

        fn pending_jobs(&self) -> StorageResult<Vec<Job>> {
            self.inner.pending_jobs()
        }

        fn mark_job_running(&mut self, job_id: i64) -> StorageResult<()> {
            self.inner.mark_job_running(job_id)
        }

        fn mark_job_complete(&mut self, job_id: i64) -> StorageResult<()> {
            self.inner.mark_job_complete(job_id)
        }

        fn mark_job_failed(&mut self, job_id: i64, reason: &str) -> StorageResult<()> {
            self.inner.mark_job_failed(job_id, reason)
        }

        fn insert_records(&mut self, records: &[Record], job_id: i64) -> StorageResult<usize> {
            self.inner.insert_records(records, job_id)
        }

        fn finish_job(
            &mut self,
            _job_id: i64,
            _records: &[Record],
            _outcome: &JobOutcome,
        ) -> StorageResult<usize> {
            Err(StorageError::Corrupt("database or disk is full".to_string()))
        }

        fn query_records(&self, filter: Option<&RecordFilter>) -> StorageResult<Vec<Record>> {
            self.inner.query_records(filter)
        }

        fn count_records(&self) -> StorageResult<u64> {
            self.inner.count_records()
        }

        fn record_counts_by_query(&self) -> StorageResult<BTreeMap<String, u64>> {
            self.inner.record_counts_by_query()
        }
    }

    fn orchestrator(workers: usize) -> Orchestrator<SqliteStorage> {
        Orchestrator::new(SqliteStorage::new_in_memory().unwrap(), workers)
    }

    #[tokio::test]
    async fn test_jobs_complete_and_records_persist() {
        let adapter: Arc<dyn Adapter> = Arc::new(FixedAdapter { per_query: 3 });
        let mut orch = orchestrator(2);

        let summary = orch
            .run(vec![
                HarvestRequest::with_adapter("shop", "kettle", Arc::clone(&adapter)),
                HarvestRequest::with_adapter("shop", "teapot", Arc::clone(&adapter)),
            ])
            .await
            .unwrap();

        assert_eq!(summary.total_persisted, 6);
        assert_eq!(summary.succeeded.len(), 2);
        assert_eq!(summary.per_query["kettle"], 3);
        assert_eq!(summary.per_source["shop"], 6);

        for report in &summary.succeeded {
            let job = orch.storage().get_job(report.job_id).unwrap();
            assert_eq!(job.status, JobStatus::Completed);
            assert_eq!(job.record_count, 3);
            assert!(job.started_at.is_some());
        }

        let kettles = orch
            .storage()
            .query_records(Some(&RecordFilter::search_term("kettle")))
            .unwrap();
        assert_eq!(kettles.len(), 3);
        assert!(kettles.iter().all(|r| r.search_term == "kettle"));
    }

    #[tokio::test]
    async fn test_empty_result_is_success() {
        let mut orch = orchestrator(1);
        let summary = orch
            .run(vec![HarvestRequest::with_adapter(
                "shop",
                "nothing",
                Arc::new(FixedAdapter { per_query: 0 }),
            )])
            .await
            .unwrap();

        assert_eq!(summary.succeeded.len(), 1);
        assert_eq!(summary.total_persisted, 0);
        assert!(summary.is_clean());
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let mut orch = orchestrator(3);
        let summary = orch
            .run(vec![
                HarvestRequest::with_adapter("shop", "ok", Arc::new(FixedAdapter { per_query: 2 })),
                HarvestRequest::with_adapter("shop", "slow", Arc::new(FailingAdapter)),
                HarvestRequest::with_adapter("shop", "boom", Arc::new(PanickingAdapter)),
            ])
            .await
            .unwrap();

        assert_eq!(summary.succeeded.len(), 1);
        assert_eq!(summary.failed.len(), 2);
        assert_eq!(summary.failures_with_reason("timeout").count(), 1);
        assert_eq!(summary.failures_with_reason("adapter-error").count(), 1);

        for failure in &summary.failed {
            let job = orch.storage().get_job(failure.job_id).unwrap();
            assert_eq!(job.status, JobStatus::Failed);
            assert_eq!(job.failure_reason.as_deref(), Some(failure.reason.as_str()));
        }
    }

    #[tokio::test]
    async fn test_blocked_job_keeps_partial_records() {
        let mut orch = orchestrator(1);
        let summary = orch
            .run(vec![HarvestRequest::with_adapter("shop", "hub", Arc::new(BlockedAdapter))])
            .await
            .unwrap();

        assert_eq!(summary.failed.len(), 1);
        let failure = &summary.failed[0];
        assert_eq!(failure.reason, "blocked");
        assert_eq!(failure.persisted, 2);
        assert_eq!(summary.total_persisted, 2);

        let job = orch.storage().get_job(failure.job_id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.record_count, 2);
        assert_eq!(orch.storage().count_records().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unstored_result_fails_job_as_storage_error() {
        let storage = FullDiskStorage {
            inner: SqliteStorage::new_in_memory().unwrap(),
        };
        let mut orch = Orchestrator::new(storage, 1);
        let summary = orch
            .run(vec![HarvestRequest::with_adapter(
                "shop",
                "kettle",
                Arc::new(FixedAdapter { per_query: 2 }),
            )])
            .await
            .unwrap();

        assert!(summary.succeeded.is_empty());
        assert_eq!(summary.failures_with_reason("storage-error").count(), 1);
        assert_eq!(summary.total_persisted, 0);

        let job = orch.storage().get_job(summary.failed[0].job_id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure_reason.as_deref(), Some("storage-error"));
        assert_eq!(orch.storage().count_records().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_dispatch() {
        let config = AdapterConfig::Static(StaticConfig {
            url_template: "https://books.example/{page}".to_string(),
            pages: PageRange::default(),
            selectors: SelectorMap {
                container: "div[[".into(),
                name: "h3".into(),
                link: "a".into(),
                ..Default::default()
            },
            delay: DelayRange::NONE,
            timeout_ms: 1000,
            workers: 1,
        });

        let mut orch = orchestrator(1);
        let summary = orch
            .run(vec![HarvestRequest::new("books", "poetry", config)])
            .await
            .unwrap();

        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].reason, "configuration-error");
        let job = orch.storage().get_job(summary.failed[0].job_id).unwrap();
        assert!(job.started_at.is_none());
    }

    #[tokio::test]
    async fn test_pool_is_bounded() {
        let adapter = Arc::new(SlowAdapter::default());
        let shared: Arc<dyn Adapter> = adapter.clone();
        let requests = (0..6)
            .map(|i| HarvestRequest::with_adapter("shop", format!("q{}", i), Arc::clone(&shared)))
            .collect();

        let mut orch = orchestrator(2);
        let summary = orch.run(requests).await.unwrap();

        assert_eq!(summary.succeeded.len(), 6);
        assert!(adapter.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_stop_cancels_queued_requests() {
        let mut orch = orchestrator(2);
        orch.stop_handle().stop();

        let summary = orch
            .run(vec![
                HarvestRequest::with_adapter("shop", "a", Arc::new(FixedAdapter { per_query: 1 })),
                HarvestRequest::with_adapter("shop", "b", Arc::new(FixedAdapter { per_query: 1 })),
            ])
            .await
            .unwrap();

        assert_eq!(summary.failures_with_reason("cancelled").count(), 2);
        assert_eq!(orch.storage().count_records().unwrap(), 0);
        assert!(orch.storage().pending_jobs().unwrap().is_empty());
    }
}
