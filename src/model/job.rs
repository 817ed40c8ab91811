/// Job lifecycle definitions
///
/// A job moves through `pending -> running -> {completed, failed}` and never
/// backwards. Skipping `running` is allowed (a request rejected at validation
/// goes straight from pending to failed).
use crate::HarvestError;
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Current status of a job in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// Admitted but not yet picked up by a worker
    Pending,

    /// A worker is running the adapter
    Running,

    /// Adapter returned and its records were persisted
    Completed,

    /// Adapter, configuration or store failed; see the failure reason
    Failed,
}

impl JobStatus {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if `next` is reachable from this status in one step
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Completed)
                | (Self::Pending, Self::Failed)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Well-known reasons recorded on failed jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    Blocked,
    Timeout,
    AdapterError,
    StorageError,
    ConfigurationError,
    Cancelled,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::Timeout => "timeout",
            Self::AdapterError => "adapter-error",
            Self::StorageError => "storage-error",
            Self::ConfigurationError => "configuration-error",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One harvesting run for a single query
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: i64,
    pub label: String,
    pub source: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub record_count: u64,
}

impl Job {
    /// Creates a pending job
    pub fn new(id: i64, label: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            source: source.into(),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            failure_reason: None,
            record_count: 0,
        }
    }

    /// Marks the job as picked up by a worker
    pub fn start(&mut self) -> Result<(), HarvestError> {
        self.transition(JobStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Marks the job as completed
    pub fn complete(&mut self) -> Result<(), HarvestError> {
        self.transition(JobStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Marks the job as failed with the given reason
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), HarvestError> {
        self.transition(JobStatus::Failed)?;
        self.completed_at = Some(Utc::now());
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    /// Wall time between start (or creation) and completion
    pub fn duration(&self) -> Option<Duration> {
        let end = self.completed_at?;
        let start = self.started_at.unwrap_or(self.created_at);
        Some(end - start)
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), HarvestError> {
        if !self.status.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
