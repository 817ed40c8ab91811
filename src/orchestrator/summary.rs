use std::collections::BTreeMap;
use std::fmt;

/// A job that finished successfully, possibly with zero records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub job_id: i64,
    pub source: String,
    pub label: String,
    /// Valid records the adapter produced
    pub extracted: usize,
    /// Records that were new to the store
    pub persisted: usize,
}

/// A request that did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRequest {
    pub job_id: i64,
    pub source: String,
    pub label: String,
    /// Reason string recorded on the job
    pub reason: String,
    pub message: String,
    /// Records kept despite the failure, e.g. before a block
    pub persisted: usize,
}

/// Outcome of one orchestrator run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total_persisted: usize,
    pub per_source: BTreeMap<String, usize>,
    pub per_query: BTreeMap<String, usize>,
    pub succeeded: Vec<JobReport>,
    pub failed: Vec<FailedRequest>,
}

impl RunSummary {
    pub(crate) fn record_persisted(&mut self, source: &str, label: &str, persisted: usize) {
        self.total_persisted += persisted;
        *self.per_source.entry(source.to_string()).or_default() += persisted;
        *self.per_query.entry(label.to_string()).or_default() += persisted;
    }

    pub fn jobs(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Failed requests with the given reason
    pub fn failures_with_reason<'a>(&'a self, reason: &'a str) -> impl Iterator<Item = &'a FailedRequest> {
        self.failed.iter().filter(move |f| f.reason == reason)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Harvest Summary ===")?;
        writeln!(f)?;
        writeln!(
            f,
            "Jobs: {} ({} succeeded, {} failed)",
            self.jobs(),
            self.succeeded.len(),
            self.failed.len()
        )?;
        writeln!(f, "Records persisted: {}", self.total_persisted)?;

        if !self.per_source.is_empty() {
            writeln!(f)?;
            writeln!(f, "By source:")?;
            for (source, count) in &self.per_source {
                writeln!(f, "  {}: {}", source, count)?;
            }
        }

        if !self.per_query.is_empty() {
            writeln!(f)?;
            writeln!(f, "By query:")?;
            for (query, count) in &self.per_query {
                writeln!(f, "  {}: {}", query, count)?;
            }
        }

        if !self.failed.is_empty() {
            writeln!(f)?;
            writeln!(f, "Failed ({}):", self.failed.len())?;
            for failure in &self.failed {
                writeln!(
                    f,
                    "  [{}] {} / {}: {} ({})",
                    failure.job_id, failure.source, failure.label, failure.reason, failure.message
                )?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakdowns_accumulate() {
        let mut summary = RunSummary::default();
        summary.record_persisted("books", "poetry", 3);
        summary.record_persisted("books", "travel", 2);
        summary.record_persisted("shop", "poetry", 1);

        assert_eq!(summary.total_persisted, 6);
        assert_eq!(summary.per_source["books"], 5);
        assert_eq!(summary.per_query["poetry"], 4);
    }

    #[test]
    fn test_display_lists_failures() {
        let mut summary = RunSummary::default();
        summary.failed.push(FailedRequest {
            job_id: 7,
            source: "shop".to_string(),
            label: "usb hub".to_string(),
            reason: "blocked".to_string(),
            message: "captcha on page 2".to_string(),
            persisted: 0,
        });

        let text = summary.to_string();
        assert!(text.contains("Jobs: 1 (0 succeeded, 1 failed)"));
        assert!(text.contains("[7] shop / usb hub: blocked (captcha on page 2)"));
        assert_eq!(summary.failures_with_reason("blocked").count(), 1);
        assert!(!summary.is_clean());
    }
}
