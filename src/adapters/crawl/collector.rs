//! Collector stage for the managed crawl
//!
//! The crawl engine sends items over a channel; a blocking writer task appends
//! them as JSON lines to a private intermediate file. Once the engine halts the
//! adapter drains the file exactly once: read, then delete.

use crate::model::RawRecord;
use crate::{HarvestError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

static SINK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A per-invocation JSONL sink file
#[derive(Debug)]
pub struct CollectorSink {
    path: PathBuf,
}

impl CollectorSink {
    /// Creates an empty sink file under `dir`, or the system temp dir
    pub fn create(dir: Option<&Path>) -> Result<Self> {
        let dir = dir
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        fs::create_dir_all(&dir)?;

        let name = format!(
            "shelf-harvest-{}-{}-{}.jsonl",
            std::process::id(),
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or_default(),
            SINK_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let path = dir.join(name);

        OpenOptions::new().write(true).create_new(true).open(&path)?;
        tracing::trace!("Collector sink at {}", path.display());

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Starts the writer; it finishes once every sender is dropped
    ///
    /// Resolves to the number of items written.
    pub fn spawn_writer(&self, mut items: mpsc::Receiver<RawRecord>) -> JoinHandle<Result<usize>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<usize> {
            let file = OpenOptions::new().append(true).open(&path)?;
            let mut writer = BufWriter::new(file);
            let mut written = 0;

            while let Some(item) = items.blocking_recv() {
                serde_json::to_writer(&mut writer, &item)?;
                writer.write_all(b"\n")?;
                written += 1;
            }

            writer.flush()?;
            Ok(written)
        })
    }

    /// Reads every collected item and deletes the file
    pub fn drain(self) -> Result<Vec<RawRecord>> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut items = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let item = serde_json::from_str(&line).map_err(|e| {
                HarvestError::Adapter(format!(
                    "corrupt collector line {} in {}: {}",
                    index + 1,
                    self.path.display(),
                    e
                ))
            })?;
            items.push(item);
        }

        fs::remove_file(&self.path)?;
        Ok(items)
    }
}

impl Drop for CollectorSink {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                tracing::debug!("Could not remove collector sink {}: {}", self.path.display(), e);
            }
        }
    }
}
