//! Logging setup
//!
//! Console output goes through a regular `fmt` layer. An optional file layer
//! writes through the [`relay::LogRelay`], so concurrent workers never share
//! a file handle.

pub mod relay;

pub use relay::{LogRelay, RelayMakeWriter, RelayWriter};

use std::io;
use std::path::Path;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the file relay alive; drop it last to flush pending lines
#[must_use = "dropping the guard stops the log relay"]
pub struct LogGuard {
    relay: Option<LogRelay>,
}

impl LogGuard {
    pub fn flush(&self) {
        if let Some(relay) = &self.relay {
            relay.flush();
        }
    }
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Maps CLI verbosity onto a filter
pub fn filter_for(verbose: u8, quiet: bool) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }
    match verbose {
        0 => EnvFilter::new("shelf_harvest=info,warn"),
        1 => EnvFilter::new("shelf_harvest=debug,info"),
        2 => EnvFilter::new("shelf_harvest=trace,debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Installs the global subscriber
///
/// # Arguments
///
/// * `verbose` - Count of `-v` flags
/// * `quiet` - Only errors reach the console and file
/// * `log_file` - Optional file fed through the relay
pub fn init(verbose: u8, quiet: bool, log_file: Option<&Path>) -> io::Result<LogGuard> {
    let relay = log_file.map(LogRelay::to_file).transpose()?;

    let console = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    let file = relay.as_ref().map(|relay| {
        tracing_subscriber::fmt::layer()
            .with_writer(relay.make_writer())
            .with_ansi(false)
            .with_target(true)
    });

    tracing_subscriber::registry()
        .with(filter_for(verbose, quiet))
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    Ok(LogGuard { relay })
}
