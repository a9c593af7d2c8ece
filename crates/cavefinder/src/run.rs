//! Drives a started scan from the calling thread.

use std::time::{Duration, Instant};

use cavefinder_core::{
    format_elapsed, format_rate, ProgressSnapshot, ScanHandle, ScanReport, ScanStatus,
};
use crossbeam_channel::RecvTimeoutError;
use tracing::info;

/// How often the time limit is checked while no progress arrives.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Feeds progress to `render` until the scan ends.
///
/// With a `limit`, the scan is cancelled once that much wall-clock time has
/// passed; it still runs to a terminal state before this returns.
pub fn drive<F>(handle: ScanHandle, limit: Option<Duration>, mut render: F) -> ScanReport
where
    F: FnMut(&ProgressSnapshot),
{
    let started = Instant::now();
    let progress = handle.subscribe_progress();
    let mut cancelled = false;

    loop {
        match progress.recv_timeout(POLL_INTERVAL) {
            Ok(snapshot) => render(&snapshot),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if !cancelled && limit.is_some_and(|limit| started.elapsed() >= limit) {
            info!(limit = ?limit, "Time limit reached, cancelling scan");
            handle.cancel();
            cancelled = true;
        }
    }
    handle.wait()
}

/// One-line summary of a finished scan.
#[must_use]
pub fn summary(report: &ScanReport) -> String {
    let progress = match report.total {
        Some(total) => format!("{}/{total}", report.completed),
        None => report.completed.to_string(),
    };
    let mut line = format!(
        "{}: {progress} units, {} seeds, {} found in {} ({} seeds/s)",
        report.status,
        report.seeds_evaluated,
        report.matches,
        format_elapsed(report.elapsed),
        format_rate(report.throughput),
    );
    if let Some(err) = &report.error {
        line.push_str(&format!(" - {err}"));
    }
    line
}

/// Whether the process should exit successfully.
///
/// A cancelled scan still succeeds: every match up to that point is on disk.
#[must_use]
pub const fn succeeded(report: &ScanReport) -> bool {
    matches!(report.status, ScanStatus::Completed | ScanStatus::Cancelled)
}
