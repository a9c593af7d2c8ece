//! # Progress Accounting
//!
//! Lock-free completion counter plus a throttle that limits how often
//! snapshots are produced.
//!
//! A snapshot is emitted when at least [`EMIT_INTERVAL`] has passed **or** at
//! least [`EMIT_COUNT`] units completed since the previous emission. The
//! condition is checked once without the lock and again under it, so racing
//! workers never emit the same window twice.

use crate::seed::SeedKind;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Minimum time between two snapshots.
pub const EMIT_INTERVAL: Duration = Duration::from_millis(100);

/// Completed units that force a snapshot regardless of time.
pub const EMIT_COUNT: u64 = 1_000;

/// Sentinel for "nothing emitted yet".
const NEVER: u64 = u64::MAX;

/// Point-in-time view of a running scan.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressSnapshot {
    /// Seed kind of the scan; decides how throughput is derived.
    pub kind: SeedKind,
    /// Completed units (compressed seeds, or full seeds for full scans).
    pub completed: u64,
    /// Total units, `None` when unknown.
    pub total: Option<u64>,
    /// Time since the scan started.
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Full seeds examined per second.
    ///
    /// Compressed units count for the whole expansion factor.
    #[must_use]
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.completed as f64 * self.kind.seeds_per_unit() as f64 / secs
    }

    /// Completion percentage in `0..=100`, `None` when the total is unknown.
    #[must_use]
    pub fn percent(&self) -> Option<f64> {
        let total = self.total?;
        if total == 0 {
            return Some(100.0);
        }
        let pct = if total > u64::from(u32::MAX) {
            self.completed as f64 / total as f64 * 100.0
        } else {
            self.completed.saturating_mul(100) as f64 / total as f64
        };
        Some(pct.clamp(0.0, 100.0))
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.total, self.percent()) {
            (Some(total), Some(pct)) => write!(f, "{}/{} ({pct:.2}%)", self.completed, total)?,
            _ => write!(f, "{}", self.completed)?,
        }
        write!(
            f,
            " | {} | {} seeds/s",
            format_elapsed(self.elapsed),
            format_rate(self.throughput())
        )
    }
}

/// Renders a duration as `Hh MMm SSs`, `Mm SSs` or `S.Ss`.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 3_600 {
        format!("{}h {:02}m {:02}s", secs / 3_600, secs % 3_600 / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

/// Renders a rate with a `K`/`M`/`G` suffix.
#[must_use]
pub fn format_rate(rate: f64) -> String {
    if rate >= 1e9 {
        format!("{:.2}G", rate / 1e9)
    } else if rate >= 1e6 {
        format!("{:.2}M", rate / 1e6)
    } else if rate >= 1e3 {
        format!("{:.2}K", rate / 1e3)
    } else {
        format!("{rate:.1}")
    }
}

/// Shared progress counter of one scan.
#[derive(Debug)]
pub struct ProgressTracker {
    kind: SeedKind,
    total: Option<u64>,
    started: Instant,
    completed: AtomicU64,
    /// Nanoseconds after `started` of the last emission, [`NEVER`] initially.
    last_emit_nanos: AtomicU64,
    last_emit_count: AtomicU64,
    emit_lock: Mutex<()>,
}

impl ProgressTracker {
    /// Creates a tracker starting now.
    #[must_use]
    pub fn new(kind: SeedKind, total: Option<u64>) -> Self {
        Self::starting_at(kind, total, Instant::now())
    }

    pub(crate) fn starting_at(kind: SeedKind, total: Option<u64>, started: Instant) -> Self {
        Self {
            kind,
            total,
            started,
            completed: AtomicU64::new(0),
            last_emit_nanos: AtomicU64::new(NEVER),
            last_emit_count: AtomicU64::new(0),
            emit_lock: Mutex::new(()),
        }
    }

    /// Adds `delta` completed units and returns a snapshot if the throttle allows.
    pub fn report(&self, delta: u64) -> Option<ProgressSnapshot> {
        self.report_at(delta, Instant::now())
    }

    pub(crate) fn report_at(&self, delta: u64, now: Instant) -> Option<ProgressSnapshot> {
        let completed = self.completed.fetch_add(delta, Ordering::AcqRel) + delta;
        let now_nanos = self.nanos_since_start(now);

        if !self.due(completed, now_nanos) {
            return None;
        }
        let _guard = self.emit_lock.lock();
        if !self.due(completed, now_nanos) {
            return None;
        }
        self.last_emit_nanos.store(now_nanos, Ordering::Release);
        self.last_emit_count.store(completed, Ordering::Release);

        Some(ProgressSnapshot {
            kind: self.kind,
            completed,
            total: self.total,
            elapsed: now.saturating_duration_since(self.started),
        })
    }

    fn due(&self, completed: u64, now_nanos: u64) -> bool {
        let last = self.last_emit_nanos.load(Ordering::Acquire);
        if last == NEVER {
            return true;
        }
        let interval = EMIT_INTERVAL.as_nanos() as u64;
        now_nanos.saturating_sub(last) >= interval
            || completed.saturating_sub(self.last_emit_count.load(Ordering::Acquire)) >= EMIT_COUNT
    }

    fn nanos_since_start(&self, now: Instant) -> u64 {
        let nanos = now.saturating_duration_since(self.started).as_nanos();
        u64::try_from(nanos).unwrap_or(NEVER - 1)
    }

    /// Current state, ignoring the throttle.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            kind: self.kind,
            completed: self.completed(),
            total: self.total,
            elapsed: self.started.elapsed(),
        }
    }

    /// Completed units so far.
    #[inline]
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Total units, if known.
    #[inline]
    #[must_use]
    pub const fn total(&self) -> Option<u64> {
        self.total
    }
}
