//! # Scan Orchestration
//!
//! Turns a [`ScanRequest`] into work units, runs them on worker pools and
//! reports the outcome through a [`ScanHandle`].
//!
//! ## State machine
//!
//! ```text
//! Idle -> Validating -> Running -> Completed
//!                          |-----> Cancelled
//!                          `-----> Failed
//! ```
//!
//! Validation is synchronous inside [`Scanner::start`]; a rejected request
//! never spawns a thread. Everything after that happens on a controller
//! thread.
//!
//! ## Segments
//!
//! Range sources are split into segments of at most `segment_size` seeds.
//! Segments run strictly one after another, each on a fresh pool that is
//! drained and dropped before the next one starts. List sources run on a
//! single pool.

use crate::error::{ScanError, ScanResult};
use crate::params::ParameterSet;
use crate::pool::{CancelToken, WorkerPool};
use crate::predicate::{DepthFloor, FilterMode, PredicateEngine};
use crate::progress::{ProgressSnapshot, ProgressTracker};
use crate::sampling::{Coordinate, NoiseSampleProvider, SeedSpaceExpander};
use crate::seed::{list_units, range_units, SeedKind, SeedList, SeedRange, WorkUnit};
use crate::sink::{OutputTarget, ResultSink};
use crate::verify::{HeightCheck, HeightStage, HeightVerifier};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Snapshots buffered for subscribers before new ones are dropped.
const PROGRESS_BUFFER: usize = 256;

/// Where the seeds of a scan come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SeedSource {
    /// Every seed of an inclusive range.
    Range(SeedRange),
    /// Newline-separated seed text. Bad tokens are skipped and logged.
    List(String),
}

/// Everything that defines one scan.
#[derive(Debug)]
pub struct ScanRequest {
    /// Seeds to examine.
    pub source: SeedSource,
    /// Whether the source holds compressed or full seeds.
    pub kind: SeedKind,
    /// Location evaluated for every seed.
    pub coordinate: Coordinate,
    /// Lowest cave layer examined.
    pub depth_floor: DepthFloor,
    /// Predicate family.
    pub mode: FilterMode,
    /// Thresholds; only the aquifer flag is read in bedrock mode.
    pub parameters: ParameterSet,
    /// Optional second-stage check.
    pub height_check: Option<HeightCheck>,
    /// Worker threads per pool.
    pub threads: usize,
    /// Maximum seeds per range segment.
    pub segment_size: u64,
    /// Destination of matching seeds.
    pub output: OutputTarget,
}

/// External collaborators a scan runs against.
#[derive(Clone)]
pub struct ScanServices {
    /// Noise channel values per seed.
    pub sampler: Arc<dyn NoiseSampleProvider>,
    /// Compressed-to-full seed expansion.
    pub expander: Arc<dyn SeedSpaceExpander>,
    /// Required when the request asks for a height check.
    pub verifier: Option<Arc<dyn HeightVerifier>>,
}

impl fmt::Debug for ScanServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanServices")
            .field("verifier", &self.verifier.is_some())
            .finish_non_exhaustive()
    }
}

/// Lifecycle state of a scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ScanStatus {
    /// Not started.
    #[default]
    Idle = 0,
    /// Request being checked.
    Validating = 1,
    /// Workers running.
    Running = 2,
    /// Every unit was processed.
    Completed = 3,
    /// Stopped by request before finishing.
    Cancelled = 4,
    /// Stopped by a fatal error.
    Failed = 5,
}

impl ScanStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Validating,
            2 => Self::Running,
            3 => Self::Completed,
            4 => Self::Cancelled,
            5 => Self::Failed,
            _ => Self::Idle,
        }
    }

    /// Whether the scan has stopped for good.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Default)]
struct StatusCell(AtomicU8);

impl StatusCell {
    fn set(&self, status: ScanStatus) {
        self.0.store(status as u8, Ordering::Release);
    }

    fn get(&self) -> ScanStatus {
        ScanStatus::from_u8(self.0.load(Ordering::Acquire))
    }
}

/// Final outcome of a scan.
#[derive(Debug)]
pub struct ScanReport {
    /// Terminal state.
    pub status: ScanStatus,
    /// Completed progress units.
    pub completed: u64,
    /// Total units, if known.
    pub total: Option<u64>,
    /// Full seeds run through the predicate engine.
    pub seeds_evaluated: u64,
    /// Seeds written to the output.
    pub matches: u64,
    /// Wall-clock duration.
    pub elapsed: Duration,
    /// Average full seeds per second.
    pub throughput: f64,
    /// The fatal error when `status` is [`ScanStatus::Failed`].
    pub error: Option<ScanError>,
}

/// Entry point for starting scans.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scanner;

impl Scanner {
    /// Validates the request and starts scanning in the background.
    ///
    /// Returns as soon as the controller thread is running.
    pub fn start(request: ScanRequest, services: ScanServices) -> ScanResult<ScanHandle> {
        let status = Arc::new(StatusCell::default());
        status.set(ScanStatus::Validating);
        let plan = validate(&request, &services)?;

        let ScanRequest {
            kind,
            coordinate,
            depth_floor,
            mode,
            parameters,
            height_check,
            threads,
            segment_size,
            output,
            ..
        } = request;

        let sink = output.open()?;
        let tracker = Arc::new(ProgressTracker::new(kind, plan.total()));
        let cancel = CancelToken::new();
        let (progress_tx, progress_rx) = bounded(PROGRESS_BUFFER);

        let height = match (height_check, services.verifier) {
            (Some(check), Some(verifier)) => {
                Some(HeightStage::new(verifier, coordinate, depth_floor, check))
            }
            _ => None,
        };
        let context = Arc::new(ScanContext {
            engine: PredicateEngine::new(services.sampler, coordinate, parameters, depth_floor, mode),
            height,
            expander: services.expander,
            sink,
            tracker: Arc::clone(&tracker),
            cancel: cancel.clone(),
            fault: Mutex::new(None),
            progress_tx,
            progress_backlog: progress_rx.clone(),
            evaluated: AtomicU64::new(0),
        });

        info!(
            ?kind,
            x = coordinate.x,
            z = coordinate.z,
            depth = depth_floor.get(),
            ?mode,
            threads,
            segment_size,
            total = ?plan.total(),
            "Scan started"
        );

        status.set(ScanStatus::Running);
        let controller = {
            let status = Arc::clone(&status);
            thread::Builder::new()
                .name("cavefinder-controller".into())
                .spawn(move || run(context, plan, kind, threads, segment_size, &status))
                .map_err(|e| ScanError::Pool(format!("failed to spawn controller: {e}")))?
        };

        Ok(ScanHandle {
            cancel,
            status,
            progress: progress_rx,
            tracker,
            controller: Some(controller),
        })
    }
}

/// Control surface of a running scan.
#[derive(Debug)]
pub struct ScanHandle {
    cancel: CancelToken,
    status: Arc<StatusCell>,
    progress: Receiver<ProgressSnapshot>,
    tracker: Arc<ProgressTracker>,
    controller: Option<JoinHandle<ScanReport>>,
}

impl ScanHandle {
    /// Requests cooperative cancellation. Returns immediately.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> ScanStatus {
        self.status.get()
    }

    /// Throttled progress snapshots. Lossy: once the buffer is full the
    /// oldest queued snapshot is dropped, so the final one always arrives.
    ///
    /// Receivers share one queue; each snapshot is delivered to one of them.
    #[must_use]
    pub fn subscribe_progress(&self) -> Receiver<ProgressSnapshot> {
        self.progress.clone()
    }

    /// Unthrottled current progress.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.tracker.snapshot()
    }

    /// Whether the controller has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.controller.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Blocks until the scan reaches a terminal state.
    pub fn wait(mut self) -> ScanReport {
        let Some(controller) = self.controller.take() else {
            return self.lost_controller();
        };
        controller.join().unwrap_or_else(|_| self.lost_controller())
    }

    fn lost_controller(&self) -> ScanReport {
        self.status.set(ScanStatus::Failed);
        let snapshot = self.tracker.snapshot();
        ScanReport {
            status: ScanStatus::Failed,
            completed: snapshot.completed,
            total: snapshot.total,
            seeds_evaluated: 0,
            matches: 0,
            elapsed: snapshot.elapsed,
            throughput: snapshot.throughput(),
            error: Some(ScanError::Pool("scan controller panicked".into())),
        }
    }
}

/// Validated seed source.
enum Plan {
    Range(SeedRange),
    List(Vec<i64>),
}

impl Plan {
    fn total(&self) -> Option<u64> {
        match self {
            Self::Range(range) => range.total(),
            Self::List(seeds) => Some(seeds.len() as u64),
        }
    }
}

fn validate(request: &ScanRequest, services: &ScanServices) -> ScanResult<Plan> {
    if !request.coordinate.in_bounds() {
        return Err(ScanError::InvalidRequest(format!(
            "coordinate ({}, {}) is outside +/-{}",
            request.coordinate.x,
            request.coordinate.z,
            Coordinate::LIMIT
        )));
    }
    if request.threads == 0 {
        return Err(ScanError::InvalidRequest("thread count must be at least 1".into()));
    }
    if let Ok(available) = thread::available_parallelism() {
        if request.threads > available.get() {
            warn!(
                threads = request.threads,
                available = available.get(),
                "Thread count exceeds available parallelism"
            );
        }
    }
    if request.segment_size == 0 {
        return Err(ScanError::InvalidRequest("segment size must be at least 1".into()));
    }
    if matches!(request.mode, FilterMode::Normal { .. }) {
        request.parameters.validate()?;
    }
    if request.height_check.is_some() && services.verifier.is_none() {
        return Err(ScanError::InvalidRequest(
            "height check requested without a height verifier".into(),
        ));
    }

    match &request.source {
        SeedSource::Range(range) => Ok(Plan::Range(SeedRange::new(range.start, range.end)?)),
        SeedSource::List(text) => {
            let list = SeedList::parse(text)?;
            for token in &list.skipped {
                warn!(token = %token, "Skipping invalid seed");
            }
            if list.seeds.is_empty() {
                return Err(ScanError::EmptySeedList);
            }
            Ok(Plan::List(list.seeds))
        }
    }
}

/// State shared by the controller and every worker of one scan.
struct ScanContext {
    engine: PredicateEngine,
    height: Option<HeightStage>,
    expander: Arc<dyn SeedSpaceExpander>,
    sink: ResultSink,
    tracker: Arc<ProgressTracker>,
    cancel: CancelToken,
    fault: Mutex<Option<ScanError>>,
    progress_tx: Sender<ProgressSnapshot>,
    /// Held to evict the oldest snapshot when subscribers fall behind.
    progress_backlog: Receiver<ProgressSnapshot>,
    evaluated: AtomicU64,
}

impl ScanContext {
    fn run_unit(&self, unit: WorkUnit) {
        match unit {
            WorkUnit::Compressed(seed) => {
                let mut evaluated = 0u64;
                let mut finished = true;
                for full in self.expander.expand(seed) {
                    if self.cancel.is_cancelled() {
                        finished = false;
                        break;
                    }
                    self.consider(full);
                    evaluated += 1;
                }
                self.evaluated.fetch_add(evaluated, Ordering::Relaxed);
                if finished {
                    self.advance(1);
                }
            }
            WorkUnit::FullRange(range) => self.run_batch(range.seeds()),
            WorkUnit::FullList(seeds) => self.run_batch(seeds.into_iter()),
        }
    }

    fn run_batch(&self, seeds: impl Iterator<Item = i64>) {
        let mut processed = 0u64;
        for seed in seeds {
            if self.cancel.is_cancelled() {
                break;
            }
            self.consider(seed);
            processed += 1;
        }
        self.evaluated.fetch_add(processed, Ordering::Relaxed);
        if processed > 0 {
            self.advance(processed);
        }
    }

    fn consider(&self, seed: i64) {
        if !self.engine.evaluate(seed) {
            return;
        }
        if let Some(height) = &self.height {
            if !height.passes(seed) {
                return;
            }
        }
        if let Err(e) = self.sink.submit(seed) {
            self.fail(e.into());
        }
    }

    fn advance(&self, delta: u64) {
        if let Some(snapshot) = self.tracker.report(delta) {
            self.publish(snapshot);
        }
    }

    /// Queues a snapshot, dropping the oldest queued one while the buffer is full.
    fn publish(&self, mut snapshot: ProgressSnapshot) {
        loop {
            match self.progress_tx.try_send(snapshot) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => return,
                Err(TrySendError::Full(rejected)) => {
                    let _ = self.progress_backlog.try_recv();
                    snapshot = rejected;
                }
            }
        }
    }

    /// Records the first fatal error and stops the scan.
    fn fail(&self, err: ScanError) {
        let mut fault = self.fault.lock();
        if fault.is_none() {
            error!(error = %err, "Scan aborted");
            *fault = Some(err);
        }
        self.cancel.cancel();
    }
}

fn run(
    context: Arc<ScanContext>,
    plan: Plan,
    kind: SeedKind,
    threads: usize,
    segment_size: u64,
    status: &StatusCell,
) -> ScanReport {
    if let Some(height) = &context.height {
        height.prepare();
    }
    let handler = {
        let context = Arc::clone(&context);
        Arc::new(move |unit: WorkUnit| context.run_unit(unit))
    };

    match plan {
        Plan::Range(range) => {
            let count = range.segment_count(segment_size);
            for (index, segment) in range.segments(segment_size).enumerate() {
                if context.cancel.is_cancelled() {
                    break;
                }
                info!(
                    segment = index + 1,
                    of = %count,
                    start = segment.start,
                    end = segment.end,
                    "Scanning segment"
                );
                if let Err(e) = drain(&context, &handler, threads, range_units(segment, kind)) {
                    context.fail(e);
                    break;
                }
            }
        }
        Plan::List(seeds) => {
            if let Err(e) = drain(&context, &handler, threads, list_units(&seeds, kind)) {
                context.fail(e);
            }
        }
    }
    drop(handler);

    let snapshot = context.tracker.snapshot();
    context.publish(snapshot);
    let error = context.fault.lock().take();
    let final_status = if error.is_some() {
        ScanStatus::Failed
    } else if context.cancel.is_cancelled() {
        ScanStatus::Cancelled
    } else {
        ScanStatus::Completed
    };
    status.set(final_status);

    let report = ScanReport {
        status: final_status,
        completed: snapshot.completed,
        total: snapshot.total,
        seeds_evaluated: context.evaluated.load(Ordering::Relaxed),
        matches: context.sink.written(),
        elapsed: snapshot.elapsed,
        throughput: snapshot.throughput(),
        error,
    };
    info!(
        status = %report.status,
        matches = report.matches,
        progress = %snapshot,
        "Scan finished"
    );
    report
}

/// Runs one batch of units on a fresh pool and waits for it to drain.
fn drain<F>(
    context: &ScanContext,
    handler: &Arc<F>,
    threads: usize,
    units: impl Iterator<Item = WorkUnit>,
) -> ScanResult<()>
where
    F: Fn(WorkUnit) + Send + Sync + 'static,
{
    let pool = WorkerPool::spawn(
        "cavefinder-worker",
        threads,
        context.cancel.clone(),
        Arc::clone(handler),
    )?;
    for unit in units {
        if context.cancel.is_cancelled() || !pool.submit(unit) {
            break;
        }
    }
    if context.cancel.is_cancelled() {
        debug!("Cancellation observed; stopping pool");
        pool.shutdown_now()
    } else {
        pool.join()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::Channel;

    fn services() -> ScanServices {
        ScanServices {
            sampler: Arc::new(|_: i64, _: Channel, _: f64, _: f64, _: f64| 0.0),
            expander: Arc::new(|seed: i64| std::iter::once(seed)),
            verifier: None,
        }
    }

    fn request(source: SeedSource) -> ScanRequest {
        ScanRequest {
            source,
            kind: SeedKind::Full,
            coordinate: Coordinate::default(),
            depth_floor: DepthFloor::default(),
            mode: FilterMode::default(),
            parameters: ParameterSet::unconstrained(),
            height_check: None,
            threads: 2,
            segment_size: 100,
            output: OutputTarget::Stream(Box::new(std::io::sink())),
        }
    }

    #[test]
    fn test_validation_rejects_bad_requests() {
        let reversed = SeedSource::Range(SeedRange { start: 5, end: 1 });
        assert!(matches!(
            Scanner::start(request(reversed), services()),
            Err(ScanError::InvalidRange { .. })
        ));

        let garbage = SeedSource::List("abc\n\nxyz\n".into());
        assert!(matches!(
            Scanner::start(request(garbage), services()),
            Err(ScanError::EmptySeedList)
        ));

        let mut zero_threads = request(SeedSource::List("1".into()));
        zero_threads.threads = 0;
        assert!(Scanner::start(zero_threads, services()).is_err());

        let mut far = request(SeedSource::List("1".into()));
        far.coordinate = Coordinate::new(40_000_000, 0);
        assert!(Scanner::start(far, services()).is_err());

        let mut needs_verifier = request(SeedSource::List("1".into()));
        needs_verifier.height_check = Some(HeightCheck::Surface);
        assert!(Scanner::start(needs_verifier, services()).is_err());
    }

    #[test]
    fn test_status_progression() {
        let handle = Scanner::start(request(SeedSource::List("1\n2\n3".into())), services()).unwrap();
        assert!(matches!(handle.status(), ScanStatus::Running | ScanStatus::Completed));
        let report = handle.wait();
        assert_eq!(report.status, ScanStatus::Completed);
        assert_eq!(report.completed, 3);
        assert_eq!(report.total, Some(3));
        assert_eq!(report.matches, 3);
        assert!(report.error.is_none());
    }

    #[test]
    fn test_status_cell_round_trips_terminal_states() {
        let cell = StatusCell::default();
        assert_eq!(cell.get(), ScanStatus::Idle);
        for status in [ScanStatus::Completed, ScanStatus::Cancelled, ScanStatus::Failed] {
            cell.set(status);
            assert_eq!(cell.get(), status);
            assert!(status.is_terminal());
        }
        assert!(!ScanStatus::Running.is_terminal());
    }
}
