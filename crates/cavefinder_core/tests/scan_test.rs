//! End-to-end scans against fake collaborators.

use cavefinder_core::{
    Channel, ConditionKind, Coordinate, DepthFloor, FilterMode, HeightCheck, HeightVerifier,
    OutputTarget, Parameter, ParameterSet, ParameterSpec, ScanError, ScanRequest, ScanServices,
    ScanStatus, Scanner, SeedKind, SeedRange, SeedSource, VerifierError, EXPANSION_FACTOR,
};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// In-memory output shared with the test.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn seeds(&self) -> Vec<i64> {
        let bytes = self.0.lock();
        std::str::from_utf8(&bytes)
            .unwrap()
            .lines()
            .map(|line| line.parse().unwrap())
            .collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct BrokenDisk;

impl Write for BrokenDisk {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Only seeds divisible by 7 pass the continentalness filter.
fn sevens() -> ScanServices {
    ScanServices {
        sampler: Arc::new(|seed: i64, channel: Channel, _: f64, _: f64, _: f64| {
            if channel == Channel::Continentalness && seed.rem_euclid(7) == 0 {
                1.0
            } else {
                -1.0
            }
        }),
        expander: Arc::new(|seed: i64| (0..4).map(move |i| seed * 4 + i)),
        verifier: None,
    }
}

fn sevens_filter() -> ParameterSet {
    ParameterSet::unconstrained().with(ParameterSpec::new(
        Parameter::Continentalness,
        ConditionKind::GreaterThan,
        0.0,
        0.0,
    ))
}

fn request(source: SeedSource, kind: SeedKind, output: OutputTarget) -> ScanRequest {
    ScanRequest {
        source,
        kind,
        coordinate: Coordinate::new(16, -32),
        depth_floor: DepthFloor::default(),
        mode: FilterMode::default(),
        parameters: sevens_filter(),
        height_check: None,
        threads: 3,
        segment_size: 50,
        output,
    }
}

fn range(start: i64, end: i64) -> SeedSource {
    SeedSource::Range(SeedRange::new(start, end).unwrap())
}

fn temp_output() -> std::path::PathBuf {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("cavefinder_scan_test_{}_{id}.txt", std::process::id()))
}

#[test]
fn test_compressed_range_counts_units_not_seeds() {
    let path = temp_output();
    let handle = Scanner::start(
        request(range(0, 249), SeedKind::Compressed, OutputTarget::File(path.clone())),
        sevens(),
    )
    .unwrap();
    let report = handle.wait();

    assert_eq!(report.status, ScanStatus::Completed);
    assert_eq!(report.completed, 250);
    assert_eq!(report.total, Some(250));
    assert_eq!(report.seeds_evaluated, 1_000);

    let expected: BTreeSet<i64> = (0..1_000).filter(|s| s % 7 == 0).collect();
    let written: Vec<i64> = std::fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(|l| l.parse().unwrap())
        .collect();
    assert_eq!(written.len(), expected.len());
    assert_eq!(written.into_iter().collect::<BTreeSet<_>>(), expected);
    assert_eq!(report.matches, expected.len() as u64);

    let secs = report.elapsed.as_secs_f64();
    if secs > 0.0 {
        let expected_rate = report.completed as f64 * EXPANSION_FACTOR as f64 / secs;
        assert!((report.throughput - expected_rate).abs() <= expected_rate * 1e-9);
    }
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_full_range_counts_every_seed() {
    let out = SharedBuf::default();
    let mut req = request(range(-1_500, 1_499), SeedKind::Full, OutputTarget::Stream(Box::new(out.clone())));
    req.segment_size = 700;
    let report = Scanner::start(req, sevens()).unwrap().wait();

    assert_eq!(report.status, ScanStatus::Completed);
    assert_eq!(report.completed, 3_000);
    assert_eq!(report.seeds_evaluated, 3_000);
    let mut seeds = out.seeds();
    seeds.sort_unstable();
    let expected: Vec<i64> = (-1_500..=1_499).filter(|s: &i64| s.rem_euclid(7) == 0).collect();
    assert_eq!(seeds, expected);
}

#[test]
fn test_segments_cover_range_exactly_once() {
    let out = SharedBuf::default();
    let mut req = request(range(10, 2_509), SeedKind::Full, OutputTarget::Stream(Box::new(out.clone())));
    req.parameters = ParameterSet::unconstrained();
    req.segment_size = 300;
    let report = Scanner::start(req, sevens()).unwrap().wait();

    assert_eq!(report.completed, 2_500);
    let mut seeds = out.seeds();
    seeds.sort_unstable();
    assert_eq!(seeds, (10..=2_509).collect::<Vec<_>>());
}

#[test]
fn test_list_keeps_duplicates_and_skips_garbage() {
    let out = SharedBuf::default();
    let source = SeedSource::List("7\nnot-a-seed\n\n7\n3\n".into());
    let report = Scanner::start(
        request(source, SeedKind::Full, OutputTarget::Stream(Box::new(out.clone()))),
        sevens(),
    )
    .unwrap()
    .wait();

    assert_eq!(report.status, ScanStatus::Completed);
    assert_eq!(report.total, Some(3));
    assert_eq!(report.completed, 3);
    assert_eq!(out.seeds(), vec![7, 7]);
}

#[test]
fn test_cancel_reaches_terminal_state() {
    let out = SharedBuf::default();
    let mut req = request(
        range(0, i64::MAX),
        SeedKind::Compressed,
        OutputTarget::Stream(Box::new(out)),
    );
    req.segment_size = 1_000_000;
    let handle = Scanner::start(req, sevens()).unwrap();
    thread::sleep(Duration::from_millis(50));
    handle.cancel();
    let report = handle.wait();

    assert_eq!(report.status, ScanStatus::Cancelled);
    assert!(report.completed < report.total.unwrap());
    assert!(report.error.is_none());
}

#[test]
fn test_write_failure_fails_scan() {
    let req = request(range(0, 10_000), SeedKind::Full, OutputTarget::Stream(Box::new(BrokenDisk)));
    let report = Scanner::start(req, sevens()).unwrap().wait();

    assert_eq!(report.status, ScanStatus::Failed);
    assert!(matches!(report.error, Some(ScanError::Sink(_))));
    assert_eq!(report.matches, 0);
}

#[test]
fn test_progress_stream_reaches_total() {
    let out = SharedBuf::default();
    let handle = Scanner::start(
        request(range(1, 5_000), SeedKind::Full, OutputTarget::Stream(Box::new(out))),
        sevens(),
    )
    .unwrap();
    let progress = handle.subscribe_progress();
    let report = handle.wait();

    let snapshots: Vec<_> = progress.try_iter().collect();
    assert!(!snapshots.is_empty());
    let furthest = snapshots.iter().map(|s| s.completed).max().unwrap();
    assert_eq!(furthest, 5_000);
    assert_eq!(report.completed, 5_000);
    for snapshot in &snapshots {
        assert_eq!(snapshot.total, Some(5_000));
    }
}

#[test]
fn test_slow_subscriber_still_sees_final_snapshot() {
    let out = SharedBuf::default();
    let mut req = request(range(1, 400_000), SeedKind::Full, OutputTarget::Stream(Box::new(out)));
    req.threads = 4;
    req.segment_size = 100_000;
    let handle = Scanner::start(req, sevens()).unwrap();
    let progress = handle.subscribe_progress();
    let report = handle.wait();

    let snapshots: Vec<_> = progress.try_iter().collect();
    let last = snapshots.last().unwrap();
    assert_eq!(report.status, ScanStatus::Completed);
    assert_eq!(report.completed, 400_000);
    assert_eq!(last.completed, report.completed);
    assert!(snapshots.len() <= 256);
}

/// Verifier accepting even seeds; odd seeds make the query fail.
struct EvenOnly {
    ready: AtomicBool,
    init_ok: bool,
}

impl HeightVerifier for EvenOnly {
    fn init(&self) -> Result<(), VerifierError> {
        if !self.init_ok {
            return Err(VerifierError::Init("world data missing".into()));
        }
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn verify(
        &self,
        seed: i64,
        _coordinate: Coordinate,
        _depth_floor: DepthFloor,
        _kind: HeightCheck,
    ) -> Result<bool, VerifierError> {
        if seed % 2 == 0 {
            Ok(true)
        } else {
            Err(VerifierError::Query(format!("seed {seed} unavailable")))
        }
    }
}

fn with_verifier(init_ok: bool) -> Vec<i64> {
    let out = SharedBuf::default();
    let mut services = sevens();
    services.verifier = Some(Arc::new(EvenOnly {
        ready: AtomicBool::new(false),
        init_ok,
    }));
    let mut req = request(range(0, 99), SeedKind::Full, OutputTarget::Stream(Box::new(out.clone())));
    req.height_check = Some(HeightCheck::Surface);
    let report = Scanner::start(req, services).unwrap().wait();
    assert_eq!(report.status, ScanStatus::Completed);
    let mut seeds = out.seeds();
    seeds.sort_unstable();
    seeds
}

#[test]
fn test_height_errors_reject_seed() {
    let expected: Vec<i64> = (0..100).filter(|s| s % 14 == 0).collect();
    assert_eq!(with_verifier(true), expected);
}

#[test]
fn test_uninitialized_verifier_passes_everything() {
    let expected: Vec<i64> = (0..100).filter(|s| s % 7 == 0).collect();
    assert_eq!(with_verifier(false), expected);
}
