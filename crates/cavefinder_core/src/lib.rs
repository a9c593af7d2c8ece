//! # Cavefinder Core
//!
//! Concurrent seed-scanning engine.
//!
//! ## Design Principles
//!
//! 1. **Pure evaluation** - A seed's verdict depends only on (seed, coordinate, parameters)
//! 2. **Bounded memory** - Huge ranges run as sequential segments on fresh pools
//! 3. **Durable output** - Every match is flushed before the worker moves on
//! 4. **Cooperative cancellation** - One token, checked between units and between seeds
//!
//! ## Pipeline
//!
//! ```text
//! ScanRequest -> validate -> segments -> WorkerPool -> PredicateEngine
//!                                                   -> HeightStage (optional)
//!                                                   -> ResultSink
//!                                                   -> ProgressTracker
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use cavefinder_core::{Scanner, ScanRequest, ScanServices};
//!
//! let handle = Scanner::start(request, services)?;
//! for snapshot in handle.subscribe_progress() {
//!     eprintln!("{snapshot}");
//! }
//! let report = handle.wait();
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod params;
pub mod pool;
pub mod predicate;
pub mod progress;
pub mod sampling;
pub mod scan;
pub mod seed;
pub mod sink;
pub mod verify;

pub use error::{ScanError, ScanResult, SinkError};
pub use params::{check_value, ConditionKind, Parameter, ParameterSet, ParameterSpec};
pub use pool::{CancelToken, WorkerPool};
pub use predicate::{DepthFloor, FilterMode, PredicateEngine};
pub use progress::{format_elapsed, format_rate, ProgressSnapshot, ProgressTracker};
pub use sampling::{Channel, Coordinate, NoiseSampleProvider, SeedSpaceExpander};
pub use scan::{ScanHandle, ScanReport, ScanRequest, ScanServices, ScanStatus, Scanner, SeedSource};
pub use seed::{SeedKind, SeedList, SeedRange, WorkUnit, EXPANSION_FACTOR, FULL_SEED_BATCH};
pub use sink::{prepare_output, OutputTarget, ResultSink};
pub use verify::{HeightCheck, HeightStage, HeightVerifier, VerifierError};
