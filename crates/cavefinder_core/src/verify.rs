//! # Height Verification Stage
//!
//! Optional second stage run on seeds the predicate engine accepted.
//!
//! The verifier itself is an injected collaborator with an explicit,
//! possibly failing, initialization step. [`HeightStage`] wraps it with the
//! scan's policy:
//!
//! - verifier not ready: the seed **passes** (warning logged once per scan)
//! - verifier returns an error: the seed **fails**

use crate::predicate::DepthFloor;
use crate::sampling::Coordinate;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Which geometric test to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightCheck {
    /// Column from the depth floor to y = 200 is entirely air.
    Surface,
    /// Column from the depth floor to y = 200 holds no solid block and some water.
    Underwater,
    /// Lowest open-column height over the footprint is non-negative.
    RangeMin,
    /// Mean open-column height over the footprint is non-negative.
    RangeAvg,
    /// Highest open-column height over the footprint is non-negative.
    RangeMax,
    /// Four probe columns around the coordinate match the bedrock signature.
    BedrockImpossibleColumns,
}

/// Failures reported by a height verifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifierError {
    /// One-time initialization failed.
    #[error("verifier initialization failed: {0}")]
    Init(String),
    /// A single query failed.
    #[error("height query failed: {0}")]
    Query(String),
}

/// Geometric verification engine.
pub trait HeightVerifier: Send + Sync {
    /// One-time setup. Safe to call again after success.
    fn init(&self) -> Result<(), VerifierError>;

    /// Whether [`init`](Self::init) has succeeded.
    fn is_ready(&self) -> bool;

    /// Runs `kind` for `seed` around `coordinate`.
    fn verify(
        &self,
        seed: i64,
        coordinate: Coordinate,
        depth_floor: DepthFloor,
        kind: HeightCheck,
    ) -> Result<bool, VerifierError>;
}

/// A verifier bound to one scan with its readiness policy.
pub struct HeightStage {
    verifier: Arc<dyn HeightVerifier>,
    coordinate: Coordinate,
    depth_floor: DepthFloor,
    kind: HeightCheck,
    warned_not_ready: AtomicBool,
}

impl HeightStage {
    /// Binds a verifier to the scan inputs.
    #[must_use]
    pub fn new(
        verifier: Arc<dyn HeightVerifier>,
        coordinate: Coordinate,
        depth_floor: DepthFloor,
        kind: HeightCheck,
    ) -> Self {
        Self {
            verifier,
            coordinate,
            depth_floor,
            kind,
            warned_not_ready: AtomicBool::new(false),
        }
    }

    /// Initializes the verifier if needed. Failure is logged, not returned:
    /// the scan proceeds and every seed passes this stage.
    pub fn prepare(&self) {
        if self.verifier.is_ready() {
            return;
        }
        match self.verifier.init() {
            Ok(()) => info!(kind = ?self.kind, "Height verifier initialized"),
            Err(e) => warn!(error = %e, "Height verifier unavailable; height checks will pass"),
        }
    }

    /// The configured check.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> HeightCheck {
        self.kind
    }

    /// Applies the readiness policy to one seed.
    pub fn passes(&self, seed: i64) -> bool {
        if !self.verifier.is_ready() {
            if !self.warned_not_ready.swap(true, Ordering::Relaxed) {
                warn!("Height verifier not initialized; skipping height checks");
            }
            return true;
        }
        match self
            .verifier
            .verify(seed, self.coordinate, self.depth_floor, self.kind)
        {
            Ok(pass) => pass,
            Err(e) => {
                error!(seed, error = %e, "Height check failed");
                false
            }
        }
    }
}
