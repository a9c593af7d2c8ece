//! # Column Height Verifier
//!
//! [`HeightVerifier`] implemented by counting voxels of a [`VoxelOracle`]
//! in 1x1 columns.
//!
//! ## Checks
//!
//! - `Surface`: every voxel in `[depth_floor, 200)` at the coordinate is air
//! - `Underwater`: no solid voxel in that column and at least one water voxel
//! - `BedrockImpossibleColumns`: four probe columns over `[-54, 200)`; the
//!   first three need at least 254 air voxels, the last exactly 254
//! - `RangeMin` / `RangeAvg` / `RangeMax`: over the footprint, each column
//!   with a solid voxel in `[depth_floor, 200)` contributes the height just
//!   above its topmost solid voxel; the aggregate must be non-negative

use std::sync::OnceLock;

use cavefinder_core::{Coordinate, DepthFloor, HeightCheck, HeightVerifier, VerifierError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::terrain::{Voxel, VoxelOracle};

/// Exclusive top of every column query.
pub const COLUMN_TOP: i32 = 200;

/// Bottom of the bedrock probe columns.
pub const PROBE_BOTTOM: i32 = -54;

/// Air voxels a probe column holds when it is fully open.
pub const PROBE_AIR: u32 = (COLUMN_TOP - PROBE_BOTTOM) as u32;

/// Probe offsets `(dx, dz)`; the last one must match exactly.
pub const PROBE_OFFSETS: [(i32, i32); 4] = [(8, 6), (-8, -6), (8, -6), (-8, 6)];

/// Horizontal offsets scanned by the range checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RangeFootprint {
    /// Lowest X offset.
    pub min_dx: i32,
    /// Highest X offset.
    pub max_dx: i32,
    /// Lowest Z offset.
    pub min_dz: i32,
    /// Highest Z offset.
    pub max_dz: i32,
}

impl RangeFootprint {
    /// Largest absolute offset on either axis.
    pub const REACH: i32 = 16;

    /// Creates a footprint.
    #[must_use]
    pub const fn new(min_dx: i32, max_dx: i32, min_dz: i32, max_dz: i32) -> Self {
        Self {
            min_dx,
            max_dx,
            min_dz,
            max_dz,
        }
    }

    /// Offsets clamped to [`Self::REACH`].
    #[must_use]
    pub fn clamped(self) -> Self {
        let clamp = |v: i32| v.clamp(-Self::REACH, Self::REACH);
        Self::new(
            clamp(self.min_dx),
            clamp(self.max_dx),
            clamp(self.min_dz),
            clamp(self.max_dz),
        )
    }

    /// Clamps, then requires `min < max` on both axes.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::Init`] for an empty or inverted footprint.
    pub fn validated(self) -> Result<Self, VerifierError> {
        let clamped = self.clamped();
        if clamped.min_dx >= clamped.max_dx || clamped.min_dz >= clamped.max_dz {
            return Err(VerifierError::Init(format!(
                "footprint x {}..{} z {}..{} is empty after clamping to +/-{}",
                clamped.min_dx,
                clamped.max_dx,
                clamped.min_dz,
                clamped.max_dz,
                Self::REACH
            )));
        }
        Ok(clamped)
    }

    fn columns(self) -> impl Iterator<Item = (i32, i32)> {
        (self.min_dx..=self.max_dx)
            .flat_map(move |dx| (self.min_dz..=self.max_dz).map(move |dz| (dx, dz)))
    }
}

impl Default for RangeFootprint {
    fn default() -> Self {
        Self::new(-8, 8, -8, 8)
    }
}

#[derive(Clone, Copy)]
enum Aggregate {
    Min,
    Avg,
    Max,
}

/// [`HeightVerifier`] over a [`VoxelOracle`].
#[derive(Debug)]
pub struct ColumnVerifier<O> {
    oracle: O,
    requested: RangeFootprint,
    footprint: OnceLock<RangeFootprint>,
}

impl<O: VoxelOracle> ColumnVerifier<O> {
    /// Creates an uninitialized verifier with the default footprint.
    #[must_use]
    pub fn new(oracle: O) -> Self {
        Self::with_footprint(oracle, RangeFootprint::default())
    }

    /// Creates an uninitialized verifier; the footprint is checked by `init`.
    #[must_use]
    pub fn with_footprint(oracle: O, footprint: RangeFootprint) -> Self {
        Self {
            oracle,
            requested: footprint,
            footprint: OnceLock::new(),
        }
    }

    /// Air voxels in column `(x, z)` over `[bottom, COLUMN_TOP)`.
    fn air(&self, seed: i64, x: i32, z: i32, bottom: i32) -> u32 {
        (bottom..COLUMN_TOP)
            .filter(|&y| self.oracle.voxel(seed, x, y, z) == Voxel::Air)
            .count() as u32
    }

    fn surface(&self, seed: i64, at: Coordinate, depth: i32) -> bool {
        self.air(seed, at.x, at.z, depth) == (COLUMN_TOP - depth) as u32
    }

    fn underwater(&self, seed: i64, at: Coordinate, depth: i32) -> bool {
        let mut water = false;
        for y in depth..COLUMN_TOP {
            match self.oracle.voxel(seed, at.x, y, at.z) {
                Voxel::Solid => return false,
                Voxel::Water => water = true,
                Voxel::Air => {}
            }
        }
        water
    }

    fn probe(&self, seed: i64, at: Coordinate, (dx, dz): (i32, i32)) -> u32 {
        let column = at.offset(dx, dz);
        self.air(seed, column.x, column.z, PROBE_BOTTOM)
    }

    fn bedrock(&self, seed: i64, at: Coordinate) -> bool {
        let [first, second, third, last] = PROBE_OFFSETS;
        [first, second, third]
            .into_iter()
            .all(|offset| self.probe(seed, at, offset) >= PROBE_AIR)
            && self.probe(seed, at, last) == PROBE_AIR
    }

    /// Height just above the topmost solid voxel, if any lies in `[depth, COLUMN_TOP)`.
    fn column_height(&self, seed: i64, x: i32, z: i32, depth: i32) -> Option<i32> {
        (depth..COLUMN_TOP)
            .rev()
            .find(|&y| self.oracle.voxel(seed, x, y, z) == Voxel::Solid)
            .map(|y| y + 1)
    }

    fn range(
        &self,
        seed: i64,
        at: Coordinate,
        depth: i32,
        footprint: RangeFootprint,
        aggregate: Aggregate,
    ) -> bool {
        let heights: Vec<i32> = footprint
            .columns()
            .filter_map(|(dx, dz)| {
                let column = at.offset(dx, dz);
                self.column_height(seed, column.x, column.z, depth)
            })
            .collect();
        if heights.is_empty() {
            return false;
        }
        let value = match aggregate {
            Aggregate::Min => heights.iter().copied().min().map_or(-1.0, f64::from),
            Aggregate::Max => heights.iter().copied().max().map_or(-1.0, f64::from),
            Aggregate::Avg => {
                heights.iter().map(|&h| f64::from(h)).sum::<f64>() / heights.len() as f64
            }
        };
        value >= 0.0
    }
}

impl<O: VoxelOracle> HeightVerifier for ColumnVerifier<O> {
    fn init(&self) -> Result<(), VerifierError> {
        if self.footprint.get().is_some() {
            return Ok(());
        }
        let footprint = self.requested.validated()?;
        if self.footprint.set(footprint).is_ok() {
            debug!(?footprint, "Column verifier ready");
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.footprint.get().is_some()
    }

    fn verify(
        &self,
        seed: i64,
        coordinate: Coordinate,
        depth_floor: DepthFloor,
        kind: HeightCheck,
    ) -> Result<bool, VerifierError> {
        let footprint = *self
            .footprint
            .get()
            .ok_or_else(|| VerifierError::Query("column verifier is not initialized".into()))?;
        if !coordinate.in_bounds() {
            return Err(VerifierError::Query(format!(
                "coordinate ({}, {}) is outside the world",
                coordinate.x, coordinate.z
            )));
        }
        let depth = depth_floor.get();
        Ok(match kind {
            HeightCheck::Surface => self.surface(seed, coordinate, depth),
            HeightCheck::Underwater => self.underwater(seed, coordinate, depth),
            HeightCheck::BedrockImpossibleColumns => self.bedrock(seed, coordinate),
            HeightCheck::RangeMin => self.range(seed, coordinate, depth, footprint, Aggregate::Min),
            HeightCheck::RangeAvg => self.range(seed, coordinate, depth, footprint, Aggregate::Avg),
            HeightCheck::RangeMax => self.range(seed, coordinate, depth, footprint, Aggregate::Max),
        })
    }
}
