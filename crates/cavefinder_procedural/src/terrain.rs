//! Voxel terrain derived from the noise channels.
//!
//! A coarse stand-in for a full world generator: a height field from
//! continentalness and erosion, a sea level, a solid floor, and cave
//! carving wherever an entrance or cheese density goes negative.

use crate::channels::{NoiseChannels, NoiseKey};

/// Contents of one voxel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Voxel {
    /// Open space.
    Air,
    /// Open space below sea level.
    Water,
    /// Anything that blocks a column.
    Solid,
}

impl Voxel {
    /// Air or water.
    #[inline]
    #[must_use]
    pub const fn is_open(self) -> bool {
        !matches!(self, Self::Solid)
    }
}

/// Answers voxel queries for a world seed.
pub trait VoxelOracle: Send + Sync {
    /// The voxel at block `(x, y, z)`. Must be deterministic.
    fn voxel(&self, seed: i64, x: i32, y: i32, z: i32) -> Voxel;
}

impl<F> VoxelOracle for F
where
    F: Fn(i64, i32, i32, i32) -> Voxel + Send + Sync,
{
    #[inline]
    fn voxel(&self, seed: i64, x: i32, y: i32, z: i32) -> Voxel {
        self(seed, x, y, z)
    }
}

/// Water fills open space up to this height.
pub const SEA_LEVEL: i32 = 63;

/// Everything at or below this height is solid.
pub const FLOOR_TOP: i32 = -60;

/// Surface height for continentalness 0 and erosion 0.
const BASE_HEIGHT: f64 = 63.0;
const CONTINENTAL_RELIEF: f64 = 48.0;
const EROSION_RELIEF: f64 = 16.0;

/// [`VoxelOracle`] over [`NoiseChannels`].
#[derive(Clone, Copy, Debug, Default)]
pub struct NoiseTerrain {
    channels: NoiseChannels,
}

impl NoiseTerrain {
    /// Creates the oracle.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            channels: NoiseChannels::new(),
        }
    }

    /// Highest terrain block of column `(x, z)` before carving.
    #[must_use]
    pub fn surface(&self, seed: i64, x: i32, z: i32) -> i32 {
        let layers = self.channels.layers(seed);
        let (qx, qz) = (f64::from(x) / 4.0, f64::from(z) / 4.0);
        let continentalness = layers.raw(NoiseKey::Continentalness, qx, 0.0, qz);
        let erosion = layers.raw(NoiseKey::Erosion, qx, 0.0, qz);
        (BASE_HEIGHT + CONTINENTAL_RELIEF * continentalness - EROSION_RELIEF * erosion).round()
            as i32
    }
}

impl VoxelOracle for NoiseTerrain {
    fn voxel(&self, seed: i64, x: i32, y: i32, z: i32) -> Voxel {
        if y <= FLOOR_TOP {
            return Voxel::Solid;
        }
        if y > self.surface(seed, x, z) {
            return if y <= SEA_LEVEL { Voxel::Water } else { Voxel::Air };
        }
        let layers = self.channels.layers(seed);
        let (bx, by, bz) = (f64::from(x), f64::from(y), f64::from(z));
        if layers.entrance_b(bx, by, bz) < 0.0 || layers.cheese(bx, by, bz) < 0.0 {
            Voxel::Air
        } else {
            Voxel::Solid
        }
    }
}
