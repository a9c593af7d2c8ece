//! # Predicate Engine
//!
//! Decides whether a single full seed satisfies the configured filter at the
//! scan coordinate.
//!
//! ## Evaluation order
//!
//! Checks are ordered so the cheapest and most selective ones run first, and
//! the engine returns on the first failure. Sampling is skipped entirely for
//! disabled parameters.
//!
//! | Step | Normal mode | `entrance1_only` |
//! |------|-------------|------------------|
//! | 1 | temperature, humidity | same |
//! | 2 | erosion, ridge | deferred to step 5 |
//! | 3 | entrance at y = 60, 50 | entrance A at y = 60, 50 |
//! | 4 | entrance OR cheese per depth | cheese only below 0 |
//! | 5 | - | erosion, ridge |
//! | 6 | continentalness | same |
//! | 7 | aquifer per depth | same |
//!
//! Bedrock-impossible mode ignores the user thresholds and applies a fixed
//! signature instead.

use crate::error::ScanError;
use crate::params::{Parameter, ParameterSet};
use crate::sampling::{Channel, Coordinate, NoiseSampleProvider};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Lowest cave height examined. One of `-50, -40, .., 0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct DepthFloor(i32);

impl DepthFloor {
    /// Accepted floors.
    pub const ALLOWED: [i32; 6] = [-50, -40, -30, -20, -10, 0];
    /// Height step between examined layers.
    pub const STEP: usize = 10;

    /// Validates and wraps a floor.
    pub fn new(y: i32) -> Result<Self, ScanError> {
        if Self::ALLOWED.contains(&y) {
            Ok(Self(y))
        } else {
            Err(ScanError::InvalidRequest(format!(
                "depth floor {y} is not one of {:?}",
                Self::ALLOWED
            )))
        }
    }

    /// The floor height.
    #[inline]
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Heights from the floor up to `top` inclusive, every ten blocks.
    #[inline]
    pub fn heights_to(self, top: i32) -> impl Iterator<Item = i32> {
        (self.0..=top).step_by(Self::STEP)
    }
}

impl Default for DepthFloor {
    fn default() -> Self {
        Self(-50)
    }
}

impl TryFrom<i32> for DepthFloor {
    type Error = ScanError;

    fn try_from(y: i32) -> Result<Self, Self::Error> {
        Self::new(y)
    }
}

impl From<DepthFloor> for i32 {
    fn from(depth: DepthFloor) -> Self {
        depth.0
    }
}

impl fmt::Display for DepthFloor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which predicate family a scan applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// User thresholds, ordered for early rejection.
    Normal {
        /// Restrict entrance checks to variant A and defer erosion/ridge.
        entrance1_only: bool,
    },
    /// Fixed signature of seeds whose cave layout cannot occur on the other
    /// edition. Only the aquifer enable flag of the parameter set is read.
    BedrockImpossible,
}

impl Default for FilterMode {
    fn default() -> Self {
        Self::Normal {
            entrance1_only: false,
        }
    }
}

/// Heights checked before the depth loop, in order.
const FIXED_ENTRANCE_HEIGHTS: [i32; 2] = [60, 50];
/// Top of the entrance/cheese depth loop.
const CAVE_TOP: i32 = 40;
/// Top of the aquifer depth loop.
const AQUIFER_TOP: i32 = 60;
/// Vertical squash applied to aquifer sample heights.
const AQUIFER_Y_SCALE: f64 = 0.67;

mod bedrock {
    /// Entrance A at y = 45 above this rejects.
    pub const ENTRANCE_45_MAX: f64 = 0.0;
    /// Offsets probed for entrance A at y = 55.
    pub const ENTRANCE_55_OFFSETS: [(i32, i32); 5] = [(0, 0), (5, 0), (-5, 0), (0, 5), (0, -5)];
    /// `(y, ceiling)`: cheese at or above the ceiling rejects.
    pub const CHEESE_CEILINGS: [(i32, f64); 7] = [
        (-50, -0.2),
        (10, -0.05),
        (0, -0.05),
        (-10, -0.05),
        (-20, -0.1),
        (-30, -0.13),
        (-40, -0.13),
    ];
    /// `(y, cheese ceiling)`: entrance B >= 0 together with cheese at or above the ceiling rejects.
    pub const SEALED_LAYERS: [(i32, f64); 3] = [(40, 0.0), (30, -0.05), (20, -0.05)];
    /// Ridge strictly inside `(-R, R)` rejects.
    pub const RIDGE_DEAD_ZONE: f64 = 0.15;
    /// Continentalness below this rejects.
    pub const CONTINENTALNESS_MIN: f64 = -0.12;
    /// Aquifer above this rejects.
    pub const AQUIFER_MAX: f64 = 0.4;
}

/// Seed filter bound to one scan's coordinate, parameters and mode.
///
/// Evaluation is a pure function of the seed; the engine is shared
/// read-only across workers.
#[derive(Clone)]
pub struct PredicateEngine {
    sampler: Arc<dyn NoiseSampleProvider>,
    coordinate: Coordinate,
    params: ParameterSet,
    depth_floor: DepthFloor,
    mode: FilterMode,
}

impl fmt::Debug for PredicateEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateEngine")
            .field("coordinate", &self.coordinate)
            .field("params", &self.params)
            .field("depth_floor", &self.depth_floor)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl PredicateEngine {
    /// Binds a sampler to a scan's fixed inputs.
    #[must_use]
    pub fn new(
        sampler: Arc<dyn NoiseSampleProvider>,
        coordinate: Coordinate,
        params: ParameterSet,
        depth_floor: DepthFloor,
        mode: FilterMode,
    ) -> Self {
        Self {
            sampler,
            coordinate,
            params,
            depth_floor,
            mode,
        }
    }

    /// The configured mode.
    #[inline]
    #[must_use]
    pub const fn mode(&self) -> FilterMode {
        self.mode
    }

    /// Returns `true` if the seed passes every enabled check.
    #[must_use]
    pub fn evaluate(&self, seed: i64) -> bool {
        match self.mode {
            FilterMode::Normal { entrance1_only } => self.evaluate_normal(seed, entrance1_only),
            FilterMode::BedrockImpossible => self.evaluate_bedrock(seed),
        }
    }

    #[inline]
    fn block(&self, seed: i64, channel: Channel, dx: i32, y: i32, dz: i32) -> f64 {
        let (x, z) = self.coordinate.offset(dx, dz).block();
        self.sampler.sample(seed, channel, x, f64::from(y), z)
    }

    #[inline]
    fn climate(&self, seed: i64, channel: Channel) -> f64 {
        let (x, z) = self.coordinate.quart();
        self.sampler.sample(seed, channel, x, 0.0, z)
    }

    /// Samples a climate channel only when its parameter is enabled.
    #[inline]
    fn climate_passes(&self, seed: i64, parameter: Parameter, channel: Channel) -> bool {
        !self.params.is_enabled(parameter)
            || self.params.check(parameter, self.climate(seed, channel))
    }

    #[inline]
    fn cave_passes(&self, seed: i64, parameter: Parameter, channel: Channel, y: i32) -> bool {
        !self.params.is_enabled(parameter)
            || self.params.check(parameter, self.block(seed, channel, 0, y, 0))
    }

    fn evaluate_normal(&self, seed: i64, entrance1_only: bool) -> bool {
        if !self.climate_passes(seed, Parameter::Temperature, Channel::Temperature)
            || !self.climate_passes(seed, Parameter::Humidity, Channel::Humidity)
        {
            return false;
        }

        let terrain_passes = |engine: &Self| {
            engine.climate_passes(seed, Parameter::Erosion, Channel::Erosion)
                && engine.climate_passes(seed, Parameter::Ridge, Channel::Ridge)
        };
        if !entrance1_only && !terrain_passes(self) {
            return false;
        }

        let entrance = if entrance1_only {
            Channel::EntranceA
        } else {
            Channel::EntranceB
        };
        for y in FIXED_ENTRANCE_HEIGHTS {
            if !self.cave_passes(seed, Parameter::Entrance, entrance, y) {
                return false;
            }
        }

        for y in self.depth_floor.heights_to(CAVE_TOP) {
            let layer_open = if y >= 0 {
                self.cave_passes(seed, Parameter::Entrance, entrance, y)
                    || self.cave_passes(seed, Parameter::Cheese, Channel::Cheese, y)
            } else if entrance1_only {
                self.cave_passes(seed, Parameter::Cheese, Channel::Cheese, y)
            } else {
                self.cave_passes(seed, Parameter::Entrance, Channel::EntranceC, y)
                    || self.cave_passes(seed, Parameter::Cheese, Channel::Cheese, y)
            };
            if !layer_open {
                return false;
            }
        }

        if entrance1_only && !terrain_passes(self) {
            return false;
        }

        if !self.climate_passes(seed, Parameter::Continentalness, Channel::Continentalness) {
            return false;
        }

        if self.params.is_enabled(Parameter::Aquifer) {
            let (x, z) = self.coordinate.block();
            for y in self.depth_floor.heights_to(AQUIFER_TOP) {
                let value = self
                    .sampler
                    .sample(seed, Channel::Aquifer, x, f64::from(y) * AQUIFER_Y_SCALE, z);
                if !self.params.check(Parameter::Aquifer, value) {
                    return false;
                }
            }
        }

        true
    }

    fn evaluate_bedrock(&self, seed: i64) -> bool {
        if self.block(seed, Channel::EntranceA, 0, 45, 0) > bedrock::ENTRANCE_45_MAX {
            return false;
        }
        for (dx, dz) in bedrock::ENTRANCE_55_OFFSETS {
            if self.block(seed, Channel::EntranceA, dx, 55, dz) >= 0.0 {
                return false;
            }
        }
        for (y, ceiling) in bedrock::CHEESE_CEILINGS {
            if self.block(seed, Channel::Cheese, 0, y, 0) >= ceiling {
                return false;
            }
        }
        for (y, ceiling) in bedrock::SEALED_LAYERS {
            if self.block(seed, Channel::EntranceB, 0, y, 0) >= 0.0
                && self.block(seed, Channel::Cheese, 0, y, 0) >= ceiling
            {
                return false;
            }
        }

        let ridge = self.climate(seed, Channel::Ridge);
        if ridge > -bedrock::RIDGE_DEAD_ZONE && ridge < bedrock::RIDGE_DEAD_ZONE {
            return false;
        }
        if self.climate(seed, Channel::Continentalness) < bedrock::CONTINENTALNESS_MIN {
            return false;
        }

        if self.params.is_enabled(Parameter::Aquifer) {
            let (x, z) = self.coordinate.quart();
            for y in self.depth_floor.heights_to(AQUIFER_TOP) {
                let value = self
                    .sampler
                    .sample(seed, Channel::Aquifer, x, f64::from(y) * AQUIFER_Y_SCALE, z);
                if value > bedrock::AQUIFER_MAX {
                    return false;
                }
            }
        }

        true
    }
}
