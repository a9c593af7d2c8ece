//! Contracts for the pure collaborators the scanner consumes.
//!
//! Both traits are implemented for plain closures so tests can wire in
//! table-driven fakes without defining types.

use serde::{Deserialize, Serialize};

/// A named noise signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Climate temperature.
    Temperature,
    /// Climate humidity.
    Humidity,
    /// Terrain erosion.
    Erosion,
    /// Ridges / peaks-and-valleys.
    Ridge,
    /// Continentalness.
    Continentalness,
    /// Large cave entrance layer alone.
    EntranceA,
    /// Lower of the entrance layer and the spaghetti tunnels.
    EntranceB,
    /// Spaghetti tunnels alone, used below y = 0.
    EntranceC,
    /// Cheese cave density.
    Cheese,
    /// Aquifer floodedness.
    Aquifer,
}

impl Channel {
    /// Every channel.
    pub const ALL: [Self; 10] = [
        Self::Temperature,
        Self::Humidity,
        Self::Erosion,
        Self::Ridge,
        Self::Continentalness,
        Self::EntranceA,
        Self::EntranceB,
        Self::EntranceC,
        Self::Cheese,
        Self::Aquifer,
    ];
}

/// The fixed horizontal location a scan evaluates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    /// Block X.
    pub x: i32,
    /// Block Z.
    pub z: i32,
}

impl Coordinate {
    /// Largest accepted absolute value on either axis.
    pub const LIMIT: i32 = 30_000_000;

    /// Creates a coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Whether both axes lie within [`Self::LIMIT`].
    #[inline]
    #[must_use]
    pub const fn in_bounds(self) -> bool {
        self.x.unsigned_abs() <= Self::LIMIT as u32 && self.z.unsigned_abs() <= Self::LIMIT as u32
    }

    /// The coordinate shifted by `(dx, dz)`.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
        }
    }

    /// Block coordinates as sampling input.
    #[inline]
    #[must_use]
    pub fn block(self) -> (f64, f64) {
        (f64::from(self.x), f64::from(self.z))
    }

    /// Quarter-resolution coordinates used by climate channels.
    #[inline]
    #[must_use]
    pub fn quart(self) -> (f64, f64) {
        (f64::from(self.x) / 4.0, f64::from(self.z) / 4.0)
    }
}

/// Deterministic noise values per full seed.
pub trait NoiseSampleProvider: Send + Sync {
    /// Samples `channel` at `(x, y, z)` for `seed`. Must be pure.
    fn sample(&self, seed: i64, channel: Channel, x: f64, y: f64, z: f64) -> f64;
}

impl<F> NoiseSampleProvider for F
where
    F: Fn(i64, Channel, f64, f64, f64) -> f64 + Send + Sync,
{
    #[inline]
    fn sample(&self, seed: i64, channel: Channel, x: f64, y: f64, z: f64) -> f64 {
        self(seed, channel, x, y, z)
    }
}

/// Maps a compressed seed to the full seeds that could have produced it.
pub trait SeedSpaceExpander: Send + Sync {
    /// Finite, deterministic sequence of at most 65536 full seeds.
    fn expand(&self, compressed: i64) -> Box<dyn Iterator<Item = i64> + Send + '_>;
}

impl<F, I> SeedSpaceExpander for F
where
    F: Fn(i64) -> I + Send + Sync,
    I: Iterator<Item = i64> + Send + 'static,
{
    fn expand(&self, compressed: i64) -> Box<dyn Iterator<Item = i64> + Send + '_> {
        Box::new(self(compressed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_providers() {
        let sampler = |seed: i64, channel: Channel, x: f64, _y: f64, _z: f64| {
            if channel == Channel::Ridge {
                x
            } else {
                seed as f64
            }
        };
        assert!((sampler.sample(3, Channel::Cheese, 0.0, 0.0, 0.0) - 3.0).abs() < f64::EPSILON);
        assert!((sampler.sample(3, Channel::Ridge, 0.5, 0.0, 0.0) - 0.5).abs() < f64::EPSILON);

        let expander = |seed: i64| (0..3).map(move |i| seed * 10 + i);
        assert_eq!(expander.expand(4).collect::<Vec<_>>(), vec![40, 41, 42]);
    }

    #[test]
    fn test_coordinate_helpers() {
        let c = Coordinate::new(-8, 12);
        assert_eq!(c.quart(), (-2.0, 3.0));
        assert_eq!(c.offset(8, -6), Coordinate::new(0, 6));
        assert!(c.in_bounds());
        assert!(!Coordinate::new(30_000_001, 0).in_bounds());
    }
}
