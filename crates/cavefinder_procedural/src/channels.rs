//! # Noise Channels
//!
//! Maps every [`Channel`] the predicate engine asks for onto one or more
//! seeded [`DoubleNoise`] layers.
//!
//! Raw channels (climate, aquifer) are a single layer. The cave channels are
//! density formulas over several layers:
//!
//! ```text
//! EntranceA = entrance(0.75x, 0.5y, 0.75z) + 0.37 + clampedLerp(0.3, 0, (10 + y) / 40)
//! EntranceC = spaghetti tunnels + roughness
//! EntranceB = min(EntranceA, EntranceC)
//! Cheese    = 4 * layer(x, 8y, z)^2 + clamp(0.27 + cheese(x, y / 1.5, z), -1, 1)
//! ```
//!
//! Layers are built lazily per seed, so a seed rejected on its first check
//! never pays for the cave layers.

use std::cell::{OnceCell, RefCell};
use std::rc::Rc;

use cavefinder_core::{Channel, NoiseSampleProvider};

use crate::noise::{DoubleNoise, NoiseParams, WorldSeed};

/// One seeded noise layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NoiseKey {
    /// Climate temperature.
    Temperature,
    /// Climate vegetation, reported as humidity.
    Vegetation,
    /// Continentalness.
    Continentalness,
    /// Erosion.
    Erosion,
    /// Ridges.
    Ridge,
    /// Large cave entrances.
    CaveEntrance,
    /// Spaghetti tunnel scale selector.
    SpaghettiRarity,
    /// Spaghetti tunnel wall thickness.
    SpaghettiThickness,
    /// First spaghetti tunnel field.
    Spaghetti1,
    /// Second spaghetti tunnel field.
    Spaghetti2,
    /// Tunnel roughness strength.
    RoughnessModulator,
    /// Tunnel roughness.
    Roughness,
    /// Cheese cave layering.
    CaveLayer,
    /// Cheese caves.
    CaveCheese,
    /// Aquifer floodedness.
    Aquifer,
}

impl NoiseKey {
    /// Number of layers.
    pub const COUNT: usize = 15;

    /// Every layer.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Temperature,
        Self::Vegetation,
        Self::Continentalness,
        Self::Erosion,
        Self::Ridge,
        Self::CaveEntrance,
        Self::SpaghettiRarity,
        Self::SpaghettiThickness,
        Self::Spaghetti1,
        Self::Spaghetti2,
        Self::RoughnessModulator,
        Self::Roughness,
        Self::CaveLayer,
        Self::CaveCheese,
        Self::Aquifer,
    ];

    /// Octave shape of the layer.
    #[must_use]
    pub const fn params(self) -> NoiseParams {
        match self {
            Self::Temperature => NoiseParams::new(-10, &[1.5, 0.0, 1.0, 0.0, 0.0, 0.0]),
            Self::Vegetation => NoiseParams::new(-8, &[1.0, 1.0, 0.0, 0.0, 0.0, 0.0]),
            Self::Continentalness => {
                NoiseParams::new(-9, &[1.0, 1.0, 2.0, 2.0, 2.0, 1.0, 1.0, 1.0, 1.0])
            }
            Self::Erosion => NoiseParams::new(-9, &[1.0, 1.0, 0.0, 1.0, 1.0]),
            Self::Ridge => NoiseParams::new(-7, &[1.0, 2.0, 1.0, 0.0, 0.0, 0.0]),
            Self::CaveEntrance => NoiseParams::new(-7, &[0.4, 0.5, 1.0]),
            Self::SpaghettiRarity => NoiseParams::new(-11, &[1.0]),
            Self::SpaghettiThickness | Self::RoughnessModulator | Self::CaveLayer => {
                NoiseParams::new(-8, &[1.0])
            }
            Self::Spaghetti1 | Self::Spaghetti2 | Self::Aquifer => NoiseParams::new(-7, &[1.0]),
            Self::Roughness => NoiseParams::new(-5, &[1.0]),
            Self::CaveCheese => {
                NoiseParams::new(-8, &[0.5, 1.0, 2.0, 1.0, 2.0, 1.0, 0.0, 2.0, 0.0])
            }
        }
    }

    /// Sub-seed purpose; zero is left unused.
    #[inline]
    const fn purpose(self) -> u64 {
        self as u64 + 1
    }
}

/// Clamps `delta` to [0, 1] before interpolating.
#[inline]
#[must_use]
pub fn clamped_lerp(start: f64, end: f64, delta: f64) -> f64 {
    if delta < 0.0 {
        start
    } else if delta > 1.0 {
        end
    } else {
        start + delta * (end - start)
    }
}

/// Maps a noise value in [-1, 1] onto `[start, end]`.
#[inline]
#[must_use]
pub fn lerp_from_progress(value: f64, start: f64, end: f64) -> f64 {
    start + (value + 1.0) / 2.0 * (end - start)
}

/// Tunnel scale picked by the rarity layer.
#[inline]
#[must_use]
pub fn scale_tunnels(rarity: f64) -> f64 {
    if rarity < -0.5 {
        0.75
    } else if rarity < 0.0 {
        1.0
    } else if rarity < 0.5 {
        1.5
    } else {
        2.0
    }
}

/// Lazily built layers for one seed.
pub struct SeedNoises {
    seed: i64,
    root: WorldSeed,
    layers: [OnceCell<DoubleNoise>; NoiseKey::COUNT],
}

impl SeedNoises {
    /// Creates an empty set; layers are built on first use.
    #[must_use]
    pub fn new(seed: i64) -> Self {
        Self {
            seed,
            root: WorldSeed::from_signed(seed),
            layers: Default::default(),
        }
    }

    /// The seed these layers belong to.
    #[must_use]
    pub const fn seed(&self) -> i64 {
        self.seed
    }

    fn layer(&self, key: NoiseKey) -> &DoubleNoise {
        self.layers[key as usize]
            .get_or_init(|| DoubleNoise::new(self.root.derive(key.purpose()), key.params()))
    }

    /// Samples a single layer.
    #[inline]
    #[must_use]
    pub fn raw(&self, key: NoiseKey, x: f64, y: f64, z: f64) -> f64 {
        self.layer(key).sample(x, y, z)
    }

    /// Large cave entrance density.
    #[must_use]
    pub fn entrance_a(&self, x: f64, y: f64, z: f64) -> f64 {
        self.raw(NoiseKey::CaveEntrance, x * 0.75, y * 0.5, z * 0.75)
            + 0.37
            + clamped_lerp(0.3, 0.0, (10.0 + y) / 40.0)
    }

    /// Spaghetti tunnel density with roughness.
    #[must_use]
    pub fn entrance_c(&self, x: f64, y: f64, z: f64) -> f64 {
        let scale = scale_tunnels(self.raw(NoiseKey::SpaghettiRarity, x * 2.0, y, z * 2.0));
        let thickness =
            lerp_from_progress(self.raw(NoiseKey::SpaghettiThickness, x, y, z), 0.065, 0.088);
        let (sx, sy, sz) = (x / scale, y / scale, z / scale);
        let first = (scale * self.raw(NoiseKey::Spaghetti1, sx, sy, sz)).abs() - thickness;
        let second = (scale * self.raw(NoiseKey::Spaghetti2, sx, sy, sz)).abs() - thickness;
        let tunnels = first.max(second).clamp(-1.0, 1.0);
        let roughness = (-0.05 - 0.05 * self.raw(NoiseKey::RoughnessModulator, x, y, z))
            * (-0.4 + self.raw(NoiseKey::Roughness, x, y, z).abs());
        tunnels + roughness
    }

    /// Lower of the two entrance densities.
    #[must_use]
    pub fn entrance_b(&self, x: f64, y: f64, z: f64) -> f64 {
        self.entrance_a(x, y, z).min(self.entrance_c(x, y, z))
    }

    /// Cheese cave density.
    #[must_use]
    pub fn cheese(&self, x: f64, y: f64, z: f64) -> f64 {
        let layer = self.raw(NoiseKey::CaveLayer, x, y * 8.0, z);
        4.0 * layer * layer + (0.27 + self.raw(NoiseKey::CaveCheese, x, y / 1.5, z)).clamp(-1.0, 1.0)
    }

    /// Samples a predicate channel.
    #[must_use]
    pub fn channel(&self, channel: Channel, x: f64, y: f64, z: f64) -> f64 {
        match channel {
            Channel::Temperature => self.raw(NoiseKey::Temperature, x, y, z),
            Channel::Humidity => self.raw(NoiseKey::Vegetation, x, y, z),
            Channel::Erosion => self.raw(NoiseKey::Erosion, x, y, z),
            Channel::Ridge => self.raw(NoiseKey::Ridge, x, y, z),
            Channel::Continentalness => self.raw(NoiseKey::Continentalness, x, y, z),
            Channel::EntranceA => self.entrance_a(x, y, z),
            Channel::EntranceB => self.entrance_b(x, y, z),
            Channel::EntranceC => self.entrance_c(x, y, z),
            Channel::Cheese => self.cheese(x, y, z),
            Channel::Aquifer => self.raw(NoiseKey::Aquifer, x, y, z),
        }
    }
}

impl std::fmt::Debug for SeedNoises {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let built = self.layers.iter().filter(|cell| cell.get().is_some()).count();
        f.debug_struct("SeedNoises")
            .field("seed", &self.seed)
            .field("built_layers", &built)
            .finish()
    }
}

thread_local! {
    /// Layers of the seed this thread sampled last.
    static CURRENT: RefCell<Option<Rc<SeedNoises>>> = const { RefCell::new(None) };
}

/// Reference [`NoiseSampleProvider`] over [`SeedNoises`].
///
/// Workers evaluate one seed at a time, so each thread keeps the layers of
/// its most recent seed and rebuilds only when the seed changes.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoiseChannels;

impl NoiseChannels {
    /// Creates the provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Layers for `seed`, reusing this thread's cache when it matches.
    #[must_use]
    pub fn layers(&self, seed: i64) -> Rc<SeedNoises> {
        CURRENT.with(|current| {
            let mut current = current.borrow_mut();
            match current.as_ref() {
                Some(noises) if noises.seed() == seed => Rc::clone(noises),
                _ => {
                    let noises = Rc::new(SeedNoises::new(seed));
                    *current = Some(Rc::clone(&noises));
                    noises
                }
            }
        })
    }
}

impl NoiseSampleProvider for NoiseChannels {
    fn sample(&self, seed: i64, channel: Channel, x: f64, y: f64, z: f64) -> f64 {
        self.layers(seed).channel(channel, x, y, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helpers() {
        assert_eq!(clamped_lerp(0.3, 0.0, -1.0), 0.3);
        assert_eq!(clamped_lerp(0.3, 0.0, 2.0), 0.0);
        assert!((clamped_lerp(0.3, 0.0, 0.5) - 0.15).abs() < 1e-12);

        assert_eq!(lerp_from_progress(-1.0, 0.065, 0.088), 0.065);
        assert!((lerp_from_progress(1.0, 0.065, 0.088) - 0.088).abs() < 1e-12);

        assert_eq!(scale_tunnels(-0.9), 0.75);
        assert_eq!(scale_tunnels(-0.5), 1.0);
        assert_eq!(scale_tunnels(0.0), 1.5);
        assert_eq!(scale_tunnels(0.5), 2.0);
    }

    #[test]
    fn test_purposes_unique() {
        let mut purposes: Vec<u64> = NoiseKey::ALL.iter().map(|k| k.purpose()).collect();
        purposes.sort_unstable();
        purposes.dedup();
        assert_eq!(purposes.len(), NoiseKey::COUNT);
        assert!(!purposes.contains(&0));
    }

    #[test]
    fn test_entrance_b_is_minimum() {
        let noises = SeedNoises::new(-4_172_144_997_902_289_642);
        for y in [-40.0, -10.0, 0.0, 30.0, 60.0] {
            let a = noises.entrance_a(120.0, y, -340.0);
            let c = noises.entrance_c(120.0, y, -340.0);
            assert_eq!(noises.entrance_b(120.0, y, -340.0), a.min(c));
        }
    }

    #[test]
    fn test_layers_built_lazily() {
        let noises = SeedNoises::new(99);
        let _ = noises.channel(Channel::Ridge, 10.0, 0.0, 10.0);
        assert_eq!(noises.layers.iter().filter(|c| c.get().is_some()).count(), 1);

        let _ = noises.cheese(10.0, -20.0, 10.0);
        assert_eq!(noises.layers.iter().filter(|c| c.get().is_some()).count(), 3);
    }

    #[test]
    fn test_cheese_bounded_below() {
        let noises = SeedNoises::new(5);
        for i in 0..200 {
            let v = noises.cheese(f64::from(i) * 7.0, f64::from(i % 100) - 50.0, 3.0);
            assert!(v >= -1.0, "cheese {v} below -1");
        }
    }

    #[test]
    fn test_provider_matches_fresh_layers() {
        let provider = NoiseChannels::new();
        for seed in [1i64, 2, 1, -7] {
            let fresh = SeedNoises::new(seed);
            for channel in Channel::ALL {
                let expected = fresh.channel(channel, 64.0, 30.0, -16.0);
                let got = provider.sample(seed, channel, 64.0, 30.0, -16.0);
                assert_eq!(got.to_bits(), expected.to_bits(), "{channel:?} for {seed}");
            }
        }
    }

    #[test]
    fn test_thread_cache_tracks_latest_seed() {
        let provider = NoiseChannels::new();
        let first = provider.layers(11);
        let again = provider.layers(11);
        assert!(Rc::ptr_eq(&first, &again));
        let other = provider.layers(12);
        assert!(!Rc::ptr_eq(&first, &other));
        assert_eq!(other.seed(), 12);
    }
}
