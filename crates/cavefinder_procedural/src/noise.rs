//! # Gradient Noise
//!
//! Deterministic 3D improved-Perlin noise with octave stacking.
//!
//! ## Layers
//!
//! - [`PerlinNoise`]: one lattice, values roughly in [-1, 1]
//! - [`OctaveNoise`]: a weighted sum of lattices at doubling frequency
//! - [`DoubleNoise`]: two octave stacks, the second at an irrational
//!   frequency offset, which hides lattice alignment artifacts
//!
//! ## Determinism Guarantee
//!
//! Given the same `WorldSeed`, this implementation will produce
//! **exactly** the same values on any platform, any time.

/// Seed for deterministic noise construction.
///
/// All noise layers derive from this seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorldSeed(u64);

impl WorldSeed {
    /// Creates a seed from raw bits.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Reinterprets a signed scan seed.
    #[inline]
    #[must_use]
    pub const fn from_signed(seed: i64) -> Self {
        Self(seed as u64)
    }

    /// Returns the raw seed value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Derives an independent sub-seed for a specific purpose.
    #[inline]
    #[must_use]
    pub const fn derive(self, purpose: u64) -> Self {
        let mut hash = self.0;
        hash ^= purpose.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        hash = hash.wrapping_mul(0x517c_c1b7_2722_0a95);
        hash ^= hash >> 32;
        Self(hash)
    }

    fn rng(self) -> SeedRng {
        // xorshift must never start at zero
        SeedRng(self.0 | 1)
    }
}

/// xorshift64 stream used only while building tables.
struct SeedRng(u64);

impl SeedRng {
    #[inline]
    fn next_u64(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    /// Uniform value in `[0, 1)`.
    #[inline]
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Gradient directions: the 12 cube-edge midpoints, padded to 16.
const GRADIENTS: [[f64; 3]; 16] = [
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
    [1.0, -1.0, 0.0],
    [-1.0, -1.0, 0.0],
    [1.0, 0.0, 1.0],
    [-1.0, 0.0, 1.0],
    [1.0, 0.0, -1.0],
    [-1.0, 0.0, -1.0],
    [0.0, 1.0, 1.0],
    [0.0, -1.0, 1.0],
    [0.0, 1.0, -1.0],
    [0.0, -1.0, -1.0],
    [1.0, 1.0, 0.0],
    [0.0, -1.0, 1.0],
    [-1.0, 1.0, 0.0],
    [0.0, -1.0, -1.0],
];

/// Coordinates are wrapped to this period to keep f64 precision far from the origin.
const PRECISION_PERIOD: f64 = 33_554_432.0;

#[inline]
fn wrap(value: f64) -> f64 {
    value - (value / PRECISION_PERIOD + 0.5).floor() * PRECISION_PERIOD
}

#[inline]
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

/// Single-lattice 3D gradient noise.
#[derive(Clone, Debug)]
pub struct PerlinNoise {
    /// 512-entry permutation table (256 entries, doubled for overflow handling).
    perm: [u8; 512],
    /// Random lattice offset applied to every input.
    origin: [f64; 3],
}

impl PerlinNoise {
    /// Builds the permutation table and origin from a seed.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        let mut rng = seed.rng();
        let origin = [
            rng.next_f64() * 256.0,
            rng.next_f64() * 256.0,
            rng.next_f64() * 256.0,
        ];

        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().take(256).enumerate() {
            *slot = i as u8;
        }
        // Fisher-Yates shuffle
        for i in (1..256).rev() {
            let j = (rng.next_u64() % (i as u64 + 1)) as usize;
            perm.swap(i, j);
        }
        perm.copy_within(0..256, 256);

        Self { perm, origin }
    }

    #[inline]
    fn hash(&self, index: i32) -> i32 {
        i32::from(self.perm[(index & 255) as usize])
    }

    #[inline]
    fn grad(hash: i32, x: f64, y: f64, z: f64) -> f64 {
        let g = GRADIENTS[(hash & 15) as usize];
        g[0] * x + g[1] * y + g[2] * z
    }

    /// Samples the lattice at `(x, y, z)`.
    #[must_use]
    pub fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        let x = x + self.origin[0];
        let y = y + self.origin[1];
        let z = z + self.origin[2];
        let (fx, fy, fz) = (x.floor(), y.floor(), z.floor());
        let (xi, yi, zi) = (fx as i32 & 255, fy as i32 & 255, fz as i32 & 255);
        let (dx, dy, dz) = (x - fx, y - fy, z - fz);

        let a = self.hash(xi) + yi;
        let b = self.hash(xi + 1) + yi;
        let aa = self.hash(a) + zi;
        let ab = self.hash(a + 1) + zi;
        let ba = self.hash(b) + zi;
        let bb = self.hash(b + 1) + zi;

        let g000 = Self::grad(self.hash(aa), dx, dy, dz);
        let g100 = Self::grad(self.hash(ba), dx - 1.0, dy, dz);
        let g010 = Self::grad(self.hash(ab), dx, dy - 1.0, dz);
        let g110 = Self::grad(self.hash(bb), dx - 1.0, dy - 1.0, dz);
        let g001 = Self::grad(self.hash(aa + 1), dx, dy, dz - 1.0);
        let g101 = Self::grad(self.hash(ba + 1), dx - 1.0, dy, dz - 1.0);
        let g011 = Self::grad(self.hash(ab + 1), dx, dy - 1.0, dz - 1.0);
        let g111 = Self::grad(self.hash(bb + 1), dx - 1.0, dy - 1.0, dz - 1.0);

        let (u, v, w) = (fade(dx), fade(dy), fade(dz));
        lerp(
            w,
            lerp(v, lerp(u, g000, g100), lerp(u, g010, g110)),
            lerp(v, lerp(u, g001, g101), lerp(u, g011, g111)),
        )
    }
}

/// Shape of an octave stack.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseParams {
    /// Base-two exponent of the lowest frequency.
    pub first_octave: i32,
    /// Weight per octave; zero weights skip the octave.
    pub amplitudes: &'static [f64],
}

impl NoiseParams {
    /// Creates the parameters.
    #[must_use]
    pub const fn new(first_octave: i32, amplitudes: &'static [f64]) -> Self {
        Self {
            first_octave,
            amplitudes,
        }
    }

    /// Octaves between the first and last non-zero weight.
    fn span(&self) -> usize {
        let first = self.amplitudes.iter().position(|&a| a != 0.0);
        let last = self.amplitudes.iter().rposition(|&a| a != 0.0);
        match (first, last) {
            (Some(first), Some(last)) => last - first,
            _ => 0,
        }
    }
}

/// Weighted sum of lattices at doubling frequency.
#[derive(Clone, Debug)]
pub struct OctaveNoise {
    octaves: Vec<Option<(f64, PerlinNoise)>>,
    lowest_frequency: f64,
    highest_amplitude: f64,
}

impl OctaveNoise {
    /// Builds one lattice per non-zero weight.
    #[must_use]
    pub fn new(seed: WorldSeed, params: NoiseParams) -> Self {
        let count = params.amplitudes.len();
        let octaves = params
            .amplitudes
            .iter()
            .enumerate()
            .map(|(i, &amplitude)| {
                (amplitude != 0.0).then(|| (amplitude, PerlinNoise::new(seed.derive(i as u64))))
            })
            .collect();
        let doubling = 2f64.powi(count as i32);
        Self {
            octaves,
            lowest_frequency: 2f64.powi(params.first_octave),
            highest_amplitude: doubling / 2.0 / (doubling - 1.0),
        }
    }

    /// Samples the stack at `(x, y, z)`.
    #[must_use]
    pub fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        let mut total = 0.0;
        let mut frequency = self.lowest_frequency;
        let mut persistence = self.highest_amplitude;
        for octave in &self.octaves {
            if let Some((amplitude, lattice)) = octave {
                total += amplitude
                    * lattice.sample(wrap(x * frequency), wrap(y * frequency), wrap(z * frequency))
                    * persistence;
            }
            frequency *= 2.0;
            persistence /= 2.0;
        }
        total
    }
}

/// Two octave stacks summed, the second at a slightly higher frequency.
#[derive(Clone, Debug)]
pub struct DoubleNoise {
    first: OctaveNoise,
    second: OctaveNoise,
    amplitude: f64,
}

impl DoubleNoise {
    /// Frequency ratio between the two stacks.
    const INPUT_FACTOR: f64 = 1.018_126_888_217_522_7;

    /// Builds both stacks from independent sub-seeds.
    #[must_use]
    pub fn new(seed: WorldSeed, params: NoiseParams) -> Self {
        let span = params.span() as f64;
        Self {
            first: OctaveNoise::new(seed.derive(0xF1), params),
            second: OctaveNoise::new(seed.derive(0xF2), params),
            amplitude: (1.0 / 6.0) / (0.1 * (1.0 + 1.0 / (span + 1.0))),
        }
    }

    /// Samples at `(x, y, z)`.
    #[must_use]
    pub fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        let f = Self::INPUT_FACTOR;
        (self.first.sample(x, y, z) + self.second.sample(x * f, y * f, z * f)) * self.amplitude
    }
}
