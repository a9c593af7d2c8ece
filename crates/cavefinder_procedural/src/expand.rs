//! Structure-seed expansion.
//!
//! A structure seed fixes the low 48 bits of a world seed. The remaining
//! 16 upper bits are free, so every structure seed stands for exactly
//! [`EXPANSION_FACTOR`] world seeds.

use cavefinder_core::{SeedSpaceExpander, EXPANSION_FACTOR};

/// Bits shared by a structure seed and all of its world seeds.
pub const STRUCTURE_BITS: u32 = 48;

const LOW_MASK: u64 = (1 << STRUCTURE_BITS) - 1;

/// Enumerates the world seeds of a structure seed, upper bits ascending.
#[derive(Clone, Copy, Debug, Default)]
pub struct StructureSeedExpander;

impl StructureSeedExpander {
    /// Creates the expander.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// World seed with the given upper 16 bits.
    #[inline]
    #[must_use]
    pub const fn world_seed(structure: i64, upper: u16) -> i64 {
        (((upper as u64) << STRUCTURE_BITS) | (structure as u64 & LOW_MASK)) as i64
    }

    /// The structure seed a world seed belongs to.
    #[inline]
    #[must_use]
    pub const fn structure_of(world: i64) -> i64 {
        (world as u64 & LOW_MASK) as i64
    }
}

impl SeedSpaceExpander for StructureSeedExpander {
    fn expand(&self, compressed: i64) -> Box<dyn Iterator<Item = i64> + Send + '_> {
        debug_assert_eq!(EXPANSION_FACTOR, 1 << (64 - STRUCTURE_BITS));
        Box::new((0..=u16::MAX).map(move |upper| Self::world_seed(compressed, upper)))
    }
}
