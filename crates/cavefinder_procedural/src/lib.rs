//! # Cavefinder Procedural
//!
//! Reference collaborators for the scan engine.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same seed always produces the same sample
//! 2. **Seed-scoped**: Noise layers are built per seed and never shared across threads
//! 3. **Lazy**: A layer is only built when a check first reads it
//!
//! ## Core Components
//!
//! - `NoiseChannels`: every predicate channel as a `NoiseSampleProvider`
//! - `StructureSeedExpander`: structure seed -> 65536 world seeds
//! - `NoiseTerrain`: voxel oracle built from the channels
//! - `ColumnVerifier`: box-count `HeightVerifier` over any oracle
//!
//! ## Example
//!
//! ```rust,ignore
//! use cavefinder_core::ScanServices;
//! use cavefinder_procedural::{ColumnVerifier, NoiseChannels, NoiseTerrain, StructureSeedExpander};
//! use std::sync::Arc;
//!
//! let services = ScanServices {
//!     sampler: Arc::new(NoiseChannels::new()),
//!     expander: Arc::new(StructureSeedExpander::new()),
//!     verifier: Some(Arc::new(ColumnVerifier::new(NoiseTerrain::new()))),
//! };
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod channels;
pub mod expand;
pub mod noise;
pub mod terrain;
pub mod verifier;

pub use channels::{NoiseChannels, NoiseKey, SeedNoises};
pub use expand::{StructureSeedExpander, STRUCTURE_BITS};
pub use noise::{DoubleNoise, NoiseParams, OctaveNoise, PerlinNoise, WorldSeed};
pub use terrain::{NoiseTerrain, Voxel, VoxelOracle, FLOOR_TOP, SEA_LEVEL};
pub use verifier::{ColumnVerifier, RangeFootprint, COLUMN_TOP, PROBE_AIR, PROBE_BOTTOM, PROBE_OFFSETS};
