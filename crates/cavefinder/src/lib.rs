//! # Cavefinder
//!
//! Command line front end for the seed scanner.
//!
//! - `config`: TOML scan files, command line overrides, output checks
//! - `run`: progress forwarding, time limits and the final summary

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod run;

pub use config::{ConfigError, ScanConfig, ScanOverrides, SeedConfig};
pub use run::{drive, succeeded, summary};
