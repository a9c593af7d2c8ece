//! # Scan Configuration
//!
//! A TOML file describes one scan; every field is optional. Command line
//! flags are folded in through [`ScanOverrides`] and win over the file.
//!
//! ```toml
//! kind = "structure"
//! depth_floor = -50
//! output = "result.txt"
//!
//! [seeds]
//! source = "range"
//! start = 0
//! end = 99999
//!
//! [coordinate]
//! x = 120
//! z = -340
//!
//! [[parameters]]
//! parameter = "ridge"
//! condition = "not_in_range"
//! t1 = -0.2
//! t2 = 0.2
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use cavefinder_core::{
    prepare_output, Coordinate, DepthFloor, FilterMode, HeightCheck, HeightVerifier, OutputTarget,
    ParameterSet, ParameterSpec, ScanError, ScanRequest, ScanServices, SeedKind, SeedRange,
    SeedSource,
};
use cavefinder_procedural::{
    ColumnVerifier, NoiseChannels, NoiseTerrain, RangeFootprint, StructureSeedExpander,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Smallest segment size accepted from configuration.
pub const MIN_SEGMENT_SIZE: u64 = 1_000_000;

/// Largest segment size accepted from configuration.
pub const MAX_SEGMENT_SIZE: u64 = 1_000_000_000;

/// Default segment size.
pub const DEFAULT_SEGMENT_SIZE: u64 = 10_000_000;

/// Default output file name.
pub const DEFAULT_OUTPUT: &str = "result.txt";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for a scan.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be rendered.
    #[error("cannot render configuration: {0}")]
    Render(#[from] toml::ser::Error),

    /// The output file exists and overwriting was not allowed.
    #[error("{0} already exists; pass --overwrite or set overwrite = true to replace it")]
    OutputExists(PathBuf),

    /// The request was rejected by the scanner.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// A value outside what the front end accepts.
    #[error("{0}")]
    Invalid(String),
}

/// Where the seeds come from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case", deny_unknown_fields)]
pub enum SeedConfig {
    /// Inclusive range.
    Range {
        /// First seed.
        start: i64,
        /// Last seed.
        end: i64,
    },
    /// One seed per line, from a file or inline.
    List {
        /// File holding the list.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
        /// Inline list text.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seeds: Option<String>,
    },
}

impl SeedConfig {
    /// Reads list files and builds the scanner's source.
    ///
    /// # Errors
    ///
    /// Fails on an inverted range, an unreadable list file, or a list entry
    /// that names both or neither of `path` and `seeds`.
    pub fn to_source(&self) -> Result<SeedSource, ConfigError> {
        match self {
            Self::Range { start, end } => Ok(SeedSource::Range(SeedRange::new(*start, *end)?)),
            Self::List {
                path: Some(path),
                seeds: None,
            } => fs::read_to_string(path)
                .map(SeedSource::List)
                .map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                }),
            Self::List {
                path: None,
                seeds: Some(text),
            } => Ok(SeedSource::List(text.clone())),
            Self::List { .. } => Err(ConfigError::Invalid(
                "a seed list needs exactly one of `path` or `seeds`".into(),
            )),
        }
    }
}

/// One scan, as read from a file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Compressed (`structure`) or full (`world`) seeds.
    pub kind: SeedKind,
    /// Lowest cave layer examined.
    pub depth_floor: DepthFloor,
    /// Use the fixed bedrock signature instead of the parameters.
    pub bedrock_impossible: bool,
    /// Only the large entrance layer counts as an entrance.
    pub entrance1_only: bool,
    /// Optional second-stage check; bedrock mode always probes columns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height_check: Option<HeightCheck>,
    /// Worker threads; host parallelism when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    /// Seeds per range segment.
    pub segment_size: u64,
    /// Result file.
    pub output: PathBuf,
    /// Replace an existing result file.
    pub overwrite: bool,
    /// Seed source; required before a scan can start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seeds: Option<SeedConfig>,
    /// Evaluated location.
    pub coordinate: Coordinate,
    /// Footprint for the range height checks.
    pub footprint: RangeFootprint,
    /// Parameter filters, overlaid on the stock filter.
    pub parameters: Vec<ParameterSpec>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            kind: SeedKind::default(),
            depth_floor: DepthFloor::default(),
            bedrock_impossible: false,
            entrance1_only: false,
            height_check: None,
            threads: None,
            segment_size: DEFAULT_SEGMENT_SIZE,
            output: PathBuf::from(DEFAULT_OUTPUT),
            overwrite: false,
            seeds: None,
            coordinate: Coordinate::default(),
            footprint: RangeFootprint::default(),
            parameters: ParameterSet::default().iter().copied().collect(),
        }
    }
}

/// Values given on the command line.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanOverrides {
    /// Seed source.
    pub seeds: Option<SeedConfig>,
    /// Seed kind.
    pub kind: Option<SeedKind>,
    /// Block X.
    pub x: Option<i32>,
    /// Block Z.
    pub z: Option<i32>,
    /// Depth floor.
    pub depth_floor: Option<i32>,
    /// Worker threads.
    pub threads: Option<usize>,
    /// Segment size.
    pub segment_size: Option<u64>,
    /// Switch to bedrock mode.
    pub bedrock_impossible: bool,
    /// Switch to entrance1-only evaluation.
    pub entrance1_only: bool,
    /// Height check.
    pub height_check: Option<HeightCheck>,
    /// Result file.
    pub output: Option<PathBuf>,
    /// Allow replacing the result file.
    pub overwrite: bool,
}

impl ScanConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown fields.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text)?;
        info!(path = %path.display(), "Loaded scan configuration");
        Ok(config)
    }

    /// The default configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Render`] if serialization fails.
    pub fn defaults_toml() -> Result<String, ConfigError> {
        let body = toml::to_string_pretty(&Self::default())?;
        Ok(format!(
            "# Cavefinder scan configuration\n\
             #\n\
             # Add a seed source before scanning, for example:\n\
             #\n\
             # [seeds]\n\
             # source = \"range\"\n\
             # start = 0\n\
             # end = 99999\n\n{body}"
        ))
    }

    /// Folds command line values in; flags that are set always win.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Scan`] for a depth floor outside the allowed set.
    pub fn apply(&mut self, overrides: ScanOverrides) -> Result<(), ConfigError> {
        if let Some(seeds) = overrides.seeds {
            self.seeds = Some(seeds);
        }
        if let Some(kind) = overrides.kind {
            self.kind = kind;
        }
        if let Some(x) = overrides.x {
            self.coordinate.x = x;
        }
        if let Some(z) = overrides.z {
            self.coordinate.z = z;
        }
        if let Some(threads) = overrides.threads {
            self.threads = Some(threads);
        }
        if let Some(segment_size) = overrides.segment_size {
            self.segment_size = segment_size;
        }
        if let Some(height_check) = overrides.height_check {
            self.height_check = Some(height_check);
        }
        if let Some(output) = overrides.output {
            self.output = output;
        }
        self.bedrock_impossible |= overrides.bedrock_impossible;
        self.entrance1_only |= overrides.entrance1_only;
        self.overwrite |= overrides.overwrite;
        if let Some(depth) = overrides.depth_floor {
            self.depth_floor = DepthFloor::new(depth)?;
        }
        Ok(())
    }

    /// Filter family selected by the flags.
    #[must_use]
    pub const fn mode(&self) -> FilterMode {
        if self.bedrock_impossible {
            FilterMode::BedrockImpossible
        } else {
            FilterMode::Normal {
                entrance1_only: self.entrance1_only,
            }
        }
    }

    /// Height check actually run; bedrock mode always probes its columns.
    #[must_use]
    pub const fn effective_height_check(&self) -> Option<HeightCheck> {
        match (self.height_check, self.bedrock_impossible) {
            (None, _) => None,
            (Some(_), true) => Some(HeightCheck::BedrockImpossibleColumns),
            (Some(kind), false) => Some(kind),
        }
    }

    /// Validates front-end limits and builds the scanner request.
    ///
    /// # Errors
    ///
    /// Fails when no seed source is configured, the segment size is outside
    /// the accepted window, the output exists without `overwrite`, or the
    /// output path cannot be used.
    pub fn to_request(&self) -> Result<ScanRequest, ConfigError> {
        let seeds = self.seeds.as_ref().ok_or_else(|| {
            ConfigError::Invalid("no seed source: give --start/--end or --list".into())
        })?;
        if !(MIN_SEGMENT_SIZE..=MAX_SEGMENT_SIZE).contains(&self.segment_size) {
            return Err(ConfigError::Invalid(format!(
                "segment size {} is outside {MIN_SEGMENT_SIZE}..={MAX_SEGMENT_SIZE}",
                self.segment_size
            )));
        }
        if self.output.is_file() && !self.overwrite {
            return Err(ConfigError::OutputExists(self.output.clone()));
        }
        prepare_output(&self.output)?;

        let threads = self
            .threads
            .unwrap_or_else(|| thread::available_parallelism().map_or(1, usize::from));

        Ok(ScanRequest {
            source: seeds.to_source()?,
            kind: self.kind,
            coordinate: self.coordinate,
            depth_floor: self.depth_floor,
            mode: self.mode(),
            parameters: self.parameters.iter().copied().collect(),
            height_check: self.effective_height_check(),
            threads,
            segment_size: self.segment_size,
            output: OutputTarget::File(self.output.clone()),
        })
    }

    /// Reference collaborators; a verifier is only built when a height check runs.
    #[must_use]
    pub fn services(&self) -> ScanServices {
        ScanServices {
            sampler: Arc::new(NoiseChannels::new()),
            expander: Arc::new(StructureSeedExpander::new()),
            verifier: self.effective_height_check().map(|_| {
                Arc::new(ColumnVerifier::with_footprint(NoiseTerrain::new(), self.footprint))
                    as Arc<dyn HeightVerifier>
            }),
        }
    }
}
