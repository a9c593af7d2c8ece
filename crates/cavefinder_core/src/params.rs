//! # Filter Parameters
//!
//! Immutable description of which noise parameters constrain a scan and how.
//!
//! A [`ParameterSet`] holds exactly one [`ParameterSpec`] per [`Parameter`].
//! It is built once from configuration and handed to the predicate engine by
//! value; nothing reads thresholds from shared mutable state during a scan.
//!
//! ## Threshold order
//!
//! Range conditions normalize `(t1, t2)` to `(min, max)` at evaluation time,
//! so `Between(1.0, -0.16)` and `Between(-0.16, 1.0)` are the same filter.

use crate::error::{ScanError, ScanResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A user-tunable noise parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    /// Climate temperature.
    Temperature,
    /// Climate humidity (vegetation).
    Humidity,
    /// Terrain erosion.
    Erosion,
    /// Ridges / peaks-and-valleys.
    Ridge,
    /// Distance from ocean.
    Continentalness,
    /// Cave entrance density.
    Entrance,
    /// Large open cave density.
    Cheese,
    /// Underground water level noise.
    Aquifer,
}

impl Parameter {
    /// Every parameter in storage order.
    pub const ALL: [Self; 8] = [
        Self::Temperature,
        Self::Humidity,
        Self::Erosion,
        Self::Ridge,
        Self::Continentalness,
        Self::Entrance,
        Self::Cheese,
        Self::Aquifer,
    ];

    /// Slot of this parameter inside a [`ParameterSet`].
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether absolute-value conditions make sense for this parameter.
    #[inline]
    #[must_use]
    pub const fn supports_abs(self) -> bool {
        matches!(self, Self::Ridge)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Erosion => "erosion",
            Self::Ridge => "ridge",
            Self::Continentalness => "continentalness",
            Self::Entrance => "entrance",
            Self::Cheese => "cheese",
            Self::Aquifer => "aquifer",
        };
        f.write_str(name)
    }
}

/// Comparison applied to a sampled value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    /// `lo <= v <= hi`
    Between,
    /// `v > t1`
    GreaterThan,
    /// `v < t1`
    LessThan,
    /// `v < lo || v > hi`
    NotInRange,
    /// `lo <= |v| <= hi`
    AbsInRange,
    /// `|v| < lo || |v| > hi`
    AbsNotInRange,
}

impl ConditionKind {
    /// Evaluates the condition. Range kinds are order-independent in `t1`/`t2`.
    #[inline]
    #[must_use]
    pub fn check(self, value: f64, t1: f64, t2: f64) -> bool {
        let lo = t1.min(t2);
        let hi = t1.max(t2);
        match self {
            Self::Between => lo <= value && value <= hi,
            Self::GreaterThan => value > t1,
            Self::LessThan => value < t1,
            Self::NotInRange => value < lo || value > hi,
            Self::AbsInRange => {
                let v = value.abs();
                lo <= v && v <= hi
            }
            Self::AbsNotInRange => {
                let v = value.abs();
                v < lo || v > hi
            }
        }
    }

    /// Whether the second threshold takes part in the comparison.
    #[inline]
    #[must_use]
    pub const fn uses_second_threshold(self) -> bool {
        !matches!(self, Self::GreaterThan | Self::LessThan)
    }

    /// Whether the comparison is applied to `|value|`.
    #[inline]
    #[must_use]
    pub const fn is_absolute(self) -> bool {
        matches!(self, Self::AbsInRange | Self::AbsNotInRange)
    }
}

/// Free-function form of [`ConditionKind::check`].
#[inline]
#[must_use]
pub fn check_value(condition: ConditionKind, value: f64, t1: f64, t2: f64) -> bool {
    condition.check(value, t1, t2)
}

fn enabled_by_default() -> bool {
    true
}

/// One parameter's filter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Which parameter this constrains.
    pub parameter: Parameter,
    /// Disabled specs accept every value.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Comparison to apply.
    pub condition: ConditionKind,
    /// First threshold.
    #[serde(default)]
    pub t1: f64,
    /// Second threshold, ignored by one-sided conditions.
    #[serde(default)]
    pub t2: f64,
}

impl ParameterSpec {
    /// Threshold bounds accepted by validation.
    pub const THRESHOLD_LIMIT: f64 = 1.0;

    /// Creates an enabled spec.
    #[must_use]
    pub const fn new(parameter: Parameter, condition: ConditionKind, t1: f64, t2: f64) -> Self {
        Self {
            parameter,
            enabled: true,
            condition,
            t1,
            t2,
        }
    }

    /// Creates a disabled spec.
    #[must_use]
    pub const fn disabled(parameter: Parameter) -> Self {
        Self {
            parameter,
            enabled: false,
            condition: ConditionKind::Between,
            t1: 0.0,
            t2: 0.0,
        }
    }

    /// Returns `true` if the value satisfies this spec or the spec is disabled.
    #[inline]
    #[must_use]
    pub fn check(&self, value: f64) -> bool {
        !self.enabled || self.condition.check(value, self.t1, self.t2)
    }

    /// Rejects thresholds outside `[-1, 1]` and absolute conditions on
    /// parameters other than ridge. Disabled specs are not checked.
    pub fn validate(&self) -> ScanResult<()> {
        if !self.enabled {
            return Ok(());
        }
        let in_bounds = |t: f64| t.is_finite() && t.abs() <= Self::THRESHOLD_LIMIT;
        if !in_bounds(self.t1) || (self.condition.uses_second_threshold() && !in_bounds(self.t2)) {
            return Err(ScanError::InvalidRequest(format!(
                "{} thresholds must lie in [-1, 1], got ({}, {})",
                self.parameter, self.t1, self.t2
            )));
        }
        if self.condition.is_absolute() && !self.parameter.supports_abs() {
            return Err(ScanError::InvalidRequest(format!(
                "{:?} is only allowed on ridge, not {}",
                self.condition, self.parameter
            )));
        }
        Ok(())
    }
}

/// One spec per parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParameterSet([ParameterSpec; 8]);

impl Default for ParameterSet {
    /// The stock cave-hunting filter.
    fn default() -> Self {
        Self([
            ParameterSpec::disabled(Parameter::Temperature),
            ParameterSpec::disabled(Parameter::Humidity),
            ParameterSpec::disabled(Parameter::Erosion),
            ParameterSpec::new(Parameter::Ridge, ConditionKind::NotInRange, -0.16, 0.16),
            ParameterSpec::new(Parameter::Continentalness, ConditionKind::GreaterThan, -0.11, 0.0),
            ParameterSpec::new(Parameter::Entrance, ConditionKind::LessThan, 0.0, 0.0),
            ParameterSpec::new(Parameter::Cheese, ConditionKind::LessThan, 0.0, 0.0),
            ParameterSpec::new(Parameter::Aquifer, ConditionKind::LessThan, 0.4, 0.0),
        ])
    }
}

impl ParameterSet {
    /// A set where every parameter is disabled.
    #[must_use]
    pub fn unconstrained() -> Self {
        Self(Parameter::ALL.map(ParameterSpec::disabled))
    }

    /// Returns a copy with `spec` replacing the slot of its parameter.
    #[must_use]
    pub fn with(mut self, spec: ParameterSpec) -> Self {
        self.0[spec.parameter.index()] = spec;
        self
    }

    /// The spec for one parameter.
    #[inline]
    #[must_use]
    pub fn get(&self, parameter: Parameter) -> &ParameterSpec {
        &self.0[parameter.index()]
    }

    /// Checks a sampled value against the spec for `parameter`.
    #[inline]
    #[must_use]
    pub fn check(&self, parameter: Parameter, value: f64) -> bool {
        self.get(parameter).check(value)
    }

    /// Whether the parameter constrains anything.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self, parameter: Parameter) -> bool {
        self.get(parameter).enabled
    }

    /// All specs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.0.iter()
    }

    /// Validates every enabled spec.
    pub fn validate(&self) -> ScanResult<()> {
        self.0.iter().try_for_each(ParameterSpec::validate)
    }
}

impl FromIterator<ParameterSpec> for ParameterSet {
    /// Overlays the given specs on the defaults; later entries win.
    fn from_iter<I: IntoIterator<Item = ParameterSpec>>(iter: I) -> Self {
        iter.into_iter().fold(Self::default(), Self::with)
    }
}
