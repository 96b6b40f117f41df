//! Tunable knobs for mixtures, empirical formulas, and isotope spectra, loadable from JSON

// Standard Library Imports
use std::time::Duration;

// External Crate Imports
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

// Local Crate Imports
use crate::{IsochemError, Result};

// Spectrum Configuration ==============================================================================================

#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpectrumConfig {
    /// Peaks less intense than this percentage of the tallest peak are dropped
    pub min_intensity: Decimal,
    /// Peaks closer together than this (in Daltons) are merged into a single peak
    pub merge_tolerance: Decimal,
    /// Which mass number labels a peak made by merging several others
    pub merge_label: MergeLabel,
    /// Bins with a smaller probability than this are discarded part-way through the calculation, or `None` to keep
    /// every bin until the end
    pub min_fraction: Option<Decimal>,
    pub budget: ComputationBudget,
}

// NOTE: Equal to 0.01
const MIN_INTENSITY: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
// NOTE: Equal to 0.5
const MERGE_TOLERANCE: Decimal = Decimal::from_parts(5, 0, 0, false, 1);
// NOTE: Equal to 1e-16
const MIN_FRACTION: Decimal = Decimal::from_parts(1, 0, 0, false, 16);

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            min_intensity: MIN_INTENSITY,
            merge_tolerance: MERGE_TOLERANCE,
            merge_label: MergeLabel::default(),
            min_fraction: Some(MIN_FRACTION),
            budget: ComputationBudget::default(),
        }
    }
}

impl SpectrumConfig {
    #[must_use]
    pub fn with_min_intensity(self, min_intensity: Decimal) -> Self {
        Self {
            min_intensity,
            ..self
        }
    }

    #[must_use]
    pub fn with_merge_tolerance(self, merge_tolerance: Decimal) -> Self {
        Self {
            merge_tolerance,
            ..self
        }
    }

    #[must_use]
    pub fn with_merge_label(self, merge_label: MergeLabel) -> Self {
        Self {
            merge_label,
            ..self
        }
    }

    #[must_use]
    pub fn with_min_fraction(self, min_fraction: Option<Decimal>) -> Self {
        Self {
            min_fraction,
            ..self
        }
    }

    #[must_use]
    pub fn with_budget(self, budget: ComputationBudget) -> Self {
        Self { budget, ..self }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeLabel {
    /// Merged peaks keep the mass number of their most probable member
    #[default]
    MostProbable,
    /// Merged peaks keep the mass number of their lightest member
    Lightest,
}

/// Limits on the work done while convolving isotope distributions
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComputationBudget {
    /// The most bins any intermediate distribution may hold
    pub max_bins: usize,
    /// The longest a single spectrum calculation may run for
    #[serde(rename = "max_millis", deserialize_with = "deserialize_millis")]
    pub max_duration: Option<Duration>,
}

impl Default for ComputationBudget {
    fn default() -> Self {
        Self {
            max_bins: 20_000,
            max_duration: None,
        }
    }
}

impl ComputationBudget {
    #[must_use]
    pub fn with_max_bins(self, max_bins: usize) -> Self {
        Self { max_bins, ..self }
    }

    #[must_use]
    pub fn with_max_duration(self, max_duration: Option<Duration>) -> Self {
        Self {
            max_duration,
            ..self
        }
    }
}

fn deserialize_millis<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Duration>, D::Error> {
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
}

// Mixture Configuration ===============================================================================================

/// Controls how the relative weights of a mixture (like `O: 0.26, 30Si: 0.74`) are turned into whole-number counts
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MixtureConfig {
    /// The search for a whole-number ratio stops before this multiplier is reached
    pub max_count: u32,
    /// How far (per part) a scaled count can be from a whole number and still count as one
    pub precision: Decimal,
}

// NOTE: Equal to 0.0001
const PRECISION: Decimal = Decimal::from_parts(1, 0, 0, false, 4);

impl Default for MixtureConfig {
    fn default() -> Self {
        Self {
            max_count: 10,
            precision: PRECISION,
        }
    }
}

impl MixtureConfig {
    #[must_use]
    pub fn with_max_count(self, max_count: u32) -> Self {
        Self { max_count, ..self }
    }

    #[must_use]
    pub fn with_precision(self, precision: Decimal) -> Self {
        Self { precision, ..self }
    }
}

// Empirical Formula Configuration =====================================================================================

#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmpiricalConfig {
    pub gcd: GcdPolicy,
    /// Whether the net charge has to be divisible by the GCD too, or is dropped from the empirical formula entirely
    pub include_charge: bool,
}

impl Default for EmpiricalConfig {
    fn default() -> Self {
        Self {
            gcd: GcdPolicy::default(),
            include_charge: true,
        }
    }
}

impl EmpiricalConfig {
    #[must_use]
    pub fn with_gcd(self, gcd: GcdPolicy) -> Self {
        Self { gcd, ..self }
    }

    #[must_use]
    pub fn with_include_charge(self, include_charge: bool) -> Self {
        Self {
            include_charge,
            ..self
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GcdPolicy {
    /// Fractional counts are scaled up to whole numbers before finding their GCD, so `Fe0.95O` becomes `Fe19O20`
    #[default]
    Rational,
    /// Only compositions with whole-number counts are reduced
    Integral,
}

// Combined Configuration ==============================================================================================

/// Every configurable part of the library, as read from a single JSON file
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub spectrum: SpectrumConfig,
    pub mixture: MixtureConfig,
    pub empirical: EmpiricalConfig,
}

macro_rules! from_json_impls {
    ($($config_type:ty),+ $(,)?) => {
        $(
            impl $config_type {
                /// Reads a configuration from JSON, using defaults for any missing fields
                ///
                /// # Errors
                ///
                /// Fails if `text` isn't valid JSON, or contains fields that don't belong to this configuration
                pub fn from_json(name: impl AsRef<str>, text: impl AsRef<str>) -> Result<Self> {
                    serde_json::from_str(text.as_ref())
                        .map_err(|e| Box::new(IsochemError::config(name.as_ref(), e)))
                }
            }
        )+
    };
}

from_json_impls!(SpectrumConfig, MixtureConfig, EmpiricalConfig, Config);

// Module Tests ========================================================================================================
