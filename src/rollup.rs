//! Rollup aggregation for sampled counter values.
//!
//! The management API returns one integer per sampling interval. Negative
//! samples mean "no data" for that interval. Each counter carries a rollup
//! suffix (`.average`, `.maximum`, ...) that decides how the window collapses
//! into a single value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value written when a window has no usable samples.
pub const SENTINEL: i64 = -1;

/// Aggregation rule implied by a counter's canonical name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollupKind {
    Average,
    Maximum,
    Minimum,
    Latest,
    Summation,
}

impl RollupKind {
    /// Parses the rollup kind from the last `.`-separated segment of a
    /// canonical counter name. Returns `None` for unrecognized suffixes.
    pub fn from_counter_name(name: &str) -> Option<Self> {
        let suffix = name.rsplit('.').next()?;
        match suffix.to_ascii_lowercase().as_str() {
            "average" => Some(Self::Average),
            "maximum" => Some(Self::Maximum),
            "minimum" => Some(Self::Minimum),
            "latest" => Some(Self::Latest),
            "summation" => Some(Self::Summation),
            _ => None,
        }
    }

    /// Collapses a sample window into one value.
    pub fn aggregate(self, values: &[i64]) -> i64 {
        match self {
            Self::Average => average(values),
            Self::Maximum => maximum(values),
            Self::Minimum => minimum(values),
            Self::Latest => latest(values),
            Self::Summation => summation(values),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Average => "average",
            Self::Maximum => "maximum",
            Self::Minimum => "minimum",
            Self::Latest => "latest",
            Self::Summation => "summation",
        }
    }
}

impl fmt::Display for RollupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn valid(values: &[i64]) -> impl Iterator<Item = i64> + '_ {
    values.iter().copied().filter(|v| *v >= 0)
}

/// Mean of the non-negative samples, rounded half-up.
///
/// Returns [`SENTINEL`] when every sample is missing.
pub fn average(values: &[i64]) -> i64 {
    let (total, count) = valid(values).fold((0i128, 0i128), |(t, c), v| (t + v as i128, c + 1));
    if count == 0 {
        return SENTINEL;
    }
    // total >= 0, so floor((2t + c) / 2c) == floor(t/c + 0.5)
    ((2 * total + count) / (2 * count)) as i64
}

/// Largest non-negative sample, or [`SENTINEL`] if there is none.
pub fn maximum(values: &[i64]) -> i64 {
    valid(values).max().unwrap_or(SENTINEL)
}

/// Smallest non-negative sample, or [`SENTINEL`] if there is none.
pub fn minimum(values: &[i64]) -> i64 {
    valid(values).min().unwrap_or(SENTINEL)
}

/// Last sample as reported, sentinel included.
pub fn latest(values: &[i64]) -> i64 {
    values.last().copied().unwrap_or(SENTINEL)
}

/// Sum of the strictly positive samples. Zero and missing samples add nothing.
pub fn summation(values: &[i64]) -> i64 {
    values
        .iter()
        .copied()
        .filter(|v| *v > 0)
        .fold(0i64, |acc, v| acc.saturating_add(v))
}
