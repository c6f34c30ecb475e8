// LedgerLens - GPL-3.0-or-later
// This file is part of LedgerLens.
//
// Copyright (C) 2025 Daniel Freiermuth
//
// LedgerLens is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// LedgerLens is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with LedgerLens.  If not, see <https://www.gnu.org/licenses/>.

use crate::core::stats::{DistributionProfile, FeatureProfile};
use crate::explain::surrogate::Attribution;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How an explanation labels each attributed feature
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplanationStyle {
    /// Discretizer bucket, e.g. `"salary <= 41000.00"`
    #[default]
    Thresholds,
    /// Bare feature name from the continuous explainer
    Raw,
    Percentiles,
    Quartiles,
    StdDev,
}

impl ExplanationStyle {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Thresholds => "thresholds",
            Self::Raw => "raw",
            Self::Percentiles => "percentiles",
            Self::Quartiles => "quartiles",
            Self::StdDev => "std_dev",
        }
    }

    /// Only `raw` reads the continuous explainer; all others the discretized one
    #[must_use]
    pub const fn uses_continuous_explainer(self) -> bool {
        matches!(self, Self::Raw)
    }

    /// Resolve a request's style string. Unknown names fall back to
    /// [`ExplanationStyle::Thresholds`] with a warning.
    #[must_use]
    pub fn from_request(name: Option<&str>) -> Self {
        name.map_or_else(Self::default, |name| {
            name.parse().unwrap_or_else(|e| {
                tracing::warn!("{e}, using {}", Self::default());
                Self::default()
            })
        })
    }

    /// Display label for one attribution of a record whose value for that
    /// feature is `value`
    #[must_use]
    pub fn label(self, attribution: &Attribution, value: f64, profile: &DistributionProfile) -> String {
        let name = attribution.feature_name();
        let stats = profile.feature(attribution.feature);
        match self {
            Self::Thresholds => attribution
                .bucket
                .clone()
                .unwrap_or_else(|| name.to_string()),
            Self::Raw => name.to_string(),
            Self::Percentiles => format!("{name} ({})", percentile_band(stats, value)),
            Self::Quartiles => format!("{name} ({})", quartile_band(stats, value)),
            Self::StdDev => {
                let deviations = stats.deviations(value);
                if deviations >= 0.0 {
                    format!("{name} (+{deviations:.1} std)")
                } else {
                    format!("{name} ({deviations:.1} std)")
                }
            }
        }
    }
}

impl fmt::Display for ExplanationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExplanationStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thresholds" => Ok(Self::Thresholds),
            "raw" => Ok(Self::Raw),
            "percentiles" => Ok(Self::Percentiles),
            "quartiles" => Ok(Self::Quartiles),
            "std_dev" => Ok(Self::StdDev),
            other => Err(format!("Unknown explanation style '{other}'")),
        }
    }
}

/// Band names, strictest first, paired with the index of their cut point in
/// [`FeatureProfile::percentiles`]
const PERCENTILE_BANDS: [(usize, &str); 6] = [
    (6, "99th percentile"),
    (5, "95th percentile"),
    (4, "90th percentile"),
    (3, "75th percentile"),
    (2, "median"),
    (1, "25th percentile"),
];

const QUARTILE_BANDS: [(usize, &str); 3] = [
    (2, "Q4 - High"),
    (1, "Q3 - Above Average"),
    (0, "Q2 - Below Average"),
];

fn percentile_band(stats: &FeatureProfile, value: f64) -> &'static str {
    PERCENTILE_BANDS
        .iter()
        .find(|(cut, _)| value >= stats.percentiles[*cut])
        .map_or("bottom 25%", |(_, band)| *band)
}

fn quartile_band(stats: &FeatureProfile, value: f64) -> &'static str {
    QUARTILE_BANDS
        .iter()
        .find(|(cut, _)| value >= stats.quartiles[*cut])
        .map_or("Q1 - Low", |(_, band)| *band)
}
