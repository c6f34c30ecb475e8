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

//! Summary statistics and per-feature distribution profiles.

use crate::parser::{FEATURES, N_FEATURES};
use ndarray::{Array2, ArrayView1};

/// Percentile levels reported in every profile
pub const PERCENTILE_LEVELS: [f64; 7] = [10.0, 25.0, 50.0, 75.0, 90.0, 95.0, 99.0];

/// Quartile cut levels
pub const QUARTILE_LEVELS: [f64; 3] = [25.0, 50.0, 75.0];

/// Mean and population standard deviation (divides by `n`), both `0.0`
/// for an empty view
#[must_use]
pub fn moments(values: ArrayView1<'_, f64>) -> (f64, f64) {
    values
        .mean()
        .map_or((0.0, 0.0), |mean| (mean, values.std(0.0)))
}

/// Percentile with linear interpolation between closest ranks.
///
/// `level` is in `[0, 100]`. Returns `0.0` for an empty slice.
#[must_use]
pub fn percentile(values: &[f64], level: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_of_sorted(&sorted, level)
}

/// Same as [`percentile`] but for data that is already sorted ascending
#[must_use]
pub fn percentile_of_sorted(sorted: &[f64], level: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let rank = level.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let fraction = rank - lower as f64;

    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Distribution summary of one feature column
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureProfile {
    pub mean: f64,
    pub std: f64,
    /// Cut points at 25/50/75
    pub quartiles: [f64; 3],
    /// Cut points at 10/25/50/75/90/95/99
    pub percentiles: [f64; 7],
}

impl FeatureProfile {
    #[must_use]
    pub fn from_column(column: ArrayView1<'_, f64>) -> Self {
        let mut sorted = column.to_vec();
        sorted.sort_by(f64::total_cmp);

        let (mean, std) = moments(column);
        Self {
            mean,
            std,
            quartiles: QUARTILE_LEVELS.map(|level| percentile_of_sorted(&sorted, level)),
            percentiles: PERCENTILE_LEVELS.map(|level| percentile_of_sorted(&sorted, level)),
        }
    }

    /// Signed distance from the mean in standard deviations, `0.0` when the
    /// column has no spread
    #[must_use]
    pub const fn deviations(&self, value: f64) -> f64 {
        if self.std > 0.0 {
            (value - self.mean) / self.std
        } else {
            0.0
        }
    }
}

/// Profiles for every feature column of an unscaled matrix
#[derive(Debug, Clone)]
pub struct DistributionProfile {
    features: [FeatureProfile; N_FEATURES],
}

impl DistributionProfile {
    #[must_use]
    pub fn compute(matrix: &Array2<f64>) -> Self {
        let features = std::array::from_fn(|i| FeatureProfile::from_column(matrix.column(i)));
        tracing::debug!(
            "Profiled {} features over {} rows",
            FEATURES.len(),
            matrix.nrows()
        );
        Self { features }
    }

    #[must_use]
    pub const fn feature(&self, index: usize) -> &FeatureProfile {
        &self.features[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    #[test]
    fn test_percentile_interpolates() {
        let data: Vec<f64> = (1..=10_i32).map(f64::from).collect();
        assert!((percentile(&data, 50.0) - 5.5).abs() < 1e-12);
        assert!((percentile(&data, 25.0) - 3.25).abs() < 1e-12);
        assert!((percentile(&data, 10.0) - 1.9).abs() < 1e-12);
        assert_eq!(percentile(&data, 0.0), 1.0);
        assert_eq!(percentile(&data, 100.0), 10.0);
    }

    #[test]
    fn test_percentile_unsorted_input() {
        let data = [9.0, 1.0, 5.0];
        assert_eq!(percentile(&data, 50.0), 5.0);
    }

    #[test]
    fn test_population_std() {
        let data = array![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let (mean, std) = moments(data.view());
        assert!((mean - 5.0).abs() < 1e-12);
        assert!((std - 2.0).abs() < 1e-12);
        assert_eq!(moments(Array1::<f64>::zeros(0).view()), (0.0, 0.0));
    }

    #[test]
    fn test_profile_zero_spread() {
        let column = Array1::from_elem(5, 3.0);
        let profile = FeatureProfile::from_column(column.view());
        assert_eq!(profile.std, 0.0);
        assert_eq!(profile.deviations(10.0), 0.0);
        assert_eq!(profile.quartiles, [3.0, 3.0, 3.0]);
    }

    #[test]
    fn test_distribution_profile_columns() {
        let matrix = array![
            [1.0, 10.0, 0.0, 0.0, 0.0, 5.0],
            [2.0, 20.0, 0.0, 0.0, 0.0, 5.0],
            [3.0, 30.0, 0.0, 0.0, 0.0, 5.0],
        ];
        let profile = DistributionProfile::compute(&matrix);
        assert!((profile.feature(0).mean - 2.0).abs() < 1e-12);
        assert!((profile.feature(1).percentiles[2] - 20.0).abs() < 1e-12);
        assert_eq!(profile.feature(5).std, 0.0);
    }
}
