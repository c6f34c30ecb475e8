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

//! Local outlier factor: the local-density detector.
//!
//! Compares each row's reachability density with that of its `k` nearest
//! neighbours. The reported score is the negated factor, so inliers sit
//! near `-1` and outliers are more negative.

use crate::anomaly::{validate_contamination, DetectorOutput};
use crate::core::stats::percentile;
use crate::error::{PipelineError, PipelineResult};
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;

/// Keeps the density finite for duplicated rows
const DENSITY_EPSILON: f64 = 1e-10;

fn euclidean(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// The `k` nearest other rows of `row`, closest first, ties by index
fn nearest_neighbors(data: &Array2<f64>, row: usize, k: usize) -> Vec<(usize, f64)> {
    let mut distances: Vec<(usize, f64)> = (0..data.nrows())
        .filter(|&other| other != row)
        .map(|other| (other, euclidean(data.row(row), data.row(other))))
        .collect();
    distances.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    distances.truncate(k);
    distances
}

/// Local outlier factor fitted on (and scoring) the training rows
#[derive(Debug, Clone)]
pub struct LocalOutlierFactor {
    /// Effective neighbourhood size after clamping to the batch
    k: usize,
    /// Negated outlier factor per row
    negative_outlier_factor: Vec<f64>,
    offset: f64,
}

impl LocalOutlierFactor {
    pub fn fit(data: &Array2<f64>, n_neighbors: usize, contamination: f64) -> PipelineResult<Self> {
        validate_contamination(contamination)?;
        if n_neighbors == 0 {
            return Err(PipelineError::InvalidNeighbors(n_neighbors));
        }

        let n_rows = data.nrows();
        if n_rows < 2 {
            return Err(PipelineError::TooFewSamples(n_rows));
        }

        let k = if n_neighbors >= n_rows {
            tracing::warn!(
                "n_neighbors ({n_neighbors}) is not below the number of records ({n_rows}), using {}",
                n_rows - 1
            );
            n_rows - 1
        } else {
            n_neighbors
        };

        let neighborhoods: Vec<Vec<(usize, f64)>> = (0..n_rows)
            .into_par_iter()
            .map(|row| nearest_neighbors(data, row, k))
            .collect();

        let k_distance: Vec<f64> = neighborhoods
            .iter()
            .map(|neighbors| neighbors.last().map_or(0.0, |(_, d)| *d))
            .collect();

        let density: Vec<f64> = neighborhoods
            .iter()
            .map(|neighbors| {
                let reach = neighbors
                    .iter()
                    .map(|&(other, d)| k_distance[other].max(d))
                    .sum::<f64>()
                    / neighbors.len() as f64;
                1.0 / (reach + DENSITY_EPSILON)
            })
            .collect();

        let negative_outlier_factor: Vec<f64> = neighborhoods
            .iter()
            .zip(&density)
            .map(|(neighbors, own)| {
                let neighbor_density = neighbors
                    .iter()
                    .map(|&(other, _)| density[other])
                    .sum::<f64>()
                    / neighbors.len() as f64;
                -(neighbor_density / own)
            })
            .collect();

        let offset = percentile(&negative_outlier_factor, 100.0 * contamination);
        tracing::debug!("Local outlier factor fitted with k={k}, offset {offset:.4}");

        Ok(Self {
            k,
            negative_outlier_factor,
            offset,
        })
    }

    #[must_use]
    pub const fn neighbors(&self) -> usize {
        self.k
    }

    #[must_use]
    pub fn detect(&self) -> DetectorOutput {
        let flags = self
            .negative_outlier_factor
            .iter()
            .map(|score| *score < self.offset)
            .collect();
        DetectorOutput {
            flags,
            scores: self.negative_outlier_factor.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn line_with_outlier() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [1.0, 0.0],
            [2.0, 0.0],
            [3.0, 0.0],
            [4.0, 0.0],
            [5.0, 0.0],
            [6.0, 0.0],
            [7.0, 0.0],
            [8.0, 0.0],
            [30.0, 30.0],
        ]
    }

    #[test]
    fn test_outlier_is_flagged() {
        let lof = LocalOutlierFactor::fit(&line_with_outlier(), 3, 0.1).expect("fit");
        let output = lof.detect();

        assert!(output.flags[9]);
        assert_eq!(output.flags.iter().filter(|f| **f).count(), 1);
        let min = output.scores.iter().copied().fold(f64::INFINITY, f64::min);
        assert_eq!(min, output.scores[9]);
        assert!(output.scores[9] < -2.0);
    }

    #[test]
    fn test_inliers_near_minus_one() {
        let lof = LocalOutlierFactor::fit(&line_with_outlier(), 2, 0.1).expect("fit");
        let output = lof.detect();
        assert!((output.scores[4] + 1.0).abs() < 0.2, "{}", output.scores[4]);
    }

    #[test]
    fn test_neighbors_clamped_to_batch() {
        let lof = LocalOutlierFactor::fit(&line_with_outlier(), 20, 0.1).expect("fit");
        assert_eq!(lof.neighbors(), 9);
        assert!(lof.detect().scores.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_duplicates_stay_finite() {
        let data = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0], [5.0, 5.0]];
        let lof = LocalOutlierFactor::fit(&data, 2, 0.25).expect("fit");
        assert!(lof.detect().scores.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_rejects_degenerate_inputs() {
        assert!(matches!(
            LocalOutlierFactor::fit(&array![[1.0, 2.0]], 5, 0.1),
            Err(PipelineError::TooFewSamples(1))
        ));
        assert!(matches!(
            LocalOutlierFactor::fit(&line_with_outlier(), 0, 0.1),
            Err(PipelineError::InvalidNeighbors(0))
        ));
        assert!(matches!(
            LocalOutlierFactor::fit(&line_with_outlier(), 3, 0.75),
            Err(PipelineError::InvalidContamination(_))
        ));
    }
}
