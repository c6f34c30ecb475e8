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

//! Isolation forest: the global detector.
//!
//! Anomalous rows are isolated by fewer random splits, so their average
//! path length through the forest is short. Scores follow the usual
//! convention of this crate: lower means more anomalous, and the decision
//! function is shifted so that negative values are outliers.

use crate::anomaly::{validate_contamination, DetectorOutput};
use crate::config::ForestConfig;
use crate::core::stats::percentile;
use crate::error::{PipelineError, PipelineResult};
use ndarray::{Array2, ArrayView1};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Expected path length of an unsuccessful search in a binary search tree
/// built from `n` points; used to credit leaves that still hold several rows
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// One randomly grown isolation tree, stored as a flat node arena
#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(data: &Array2<f64>, rows: Vec<usize>, max_depth: usize, seed: u64) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut tree = Self { nodes: Vec::new() };
        tree.build(data, rows, 0, max_depth, &mut rng);
        tree
    }

    fn build(
        &mut self,
        data: &Array2<f64>,
        rows: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut ChaCha20Rng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { size: rows.len() });

        if depth >= max_depth || rows.len() <= 1 {
            return id;
        }

        // Only features that still vary inside this node can split it
        let candidates: Vec<(usize, f64, f64)> = (0..data.ncols())
            .filter_map(|feature| {
                let (lo, hi) = rows.iter().fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), &row| (lo.min(data[[row, feature]]), hi.max(data[[row, feature]])),
                );
                (hi > lo).then_some((feature, lo, hi))
            })
            .collect();

        if candidates.is_empty() {
            return id;
        }

        let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(lo..hi);
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&row| data[[row, feature]] <= threshold);

        let left = self.build(data, left_rows, depth + 1, max_depth, rng);
        let right = self.build(data, right_rows, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn path_length(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut id = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes[id] {
                Node::Leaf { size } => return depth + average_path_length(size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[feature] <= threshold { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// A fitted isolation forest
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    /// Normalizer for path lengths, `c(max_samples)`
    path_norm: f64,
    /// Raw score at the contamination percentile of the training rows
    offset: f64,
}

impl IsolationForest {
    /// Grow the forest on the scaled matrix and calibrate the decision offset
    /// so that roughly `contamination` of the training rows fall below zero
    pub fn fit(
        data: &Array2<f64>,
        contamination: f64,
        config: &ForestConfig,
    ) -> PipelineResult<Self> {
        validate_contamination(contamination)?;

        let n_rows = data.nrows();
        if n_rows == 0 {
            return Err(PipelineError::EmptyInput);
        }
        let max_samples = config.max_samples.min(n_rows).max(1);
        let max_depth = (max_samples as f64).log2().ceil() as usize;

        let mut master = ChaCha20Rng::seed_from_u64(config.seed);
        let plans: Vec<(Vec<usize>, u64)> = (0..config.n_estimators)
            .map(|_| {
                let rows = rand::seq::index::sample(&mut master, n_rows, max_samples).into_vec();
                (rows, master.gen::<u64>())
            })
            .collect();

        let trees: Vec<IsolationTree> = plans
            .into_par_iter()
            .map(|(rows, seed)| IsolationTree::grow(data, rows, max_depth, seed))
            .collect();

        let mut forest = Self {
            trees,
            path_norm: average_path_length(max_samples).max(f64::EPSILON),
            offset: 0.0,
        };

        let training_scores = forest.score_samples(data);
        forest.offset = percentile(&training_scores, 100.0 * contamination);

        tracing::debug!(
            "Isolation forest fitted: {} trees, {max_samples} samples per tree, offset {:.4}",
            forest.trees.len(),
            forest.offset
        );
        Ok(forest)
    }

    /// Opposite of the anomaly score: `-2^(-E[h(x)] / c(max_samples))`
    #[must_use]
    pub fn score_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        if self.trees.is_empty() {
            return -0.5;
        }
        let mean_path = self
            .trees
            .iter()
            .map(|tree| tree.path_length(row))
            .sum::<f64>()
            / self.trees.len() as f64;
        -(2f64.powf(-mean_path / self.path_norm))
    }

    #[must_use]
    pub fn score_samples(&self, data: &Array2<f64>) -> Vec<f64> {
        (0..data.nrows())
            .into_par_iter()
            .map(|i| self.score_row(data.row(i)))
            .collect()
    }

    /// Shifted score; negative values are outliers
    #[must_use]
    pub fn decision_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.score_row(row) - self.offset
    }

    #[must_use]
    pub fn decision_function(&self, data: &Array2<f64>) -> Vec<f64> {
        self.score_samples(data)
            .into_iter()
            .map(|score| score - self.offset)
            .collect()
    }

    /// Flags and decision scores for every row of `data`
    #[must_use]
    pub fn detect(&self, data: &Array2<f64>) -> DetectorOutput {
        let scores = self.decision_function(data);
        let flags = scores.iter().map(|score| *score < 0.0).collect();
        DetectorOutput { flags, scores }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn clustered_with_outlier() -> Array2<f64> {
        let mut rows: Vec<f64> = Vec::new();
        for i in 0..19_i32 {
            let jitter = f64::from(i) * 0.01;
            rows.extend_from_slice(&[jitter, -jitter, 0.5 * jitter]);
        }
        rows.extend_from_slice(&[8.0, -9.0, 7.5]);
        Array2::from_shape_vec((20, 3), rows).expect("shape")
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!(c256 > 10.0 && c256 < 11.0, "c(256) = {c256}");
    }

    #[test]
    fn test_outlier_has_lowest_decision() {
        let data = clustered_with_outlier();
        let forest = IsolationForest::fit(&data, 0.1, &ForestConfig::default()).expect("fit");
        let output = forest.detect(&data);

        let (lowest, _) = output
            .scores
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .expect("scores");
        assert_eq!(lowest, 19);
        assert!(output.flags[19]);
    }

    #[test]
    fn test_contamination_sets_flag_count() {
        let data = clustered_with_outlier();
        let forest = IsolationForest::fit(&data, 0.1, &ForestConfig::default()).expect("fit");
        let flagged = forest.detect(&data).flags.iter().filter(|f| **f).count();
        // 10th percentile of 20 rows sits between the 2nd and 3rd lowest scores
        assert!(flagged <= 2, "flagged {flagged}");
        assert!(flagged >= 1);
    }

    #[test]
    fn test_seeded_runs_are_identical() {
        let data = clustered_with_outlier();
        let config = ForestConfig::default();
        let a = IsolationForest::fit(&data, 0.1, &config).expect("fit");
        let b = IsolationForest::fit(&data, 0.1, &config).expect("fit");
        assert_eq!(a.decision_function(&data), b.decision_function(&data));
    }

    #[test]
    fn test_decision_row_matches_batch() {
        let data = clustered_with_outlier();
        let forest = IsolationForest::fit(&data, 0.2, &ForestConfig::default()).expect("fit");
        let batch = forest.decision_function(&data);
        assert_eq!(forest.decision_row(data.row(3)), batch[3]);
    }

    #[test]
    fn test_constant_data_does_not_split() {
        let data = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        let forest = IsolationForest::fit(&data, 0.1, &ForestConfig::default()).expect("fit");
        let scores = forest.score_samples(&data);
        assert!(scores.iter().all(|s| (s - scores[0]).abs() < 1e-12));
        assert!(forest.detect(&data).flags.iter().all(|f| !f));
    }

    #[test]
    fn test_rejects_bad_contamination() {
        let data = clustered_with_outlier();
        for bad in [0.0, -0.1, 0.6, f64::NAN] {
            assert!(matches!(
                IsolationForest::fit(&data, bad, &ForestConfig::default()),
                Err(PipelineError::InvalidContamination(_))
            ));
        }
    }
}
