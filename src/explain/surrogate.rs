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

//! Local surrogate attribution.
//!
//! Samples a neighbourhood around one record, asks the predictor about
//! every sample, and fits a proximity-weighted ridge regression in an
//! interpretable representation. The regression coefficients are the
//! per-feature attributions.
//!
//! Two representations are supported:
//! - [`Discretization::Quartile`]: each feature is bucketed at its training
//!   quartiles and a sample is described by "same bucket as the record or
//!   not". Attributions carry the bucket description.
//! - [`Discretization::Continuous`]: samples are drawn from a Gaussian
//!   around the training mean and described by their standardized values.

use crate::config::SurrogateConfig;
use crate::core::stats::{moments, percentile_of_sorted, QUARTILE_LEVELS};
use crate::error::{PipelineError, PipelineResult};
use crate::explain::predictor::AnomalyPredictor;
use crate::parser::FEATURES;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::distributions::WeightedIndex;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Normal, StandardNormal};
use serde::Serialize;

/// Bins always carry a little spread so sampling inside them is defined
const BIN_STD_FLOOR: f64 = 1e-11;

/// Attempts at drawing inside a bin before settling on its clamped mean
const TRUNCATION_ATTEMPTS: usize = 64;

/// How continuous features are presented to the surrogate model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discretization {
    Quartile,
    Continuous,
}

/// Credit assigned to one feature for a single prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribution {
    /// Column index into [`FEATURES`]
    pub feature: usize,
    /// Bucket the record fell into, e.g. `"salary <= 41000.00"`
    pub bucket: Option<String>,
    /// Signed surrogate coefficient; positive pushes towards "anomaly"
    pub weight: f64,
}

impl Attribution {
    #[must_use]
    pub const fn feature_name(&self) -> &'static str {
        FEATURES[self.feature]
    }
}

/// Quartile buckets of one training column
#[derive(Debug, Clone)]
struct QuartileBins {
    /// Distinct cut points, ascending
    cuts: Vec<f64>,
    names: Vec<String>,
    means: Vec<f64>,
    stds: Vec<f64>,
    mins: Vec<f64>,
    maxs: Vec<f64>,
    /// Sampling distribution over buckets, by training frequency
    frequencies: WeightedIndex<usize>,
}

impl QuartileBins {
    fn fit(name: &str, column: ArrayView1<'_, f64>) -> PipelineResult<Self> {
        let mut sorted = column.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mut cuts: Vec<f64> = QUARTILE_LEVELS
            .iter()
            .map(|level| percentile_of_sorted(&sorted, *level))
            .collect();
        cuts.dedup();

        let last = cuts.len() - 1;
        let mut names = vec![format!("{name} <= {:.2}", cuts[0])];
        names.extend(
            cuts.windows(2)
                .map(|pair| format!("{:.2} < {name} <= {:.2}", pair[0], pair[1])),
        );
        names.push(format!("{name} > {:.2}", cuts[last]));

        let n_bins = cuts.len() + 1;
        let mut members: Vec<Vec<f64>> = vec![Vec::new(); n_bins];
        for value in &sorted {
            members[bin_of(&cuts, *value)].push(*value);
        }

        let counts: Vec<usize> = members.iter().map(Vec::len).collect();
        let frequencies = WeightedIndex::new(&counts)
            .map_err(|e| PipelineError::SurrogateFit(format!("{name}: {e}")))?;

        let column_min = sorted.first().copied().unwrap_or(0.0);
        let column_max = sorted.last().copied().unwrap_or(0.0);
        let mut mins = vec![column_min];
        mins.extend_from_slice(&cuts);
        let mut maxs = cuts.clone();
        maxs.push(column_max);

        let (means, stds) = members
            .iter()
            .map(|m| {
                let (mean, std) = moments(ArrayView1::from(m.as_slice()));
                (mean, std + BIN_STD_FLOOR)
            })
            .unzip();

        Ok(Self {
            means,
            stds,
            cuts,
            names,
            mins,
            maxs,
            frequencies,
        })
    }

    fn bin(&self, value: f64) -> usize {
        bin_of(&self.cuts, value)
    }

    /// A value inside `bin`, drawn from the bin's normal truncated to its bounds
    fn draw_value(&self, bin: usize, rng: &mut ChaCha20Rng) -> f64 {
        let (lo, hi) = (self.mins[bin], self.maxs[bin]);
        if hi <= lo {
            return lo;
        }

        let Ok(normal) = Normal::new(self.means[bin], self.stds[bin]) else {
            return self.means[bin].clamp(lo, hi);
        };
        for _ in 0..TRUNCATION_ATTEMPTS {
            let value = normal.sample(rng);
            if (lo..=hi).contains(&value) {
                return value;
            }
        }
        self.means[bin].clamp(lo, hi)
    }
}

/// Bucket index: number of cut points strictly below `value`
fn bin_of(cuts: &[f64], value: f64) -> usize {
    cuts.iter().take_while(|cut| **cut < value).count()
}

#[derive(Debug, Clone)]
enum Representation {
    Quartile(Vec<QuartileBins>),
    Continuous { means: Vec<f64>, scales: Vec<f64> },
}

/// Result of the weighted ridge fit
#[derive(Debug, Clone)]
struct RidgeFit {
    coefficients: Array1<f64>,
    intercept: f64,
}

impl RidgeFit {
    fn predict(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.intercept + row.dot(&self.coefficients)
    }
}

/// A surrogate explainer prepared from the unscaled training matrix
#[derive(Debug, Clone)]
pub struct TabularExplainer {
    representation: Representation,
    config: SurrogateConfig,
}

impl TabularExplainer {
    pub fn new(
        training: &Array2<f64>,
        discretization: Discretization,
        config: SurrogateConfig,
    ) -> PipelineResult<Self> {
        if training.nrows() == 0 {
            return Err(PipelineError::EmptyInput);
        }

        let representation = match discretization {
            Discretization::Quartile => Representation::Quartile(
                training
                    .columns()
                    .into_iter()
                    .enumerate()
                    .map(|(i, column)| QuartileBins::fit(FEATURES[i], column))
                    .collect::<PipelineResult<Vec<_>>>()?,
            ),
            Discretization::Continuous => {
                let (means, scales) = training
                    .columns()
                    .into_iter()
                    .map(|column| {
                        let (mean, std) = moments(column);
                        (mean, if std == 0.0 { 1.0 } else { std })
                    })
                    .unzip();
                Representation::Continuous { means, scales }
            }
        };

        Ok(Self {
            representation,
            config,
        })
    }

    #[must_use]
    pub const fn discretization(&self) -> Discretization {
        match self.representation {
            Representation::Quartile(_) => Discretization::Quartile,
            Representation::Continuous { .. } => Discretization::Continuous,
        }
    }

    /// Attribute the predictor's anomaly probability for `row` to its
    /// features, strongest first
    pub fn explain(
        &self,
        row: ArrayView1<'_, f64>,
        predictor: &AnomalyPredictor<'_>,
    ) -> PipelineResult<Vec<Attribution>> {
        let n_features = row.len();
        let n_samples = self.config.num_samples.max(1);
        let mut rng = ChaCha20Rng::seed_from_u64(self.config.seed);

        let (interpretable, actual) = self.sample_neighborhood(row, n_samples, &mut rng)?;

        let origin = interpretable.row(0);
        let kernel_width = 0.75 * (n_features as f64).sqrt();
        let weights: Array1<f64> = interpretable
            .rows()
            .into_iter()
            .map(|sample| {
                let squared: f64 = sample
                    .iter()
                    .zip(origin.iter())
                    .map(|(a, b)| (a - b).powi(2))
                    .sum();
                (-squared / kernel_width.powi(2)).exp().sqrt()
            })
            .collect();

        let targets: Array1<f64> = predictor
            .predict_batch(&actual)
            .into_iter()
            .map(|probs| probs.anomaly)
            .collect();

        let fit = weighted_ridge(&interpretable, &targets, &weights, self.config.ridge_alpha)?;
        tracing::debug!(
            "Surrogate fit ({:?}): intercept {:.4}, local prediction {:.4}, weighted R² {:.4}",
            self.discretization(),
            fit.intercept,
            fit.predict(origin),
            weighted_r2(&fit, &interpretable, &targets, &weights)
        );

        let mut attributions: Vec<Attribution> = fit
            .coefficients
            .iter()
            .enumerate()
            .map(|(feature, weight)| Attribution {
                feature,
                bucket: self.bucket_name(feature, row[feature]),
                weight: *weight,
            })
            .collect();
        attributions.sort_by(|a, b| b.weight.abs().total_cmp(&a.weight.abs()));
        Ok(attributions)
    }

    fn bucket_name(&self, feature: usize, value: f64) -> Option<String> {
        match &self.representation {
            Representation::Quartile(bins) => {
                let bins = &bins[feature];
                Some(bins.names[bins.bin(value)].clone())
            }
            Representation::Continuous { .. } => None,
        }
    }

    /// Row 0 of both matrices is the record itself
    fn sample_neighborhood(
        &self,
        row: ArrayView1<'_, f64>,
        n_samples: usize,
        rng: &mut ChaCha20Rng,
    ) -> PipelineResult<(Array2<f64>, Array2<f64>)> {
        let n_features = row.len();
        let mut interpretable = Array2::zeros((n_samples, n_features));
        let mut actual = Array2::zeros((n_samples, n_features));
        actual.row_mut(0).assign(&row);

        match &self.representation {
            Representation::Continuous { means, scales } => {
                check_width(means.len(), n_features)?;
                for j in 0..n_features {
                    interpretable[[0, j]] = (row[j] - means[j]) / scales[j];
                }
                for i in 1..n_samples {
                    for j in 0..n_features {
                        let z: f64 = StandardNormal.sample(rng);
                        interpretable[[i, j]] = z;
                        actual[[i, j]] = z * scales[j] + means[j];
                    }
                }
            }
            Representation::Quartile(bins) => {
                check_width(bins.len(), n_features)?;
                let own_bins: Vec<usize> = (0..n_features).map(|j| bins[j].bin(row[j])).collect();
                interpretable.row_mut(0).fill(1.0);
                for i in 1..n_samples {
                    for j in 0..n_features {
                        let bin = bins[j].frequencies.sample(rng);
                        interpretable[[i, j]] = if bin == own_bins[j] { 1.0 } else { 0.0 };
                        actual[[i, j]] = bins[j].draw_value(bin, rng);
                    }
                }
            }
        }

        Ok((interpretable, actual))
    }
}

fn check_width(expected: usize, actual: usize) -> PipelineResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(PipelineError::FeatureCountMismatch { expected, actual })
    }
}

/// Ridge regression with intercept and per-sample weights.
///
/// Centers on the weighted means, then solves
/// `(Xcᵀ W Xc + αI) β = Xcᵀ W yc`.
fn weighted_ridge(
    x: &Array2<f64>,
    y: &Array1<f64>,
    weights: &Array1<f64>,
    alpha: f64,
) -> PipelineResult<RidgeFit> {
    let total_weight = weights.sum();
    if total_weight <= 0.0 {
        return Err(PipelineError::SurrogateFit("all sample weights are zero".to_string()));
    }

    let x_mean = weights.dot(x) / total_weight;
    let y_mean = weights.dot(y) / total_weight;

    let centered = x - &x_mean;
    let weighted = &centered * &weights.view().insert_axis(Axis(1));

    let mut gram = weighted.t().dot(&centered);
    for j in 0..gram.nrows() {
        gram[[j, j]] += alpha;
    }
    let rhs = weighted.t().dot(&(y - y_mean));

    let coefficients = solve(gram, rhs).ok_or_else(|| {
        PipelineError::SurrogateFit("surrogate regression system is singular".to_string())
    })?;
    let intercept = y_mean - x_mean.dot(&coefficients);

    Ok(RidgeFit {
        coefficients,
        intercept,
    })
}

/// Weighted coefficient of determination of the surrogate on its own samples
fn weighted_r2(fit: &RidgeFit, x: &Array2<f64>, y: &Array1<f64>, weights: &Array1<f64>) -> f64 {
    let y_mean = weights.dot(y) / weights.sum();
    let (residual, total) = x
        .rows()
        .into_iter()
        .zip(y.iter().zip(weights.iter()))
        .fold((0.0, 0.0), |(res, tot), (row, (target, w))| {
            (
                res + w * (target - fit.predict(row)).powi(2),
                tot + w * (target - y_mean).powi(2),
            )
        });

    if total > 0.0 {
        1.0 - residual / total
    } else if residual == 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Gaussian elimination with partial pivoting
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() < f64::EPSILON {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }

        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut solution = Array1::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * solution[k]).sum();
        solution[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(solution)
}
