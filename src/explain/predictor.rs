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

use crate::anomaly::IsolationForest;
use crate::core::scaler::StandardScaler;
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use serde::Serialize;

/// Two-class output of the model being explained
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassProbabilities {
    pub normal: f64,
    pub anomaly: f64,
}

impl ClassProbabilities {
    /// Used whenever no fitted detector is available
    pub const PRIOR: Self = Self {
        normal: 0.3,
        anomaly: 0.7,
    };

    /// Logistic squash of a decision score; higher scores are more normal
    #[must_use]
    pub fn from_decision(score: f64) -> Self {
        let normal = 1.0 / (1.0 + (-score).exp());
        Self {
            normal,
            anomaly: 1.0 - normal,
        }
    }
}

/// The classifier handed to the surrogate explainer.
///
/// Operates on unscaled rows; the global variant rescales with the
/// request's fitted scaler before asking the forest.
#[derive(Debug, Clone, Copy)]
pub enum AnomalyPredictor<'a> {
    Global {
        scaler: &'a StandardScaler,
        forest: &'a IsolationForest,
    },
    Fallback,
}

impl AnomalyPredictor<'_> {
    /// Never fails; a row the scaler rejects degrades to the prior
    #[must_use]
    pub fn predict(&self, row: ArrayView1<'_, f64>) -> ClassProbabilities {
        match self {
            Self::Global { scaler, forest } => scaler.transform_row(row).map_or_else(
                |e| {
                    tracing::warn!("Falling back to prior probabilities: {e}");
                    ClassProbabilities::PRIOR
                },
                |scaled| ClassProbabilities::from_decision(forest.decision_row(scaled.view())),
            ),
            Self::Fallback => ClassProbabilities::PRIOR,
        }
    }

    #[must_use]
    pub fn predict_batch(&self, rows: &Array2<f64>) -> Vec<ClassProbabilities> {
        (0..rows.nrows())
            .into_par_iter()
            .map(|i| self.predict(rows.row(i)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForestConfig;
    use ndarray::array;

    #[test]
    fn test_logistic_mapping() {
        let even = ClassProbabilities::from_decision(0.0);
        assert!((even.normal - 0.5).abs() < 1e-12);
        assert!((even.anomaly - 0.5).abs() < 1e-12);

        let normal = ClassProbabilities::from_decision(2.0);
        assert!(normal.normal > 0.85);
        assert!((normal.normal + normal.anomaly - 1.0).abs() < 1e-12);

        let odd = ClassProbabilities::from_decision(-2.0);
        assert!(odd.anomaly > 0.85);
    }

    #[test]
    fn test_fallback_is_prior() {
        let probs = AnomalyPredictor::Fallback.predict(array![1.0, 2.0].view());
        assert_eq!(probs, ClassProbabilities::PRIOR);
    }

    #[test]
    fn test_global_rescales_before_scoring() {
        let raw = array![[10.0, 100.0], [11.0, 110.0], [12.0, 120.0], [13.0, 130.0], [90.0, 10.0]];
        let (scaler, scaled) = StandardScaler::fit_transform(&raw).expect("scaler");
        let forest = IsolationForest::fit(&scaled, 0.2, &ForestConfig::default()).expect("forest");

        let predictor = AnomalyPredictor::Global {
            scaler: &scaler,
            forest: &forest,
        };
        let expected = ClassProbabilities::from_decision(forest.decision_row(scaled.row(4)));
        assert_eq!(predictor.predict(raw.row(4)), expected);

        let batch = predictor.predict_batch(&raw);
        assert_eq!(batch.len(), 5);
        assert_eq!(batch[4], expected);
    }

    #[test]
    fn test_width_mismatch_degrades_to_prior() {
        let raw = array![[1.0, 2.0], [3.0, 5.0], [4.0, 4.0]];
        let (scaler, scaled) = StandardScaler::fit_transform(&raw).expect("scaler");
        let forest = IsolationForest::fit(&scaled, 0.1, &ForestConfig::default()).expect("forest");
        let predictor = AnomalyPredictor::Global {
            scaler: &scaler,
            forest: &forest,
        };
        assert_eq!(
            predictor.predict(array![1.0, 2.0, 3.0].view()),
            ClassProbabilities::PRIOR
        );
    }
}
