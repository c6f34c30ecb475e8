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

pub mod narrator;
pub mod predictor;
pub mod style;
pub mod surrogate;

pub use predictor::{AnomalyPredictor, ClassProbabilities};
pub use style::ExplanationStyle;
pub use surrogate::{Attribution, Discretization, TabularExplainer};

use crate::config::SurrogateConfig;
use crate::core::stats::DistributionProfile;
use crate::error::PipelineResult;
use crate::parser::FEATURES;
use indexmap::IndexMap;
use ndarray::{Array2, ArrayView1};
use serde::Serialize;

/// One attributed feature, ready for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureContribution {
    pub feature: &'static str,
    /// Style-specific qualifier, e.g. `"salary (Q4 - High)"`
    pub feature_label: String,
    pub display_name: String,
    pub formatted_value: String,
    pub contribution: f64,
    pub context: String,
    pub raw_value: f64,
}

/// Explanation of a single record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub record_index: usize,
    /// Echoed from the request, never recomputed
    pub anomaly_score: f64,
    pub explanation_style: ExplanationStyle,
    pub prediction_probabilities: ClassProbabilities,
    /// Strongest contribution first
    pub feature_contributions: Vec<FeatureContribution>,
    pub feature_values: IndexMap<&'static str, f64>,
}

/// Everything needed to explain records of one batch
#[derive(Debug, Clone)]
pub struct ExplainerSet {
    discretized: TabularExplainer,
    continuous: TabularExplainer,
    profile: DistributionProfile,
}

impl ExplainerSet {
    /// Prepare both explainer configurations and the distribution profile
    /// from the unscaled feature matrix
    pub fn setup(original: &Array2<f64>, config: SurrogateConfig) -> PipelineResult<Self> {
        let set = Self {
            discretized: TabularExplainer::new(original, Discretization::Quartile, config)?,
            continuous: TabularExplainer::new(original, Discretization::Continuous, config)?,
            profile: DistributionProfile::compute(original),
        };
        tracing::debug!("Explainers ready for {} records", original.nrows());
        Ok(set)
    }

    pub fn explain(
        &self,
        record_index: usize,
        row: ArrayView1<'_, f64>,
        anomaly_score: f64,
        style: ExplanationStyle,
        predictor: &AnomalyPredictor<'_>,
    ) -> PipelineResult<Explanation> {
        let explainer = if style.uses_continuous_explainer() {
            &self.continuous
        } else {
            &self.discretized
        };
        let attributions = explainer.explain(row, predictor)?;

        let mut feature_contributions: Vec<FeatureContribution> = attributions
            .iter()
            .map(|attribution| {
                let feature = attribution.feature_name();
                let value = row[attribution.feature];
                let narration = narrator::narrate(feature, value, attribution.weight);
                FeatureContribution {
                    feature,
                    feature_label: style.label(attribution, value, &self.profile),
                    display_name: narration.display_name,
                    formatted_value: narration.formatted_value,
                    contribution: attribution.weight,
                    context: narration.context,
                    raw_value: value,
                }
            })
            .collect();
        feature_contributions.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));

        tracing::info!(
            "Explained record {record_index} with {} contributions ({style} style)",
            feature_contributions.len()
        );

        Ok(Explanation {
            record_index,
            anomaly_score,
            explanation_style: style,
            prediction_probabilities: predictor.predict(row),
            feature_contributions,
            feature_values: FEATURES.iter().copied().zip(row.iter().copied()).collect(),
        })
    }
}
