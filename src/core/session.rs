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

use crate::anomaly::{self, DetectorOutput, IsolationForest, LocalOutlierFactor};
use crate::config::{ForestConfig, SurrogateConfig};
use crate::core::scaler::StandardScaler;
use crate::error::{PipelineError, PipelineResult};
use crate::explain::{AnomalyPredictor, ExplainerSet, Explanation, ExplanationStyle};
use crate::parser::{self, Record};
use indexmap::IndexMap;
use ndarray::Array2;

/// Owns every fitted artifact of one request.
///
/// Created at the start of a command flow and dropped at its end; nothing
/// survives between requests.
#[derive(Debug)]
pub struct DetectorSession {
    original: Array2<f64>,
    scaled: Array2<f64>,
    scaler: StandardScaler,
    forest: Option<IsolationForest>,
    explainers: Option<ExplainerSet>,
}

impl DetectorSession {
    /// Normalize the records and fit the scaler on them
    pub fn preprocess(records: &[Record]) -> PipelineResult<Self> {
        let original = parser::feature_matrix(records);
        let (scaler, scaled) = StandardScaler::fit_transform(&original)?;
        tracing::debug!("Preprocessed {} records", records.len());

        Ok(Self {
            original,
            scaled,
            scaler,
            forest: None,
            explainers: None,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.original.nrows()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fit the global detector and keep it for explanations
    pub fn run_isolation_forest(
        &mut self,
        contamination: f64,
        config: &ForestConfig,
    ) -> PipelineResult<DetectorOutput> {
        let forest = IsolationForest::fit(&self.scaled, contamination, config)?;
        let output = forest.detect(&self.scaled);
        tracing::info!(
            "Isolation forest flagged {} of {} records",
            output.flags.iter().filter(|f| **f).count(),
            self.len()
        );
        self.forest = Some(forest);
        Ok(output)
    }

    pub fn run_local_outlier_factor(
        &self,
        n_neighbors: usize,
        contamination: f64,
    ) -> PipelineResult<DetectorOutput> {
        let lof = LocalOutlierFactor::fit(&self.scaled, n_neighbors, contamination)?;
        let output = lof.detect();
        tracing::info!(
            "Local outlier factor (k = {}) flagged {} of {} records",
            lof.neighbors(),
            output.flags.iter().filter(|f| **f).count(),
            self.len()
        );
        Ok(output)
    }

    pub fn setup_explainers(&mut self, config: SurrogateConfig) -> PipelineResult<()> {
        self.explainers = Some(ExplainerSet::setup(&self.original, config)?);
        Ok(())
    }

    /// Global importance over the combined flags of this batch
    #[must_use]
    pub fn feature_importance(&self, flags: &[bool]) -> IndexMap<&'static str, f64> {
        anomaly::feature_importance(flags, &self.scaled)
    }

    /// The forest if one was fitted, the constant prior otherwise
    #[must_use]
    pub fn predictor(&self) -> AnomalyPredictor<'_> {
        self.forest
            .as_ref()
            .map_or(AnomalyPredictor::Fallback, |forest| AnomalyPredictor::Global {
                scaler: &self.scaler,
                forest,
            })
    }

    /// Explain one record. `None` when the explainers were never set up.
    pub fn explain(
        &self,
        record_index: usize,
        anomaly_score: f64,
        style: ExplanationStyle,
    ) -> PipelineResult<Option<Explanation>> {
        let Some(explainers) = &self.explainers else {
            tracing::warn!("Explanation requested before explainers were set up");
            return Ok(None);
        };
        if record_index >= self.len() {
            return Err(PipelineError::RecordIndexOutOfRange {
                index: record_index,
                len: self.len(),
            });
        }

        explainers
            .explain(
                record_index,
                self.original.row(record_index),
                anomaly_score,
                style,
                &self.predictor(),
            )
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Vec<Record> {
        let mut values: Vec<serde_json::Value> = (0..12)
            .map(|i| {
                json!({
                    "taxableIncome": 40_000 + i * 250,
                    "salary": format!("${},000.00", 20 + i),
                    "revenue": 150_000 + i * 900,
                    "amountTaxable": 30_000 + i * 100,
                    "bubblegumTax": 300 + i,
                    "confectionarySalesTaxPercent": 6.5,
                })
            })
            .collect();
        values.push(json!({"corpName": "Hollow Shell Inc"}));
        serde_json::from_value(serde_json::Value::Array(values)).expect("records")
    }

    fn small_surrogate() -> SurrogateConfig {
        SurrogateConfig {
            num_samples: 300,
            ..SurrogateConfig::default()
        }
    }

    #[test]
    fn test_predictor_falls_back_without_forest() {
        let session = DetectorSession::preprocess(&records()).expect("preprocess");
        assert!(matches!(session.predictor(), AnomalyPredictor::Fallback));
        assert_eq!(session.len(), 13);
    }

    #[test]
    fn test_explain_requires_setup() {
        let session = DetectorSession::preprocess(&records()).expect("preprocess");
        let result = session
            .explain(0, 0.5, ExplanationStyle::Thresholds)
            .expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn test_explain_rejects_out_of_range_index() {
        let mut session = DetectorSession::preprocess(&records()).expect("preprocess");
        session.setup_explainers(small_surrogate()).expect("setup");
        let result = session.explain(13, 0.5, ExplanationStyle::Raw);
        assert!(matches!(
            result,
            Err(PipelineError::RecordIndexOutOfRange { index: 13, len: 13 })
        ));
    }

    #[test]
    fn test_forest_backs_the_predictor() {
        let mut session = DetectorSession::preprocess(&records()).expect("preprocess");
        let output = session
            .run_isolation_forest(0.1, &ForestConfig::default())
            .expect("forest");
        assert_eq!(output.flags.len(), 13);
        assert!(matches!(session.predictor(), AnomalyPredictor::Global { .. }));

        session.setup_explainers(small_surrogate()).expect("setup");
        let explanation = session
            .explain(12, 0.9, ExplanationStyle::StdDev)
            .expect("explain")
            .expect("explainers set up");
        assert!(explanation.prediction_probabilities.anomaly > 0.5);
        assert_eq!(explanation.anomaly_score, 0.9);
    }

    #[test]
    fn test_empty_batch_is_an_error() {
        assert!(matches!(
            DetectorSession::preprocess(&[]),
            Err(PipelineError::EmptyInput)
        ));
    }
}
