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

//! Request and response envelopes and the two command flows.
//!
//! Every pipeline failure is caught here and turned into a
//! `{"success": false, "error": ...}` envelope; nothing below this layer
//! decides what the caller sees.

use crate::anomaly::{self, ensemble::DETECTION_METHOD};
use crate::config::{EngineConfig, ParameterOverrides, Parameters};
use crate::core::DetectorSession;
use crate::error::{PipelineError, PipelineResult};
use crate::explain::{Explanation, ExplanationStyle};
use crate::parser::Record;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

const NO_EXPLANATION: &str = "Could not generate explanation";

/// The two supported commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Analyze,
    Explain,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analyze" => Ok(Self::Analyze),
            "explain" => Ok(Self::Explain),
            other => Err(format!("Unknown command '{other}'")),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analyze => f.write_str("analyze"),
            Self::Explain => f.write_str("explain"),
        }
    }
}

fn default_anomaly_score() -> f64 {
    0.5
}

/// Request document read from stdin. `analyze` ignores the explain-only
/// fields.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub data: Vec<Record>,
    #[serde(default)]
    pub parameters: ParameterOverrides,
    #[serde(default)]
    pub record_index: usize,
    /// Echoed back in the explanation, never recomputed
    #[serde(default = "default_anomaly_score")]
    pub anomaly_score: f64,
    #[serde(default)]
    pub explanation_style: Option<String>,
}

/// One reported record of an `analyze` run
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyEntry {
    pub record_index: usize,
    pub record_id: Value,
    pub corp_name: Value,
    pub corp_id: Value,
    pub anomaly_score: f64,
    pub detection_method: &'static str,
    pub record_data: Record,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeReport {
    pub success: bool,
    pub total_records: usize,
    pub anomalies_detected: usize,
    pub anomaly_rate: f64,
    pub parameters_used: Parameters,
    pub feature_importance: IndexMap<&'static str, f64>,
    /// Highest score first
    pub anomalies: Vec<AnomalyEntry>,
}

/// Everything that can be written to stdout
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Response {
    Analyze(AnalyzeReport),
    Explain { success: bool, explanation: Explanation },
    Failure { success: bool, error: String },
    /// Command line problems carry no `success` key
    Usage { error: String },
}

impl Response {
    #[must_use]
    pub fn failure(error: impl fmt::Display) -> Self {
        Self::Failure {
            success: false,
            error: error.to_string(),
        }
    }

    #[must_use]
    pub fn no_command() -> Self {
        Self::Usage {
            error: "No command provided".to_string(),
        }
    }

    #[must_use]
    pub fn unknown_command() -> Self {
        Self::Usage {
            error: "Unknown command".to_string(),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Analyze(_) | Self::Explain { .. })
    }
}

/// Run one command against a raw request document
#[must_use]
pub fn handle(command: Command, input: &str, config: &EngineConfig) -> Response {
    let outcome = serde_json::from_str::<Request>(input)
        .map_err(PipelineError::from)
        .and_then(|request| match command {
            Command::Analyze => analyze(request, config).map(Response::Analyze),
            Command::Explain => explain(request, config).map(|explanation| {
                explanation.map_or_else(
                    || Response::failure(NO_EXPLANATION),
                    |explanation| Response::Explain {
                        success: true,
                        explanation,
                    },
                )
            }),
        });

    outcome.unwrap_or_else(|e| {
        tracing::error!("{command} failed: {e}");
        Response::failure(e)
    })
}

/// Score a batch with both detectors and report the records whose combined
/// score clears the threshold
pub fn analyze(request: Request, config: &EngineConfig) -> PipelineResult<AnalyzeReport> {
    let parameters = request.parameters.resolve(&config.defaults);
    let mut data = request.data;
    if data.len() > config.max_records {
        tracing::info!(
            "Analyzing the first {} of {} records",
            config.max_records,
            data.len()
        );
        data.truncate(config.max_records);
    }

    let mut session = DetectorSession::preprocess(&data)?;
    let global = session.run_isolation_forest(parameters.contamination, &config.forest)?;
    let local = session.run_local_outlier_factor(parameters.n_neighbors, parameters.contamination)?;

    let verdicts = anomaly::combine(&global, &local);
    let flags: Vec<bool> = verdicts.iter().map(|v| v.flagged).collect();
    let feature_importance = session.feature_importance(&flags);

    let mut anomalies: Vec<AnomalyEntry> = data
        .iter()
        .zip(&verdicts)
        .enumerate()
        .filter(|(_, (_, verdict))| verdict.passes(parameters.anomaly_threshold))
        .map(|(index, (record, verdict))| AnomalyEntry {
            record_index: index,
            record_id: record.record_id(index),
            corp_name: record.corp_name(),
            corp_id: record.corp_id(),
            anomaly_score: verdict.score,
            detection_method: DETECTION_METHOD,
            record_data: record.clone(),
        })
        .collect();
    anomalies.sort_by(|a, b| b.anomaly_score.total_cmp(&a.anomaly_score));

    let total_records = data.len();
    let anomaly_rate = if total_records == 0 {
        0.0
    } else {
        anomalies.len() as f64 / total_records as f64
    };
    tracing::info!(
        "Reporting {} of {total_records} records ({} flagged by either detector)",
        anomalies.len(),
        flags.iter().filter(|f| **f).count()
    );

    Ok(AnalyzeReport {
        success: true,
        total_records,
        anomalies_detected: anomalies.len(),
        anomaly_rate,
        parameters_used: parameters,
        feature_importance,
        anomalies,
    })
}

/// Explain one record of the batch against a forest fitted on the whole batch
pub fn explain(request: Request, config: &EngineConfig) -> PipelineResult<Option<Explanation>> {
    let parameters = request.parameters.resolve(&config.defaults);
    let style = ExplanationStyle::from_request(request.explanation_style.as_deref());

    let mut session = DetectorSession::preprocess(&request.data)?;
    session.run_isolation_forest(parameters.contamination, &config.forest)?;
    session.setup_explainers(config.surrogate)?;
    session.explain(request.record_index, request.anomaly_score, style)
}
