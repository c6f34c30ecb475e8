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

pub mod ensemble;
pub mod importance;
pub mod isolation;
pub mod lof;

pub use ensemble::{combine, CombinedVerdict};
pub use importance::feature_importance;
pub use isolation::IsolationForest;
pub use lof::LocalOutlierFactor;

use crate::error::{PipelineError, PipelineResult};

/// Per-row verdicts of one detector. Lower scores are more anomalous.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorOutput {
    pub flags: Vec<bool>,
    pub scores: Vec<f64>,
}

/// Both detectors accept a contamination in `(0, 0.5]`
pub fn validate_contamination(contamination: f64) -> PipelineResult<()> {
    if contamination > 0.0 && contamination <= 0.5 {
        Ok(())
    } else {
        Err(PipelineError::InvalidContamination(contamination))
    }
}
