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

use crate::anomaly::DetectorOutput;

/// Label attached to every reported anomaly
pub const DETECTION_METHOD: &str = "Combined (Isolation Forest + LOF)";

/// Ensemble verdict for one row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombinedVerdict {
    /// Either detector flagged the row
    pub flagged: bool,
    /// Mean magnitude of the two detector scores
    pub score: f64,
}

impl CombinedVerdict {
    /// Output gate of `analyze`. Independent of [`CombinedVerdict::flagged`]:
    /// a row both detectors flag is still left out of the report when its
    /// score does not clear the threshold.
    #[must_use]
    pub const fn passes(&self, anomaly_threshold: f64) -> bool {
        self.score > anomaly_threshold
    }
}

/// OR the flags, average the score magnitudes
#[must_use]
pub fn combine(global: &DetectorOutput, local: &DetectorOutput) -> Vec<CombinedVerdict> {
    global
        .flags
        .iter()
        .zip(&global.scores)
        .zip(local.flags.iter().zip(&local.scores))
        .map(|((flag_a, score_a), (flag_b, score_b))| CombinedVerdict {
            flagged: *flag_a || *flag_b,
            score: (score_a.abs() + score_b.abs()) / 2.0,
        })
        .collect()
}
