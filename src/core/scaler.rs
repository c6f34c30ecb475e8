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

use crate::error::{PipelineError, PipelineResult};
use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Per-column standardization, `(x - mean) / std`.
///
/// Fitted once per request and then reused through [`StandardScaler::transform`]
/// for single candidate rows. A zero-variance column keeps a scale of `1.0`,
/// so its fitted output is all zeros rather than NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Fit on `matrix` and return the standardized copy
    pub fn fit_transform(matrix: &Array2<f64>) -> PipelineResult<(Self, Array2<f64>)> {
        if matrix.nrows() == 0 {
            return Err(PipelineError::EmptyInput);
        }
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::NonFiniteInput);
        }

        let mean = matrix.mean_axis(Axis(0)).ok_or(PipelineError::EmptyInput)?;
        let scale = matrix
            .std_axis(Axis(0), 0.0)
            .mapv(|std| if std == 0.0 { 1.0 } else { std });

        let scaler = Self { mean, scale };
        let scaled = scaler.transform(matrix)?;
        Ok((scaler, scaled))
    }

    /// Apply the fitted transform without refitting
    pub fn transform(&self, matrix: &Array2<f64>) -> PipelineResult<Array2<f64>> {
        self.check_width(matrix.ncols())?;
        Ok((matrix - &self.mean) / &self.scale)
    }

    pub fn transform_row(&self, row: ArrayView1<'_, f64>) -> PipelineResult<Array1<f64>> {
        self.check_width(row.len())?;
        Ok((&row - &self.mean) / &self.scale)
    }

    fn check_width(&self, actual: usize) -> PipelineResult<()> {
        if actual == self.mean.len() {
            Ok(())
        } else {
            Err(PipelineError::FeatureCountMismatch {
                expected: self.mean.len(),
                actual,
            })
        }
    }
}
