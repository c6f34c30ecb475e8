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

//! Failures of a single `analyze` or `explain` run.
//!
//! The `Display` text of a [`PipelineError`] is what ends up in the
//! `error` field of the failure envelope, so messages are written for the
//! caller, not for a developer.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The request document could not be decoded
    #[error("Malformed request: {0}")]
    MalformedRequest(#[from] serde_json::Error),

    /// Nothing to fit on
    #[error("Found array with 0 sample(s) while a minimum of 1 is required")]
    EmptyInput,

    #[error("Input contains NaN or infinity")]
    NonFiniteInput,

    #[error("contamination must be in (0, 0.5], got {0}")]
    InvalidContamination(f64),

    #[error("n_neighbors must be at least 1, got {0}")]
    InvalidNeighbors(usize),

    #[error("Local outlier factor needs at least 2 samples, got {0}")]
    TooFewSamples(usize),

    #[error("Expected {expected} features, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("record_index {index} is out of bounds for {len} records")]
    RecordIndexOutOfRange { index: usize, len: usize },

    /// The surrogate regression had no usable solution
    #[error("Surrogate model fit failed: {0}")]
    SurrogateFit(String),
}
