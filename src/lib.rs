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

//! LedgerLens scores tabular financial filings for anomalies and explains
//! individual verdicts in business language.
//!
//! The binary reads one JSON request from stdin and writes one JSON
//! response to stdout; see [`dispatch`] for the envelopes.

pub mod anomaly;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod error;
pub mod explain;
pub mod parser;

pub use config::EngineConfig;
pub use dispatch::{handle, Command, Response};
pub use error::{PipelineError, PipelineResult};
