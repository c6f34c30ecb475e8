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

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Detection parameters a request may override
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    /// Expected fraction of anomalous rows, used by both detectors
    pub contamination: f64,
    /// Neighbourhood size of the local outlier factor
    pub n_neighbors: usize,
    /// Combined score a row must exceed to be reported by `analyze`
    pub anomaly_threshold: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            contamination: 0.1,
            n_neighbors: 20,
            anomaly_threshold: 0.5,
        }
    }
}

/// Parameters as they arrive in a request; absent fields fall back to the
/// configured defaults
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ParameterOverrides {
    pub contamination: Option<f64>,
    pub n_neighbors: Option<usize>,
    pub anomaly_threshold: Option<f64>,
}

impl ParameterOverrides {
    #[must_use]
    pub fn resolve(&self, defaults: &Parameters) -> Parameters {
        Parameters {
            contamination: self.contamination.unwrap_or(defaults.contamination),
            n_neighbors: self.n_neighbors.unwrap_or(defaults.n_neighbors),
            anomaly_threshold: self.anomaly_threshold.unwrap_or(defaults.anomaly_threshold),
        }
    }
}

/// Isolation forest settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_estimators: usize,
    /// Upper bound on rows drawn per tree
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

/// Local surrogate explainer settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurrogateConfig {
    /// Neighbourhood rows sampled around the explained record
    pub num_samples: usize,
    pub ridge_alpha: f64,
    pub seed: u64,
}

impl Default for SurrogateConfig {
    fn default() -> Self {
        Self {
            num_samples: 5000,
            ridge_alpha: 1.0,
            seed: 42,
        }
    }
}

/// Engine configuration, read once at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub defaults: Parameters,
    /// `analyze` only looks at this many leading records
    pub max_records: usize,
    pub forest: ForestConfig,
    pub surrogate: SurrogateConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            defaults: Parameters::default(),
            max_records: 100,
            forest: ForestConfig::default(),
            surrogate: SurrogateConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Get the path to the user config file
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ledgerlens").join("config.json"))
    }

    /// Load the explicit file if given, else the user config file, else defaults.
    /// A broken file is reported and ignored.
    #[must_use]
    pub fn load(explicit: Option<&Path>) -> Self {
        let Some(path) = explicit
            .map(Path::to_path_buf)
            .or_else(|| Self::config_path().filter(|path| path.exists()))
        else {
            tracing::info!("No engine config found, using defaults");
            return Self::default();
        };

        Self::read(&path).map_or_else(
            |e| {
                tracing::warn!("Ignoring engine config {}: {e}", path.display());
                Self::default()
            },
            |config| {
                tracing::info!("Loaded engine config from {}", path.display());
                config
            },
        )
    }

    fn read(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        serde_json::from_str(&contents).map_err(|e| format!("Failed to parse config file: {e}"))
    }
}
