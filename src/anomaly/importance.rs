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

use crate::parser::FEATURES;
use indexmap::IndexMap;
use ndarray::{Array2, Axis};

/// Batch-level feature importance: how far apart flagged and unflagged rows
/// sit per scaled feature, normalized to sum to 1.
///
/// Empty when either group is empty. When the groups have identical means
/// every weight is 0.
#[must_use]
pub fn feature_importance(flags: &[bool], scaled: &Array2<f64>) -> IndexMap<&'static str, f64> {
    let flagged: Vec<usize> = (0..flags.len()).filter(|&i| flags[i]).collect();
    let unflagged: Vec<usize> = (0..flags.len()).filter(|&i| !flags[i]).collect();

    let (Some(flagged_means), Some(unflagged_means)) = (
        scaled.select(Axis(0), &flagged).mean_axis(Axis(0)),
        scaled.select(Axis(0), &unflagged).mean_axis(Axis(0)),
    ) else {
        return IndexMap::new();
    };

    let gaps = (flagged_means - unflagged_means).mapv(f64::abs);
    let total = gaps.sum();
    let gaps = if total > 0.0 { gaps / total } else { gaps };

    FEATURES.iter().copied().zip(gaps.iter().copied()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaled_batch() -> Array2<f64> {
        let mut data = Array2::zeros((4, FEATURES.len()));
        // Flagged rows differ from the rest on the first two features only
        data[[0, 0]] = 3.0;
        data[[0, 1]] = -1.0;
        data[[1, 0]] = 3.0;
        data[[1, 1]] = -1.0;
        data
    }

    #[test]
    fn test_weights_sum_to_one() {
        let importance = feature_importance(&[true, true, false, false], &scaled_batch());

        assert_eq!(importance.len(), FEATURES.len());
        let total: f64 = importance.values().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(importance.values().all(|w| *w >= 0.0));
        assert!((importance["taxableIncome"] - 0.75).abs() < 1e-12);
        assert!((importance["salary"] - 0.25).abs() < 1e-12);
        assert_eq!(importance["revenue"], 0.0);
    }

    #[test]
    fn test_keys_follow_feature_order() {
        let importance = feature_importance(&[true, false, false, false], &scaled_batch());
        let keys: Vec<&str> = importance.keys().copied().collect();
        assert_eq!(keys, FEATURES.to_vec());
    }

    #[test]
    fn test_empty_without_contrast() {
        assert!(feature_importance(&[false; 4], &scaled_batch()).is_empty());
        assert!(feature_importance(&[true; 4], &scaled_batch()).is_empty());
    }
}
