// ABOUTME: Sleep quality scoring from duration and deep/REM stage proportions
// ABOUTME: Missing stage data degrades to a documented duration-only score, never a silent zero
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Readiness Intelligence

use serde::{Deserialize, Serialize};

use crate::config::SleepScoringConfig;
use crate::models::SleepSample;

/// Sleep quality score for one night, bounded to [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SleepScore {
    /// Composite quality score 0-100
    pub score: f64,
    /// True when stage data was missing and only duration was scored
    pub duration_only: bool,
}

/// Score one night of sleep against the configured policy
///
/// Duration is scored as the fraction of the target achieved, capped at
/// 100. When deep and REM durations are present, their proportions of total
/// sleep are scored against the configured ideal fractions and blended with
/// the duration component using the configured weights. When either stage is
/// missing the result is the duration score alone, with `duration_only` set
/// so callers can surface the degradation.
#[must_use]
pub fn score_sleep(sample: &SleepSample, config: &SleepScoringConfig) -> SleepScore {
    let duration_score = ((sample.duration_hours / config.target_hours).min(1.0) * 100.0).max(0.0);

    let stage_score = match (sample.deep_hours, sample.rem_hours) {
        (Some(deep), Some(rem)) if sample.duration_hours > 0.0 => {
            let deep_fraction = deep / sample.duration_hours;
            let rem_fraction = rem / sample.duration_hours;
            let deep_component = (deep_fraction / config.deep_target_fraction).min(1.0);
            let rem_component = (rem_fraction / config.rem_target_fraction).min(1.0);
            Some((deep_component + rem_component) / 2.0 * 100.0)
        }
        _ => None,
    };

    match stage_score {
        Some(stages) => {
            let weight_total = config.duration_weight + config.stages_weight;
            let blended = (duration_score * config.duration_weight
                + stages * config.stages_weight)
                / weight_total;
            SleepScore {
                score: blended.clamp(0.0, 100.0),
                duration_only: false,
            }
        }
        None => SleepScore {
            score: duration_score.clamp(0.0, 100.0),
            duration_only: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SleepScoringConfig {
        SleepScoringConfig::default()
    }

    #[test]
    fn full_night_with_ideal_stages_scores_100() {
        let sample = SleepSample {
            duration_hours: 8.0,
            deep_hours: Some(1.6),  // 20% of total
            rem_hours: Some(2.0),   // 25% of total
            light_hours: Some(4.4),
        };
        let score = score_sleep(&sample, &config());
        assert!(!score.duration_only);
        assert!((score.score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn missing_stages_degrades_to_duration_only() {
        let sample = SleepSample {
            duration_hours: 6.0,
            deep_hours: None,
            rem_hours: None,
            light_hours: None,
        };
        let score = score_sleep(&sample, &config());
        assert!(score.duration_only);
        assert!((score.score - 75.0).abs() < 1e-9);
    }

    #[test]
    fn score_stays_bounded() {
        let sample = SleepSample {
            duration_hours: 14.0,
            deep_hours: Some(6.0),
            rem_hours: Some(6.0),
            light_hours: Some(2.0),
        };
        let score = score_sleep(&sample, &config());
        assert!(score.score <= 100.0);
        assert!(score.score >= 0.0);
    }
}
