// ABOUTME: Composite readiness scoring from HRV, TSB, sleep, and ACWR band
// ABOUTME: Missing sub-metrics flag the result as low-confidence instead of failing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Readiness Intelligence

use serde::{Deserialize, Serialize};

use crate::config::ReadinessWeights;
use crate::errors::{AppError, AppResult};
use crate::models::{AcwrBand, ReadinessFlags, ReadinessMetrics};

/// Neutral subscore used when a sub-metric has no data yet
const NEUTRAL_SUBSCORE: f64 = 50.0;

/// Points of readiness per unit of HRV z-score
const HRV_Z_SLOPE: f64 = 15.0;

/// Points of readiness per unit of TSB
const TSB_SLOPE: f64 = 2.0;

/// HRV z-score at or below which overtraining risk is flagged
const OVERTRAINING_HRV_Z: f64 = -1.5;

/// A composite readiness assessment for one day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessAssessment {
    /// Composite 0-100 score
    pub composite_score: f64,
    /// Qualifiers callers must branch on
    pub flags: ReadinessFlags,
    /// The metrics the score was composed from
    pub metrics: ReadinessMetrics,
}

/// Combines derived metrics into one composite score plus flags
#[derive(Debug, Clone)]
pub struct ReadinessScorer {
    weights: ReadinessWeights,
}

impl Default for ReadinessScorer {
    fn default() -> Self {
        Self {
            weights: ReadinessWeights::default(),
        }
    }
}

impl ReadinessScorer {
    /// Create a scorer with the given weighting table
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when weights are negative or sum to zero.
    pub fn new(weights: ReadinessWeights) -> AppResult<Self> {
        if weights.hrv < 0.0 || weights.tsb < 0.0 || weights.sleep < 0.0 || weights.acwr < 0.0 {
            return Err(AppError::config("readiness weights must be non-negative"));
        }
        if weights.total() <= 0.0 {
            return Err(AppError::config("readiness weights must not sum to zero"));
        }
        Ok(Self { weights })
    }

    /// Compose the metrics into an assessment
    ///
    /// A score is always produced; missing sub-metrics contribute a neutral
    /// subscore and set `insufficient_data` so callers know the confidence
    /// is low. Absence of history is an expected case, not an error.
    #[must_use]
    pub fn score(&self, metrics: &ReadinessMetrics) -> ReadinessAssessment {
        let mut insufficient = false;

        let hrv_subscore = metrics.hrv_z_score.map_or_else(
            || {
                insufficient = true;
                NEUTRAL_SUBSCORE
            },
            |z| HRV_Z_SLOPE.mul_add(z, NEUTRAL_SUBSCORE).clamp(0.0, 100.0),
        );

        let tsb_subscore = TSB_SLOPE
            .mul_add(metrics.tsb, NEUTRAL_SUBSCORE)
            .clamp(0.0, 100.0);

        let sleep_subscore = metrics.sleep_score.unwrap_or_else(|| {
            insufficient = true;
            NEUTRAL_SUBSCORE
        });

        let acwr_subscore = metrics.acwr_band.map_or_else(
            || {
                insufficient = true;
                NEUTRAL_SUBSCORE
            },
            |band| match band {
                AcwrBand::Optimal => 100.0,
                AcwrBand::Undertraining => 70.0,
                AcwrBand::HighRisk => 0.0,
            },
        );

        let composite = (hrv_subscore * self.weights.hrv
            + tsb_subscore * self.weights.tsb
            + sleep_subscore * self.weights.sleep
            + acwr_subscore * self.weights.acwr)
            / self.weights.total();

        let overtraining_risk = metrics.acwr_band == Some(AcwrBand::HighRisk)
            || metrics
                .hrv_z_score
                .is_some_and(|z| z <= OVERTRAINING_HRV_Z);

        ReadinessAssessment {
            composite_score: composite.clamp(0.0, 100.0),
            flags: ReadinessFlags {
                overtraining_risk,
                insufficient_data: insufficient,
            },
            metrics: *metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> ReadinessMetrics {
        ReadinessMetrics {
            hrv_z_score: Some(0.0),
            acwr: Some(1.0),
            acwr_band: Some(AcwrBand::Optimal),
            ctl: 60.0,
            atl: 60.0,
            tsb: 0.0,
            sleep_score: Some(80.0),
        }
    }

    #[test]
    fn complete_metrics_produce_confident_score() {
        let assessment = ReadinessScorer::default().score(&metrics());
        assert!(!assessment.flags.insufficient_data);
        assert!(!assessment.flags.overtraining_risk);
        assert!(assessment.composite_score > 0.0);
        assert!(assessment.composite_score <= 100.0);
    }

    #[test]
    fn missing_hrv_flags_insufficient_but_still_scores() {
        let mut m = metrics();
        m.hrv_z_score = None;
        let assessment = ReadinessScorer::default().score(&m);
        assert!(assessment.flags.insufficient_data);
        assert!(assessment.composite_score > 0.0);
    }

    #[test]
    fn high_risk_band_flags_overtraining() {
        let mut m = metrics();
        m.acwr = Some(1.8);
        m.acwr_band = Some(AcwrBand::HighRisk);
        let assessment = ReadinessScorer::default().score(&m);
        assert!(assessment.flags.overtraining_risk);
    }

    #[test]
    fn suppressed_hrv_flags_overtraining() {
        let mut m = metrics();
        m.hrv_z_score = Some(-2.0);
        let assessment = ReadinessScorer::default().score(&m);
        assert!(assessment.flags.overtraining_risk);
    }

    #[test]
    fn zero_weights_rejected() {
        let weights = ReadinessWeights {
            hrv: 0.0,
            tsb: 0.0,
            sleep: 0.0,
            acwr: 0.0,
        };
        assert!(ReadinessScorer::new(weights).is_err());
    }
}
