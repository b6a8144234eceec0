// ABOUTME: Shared data models for daily samples, recommendations, and cost records
// ABOUTME: Boundary validation rejects physiologically impossible values instead of clamping
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Readiness Intelligence

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Lowest resting heart rate accepted as a real reading (bpm)
const MIN_PLAUSIBLE_RESTING_HR: u32 = 20;

/// Highest resting heart rate accepted as a real reading (bpm)
const MAX_PLAUSIBLE_RESTING_HR: u32 = 150;

/// One night of sleep as reported by the wearable
///
/// Stage durations are optional; devices without stage tracking report
/// duration only and the sleep score degrades to a duration-only score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepSample {
    /// Total sleep duration (hours)
    pub duration_hours: f64,
    /// Deep sleep duration (hours)
    pub deep_hours: Option<f64>,
    /// REM sleep duration (hours)
    pub rem_hours: Option<f64>,
    /// Light sleep duration (hours)
    pub light_hours: Option<f64>,
}

impl SleepSample {
    fn validate(&self) -> AppResult<()> {
        if !self.duration_hours.is_finite() || self.duration_hours < 0.0 {
            return Err(AppError::invalid_sample(
                "sleep.duration_hours",
                format!(
                    "sleep duration must be non-negative, got {}",
                    self.duration_hours
                ),
            ));
        }
        if self.duration_hours > 24.0 {
            return Err(AppError::invalid_sample(
                "sleep.duration_hours",
                format!("sleep duration exceeds 24 hours: {}", self.duration_hours),
            ));
        }
        for (field, value) in [
            ("sleep.deep_hours", self.deep_hours),
            ("sleep.rem_hours", self.rem_hours),
            ("sleep.light_hours", self.light_hours),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(AppError::invalid_sample(
                        field,
                        format!("sleep stage duration must be non-negative, got {v}"),
                    ));
                }
                if v > self.duration_hours {
                    return Err(AppError::invalid_sample(
                        field,
                        "sleep stage duration exceeds total sleep duration",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// One calendar day of raw wearable input
///
/// Owned by the ingestion collaborator; the engine treats it as immutable.
/// Absent fields mean "no reading that day", never zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySample {
    /// Athlete this sample belongs to
    pub user_id: Uuid,
    /// Calendar day of the sample
    pub date: NaiveDate,
    /// Resting heart rate (bpm)
    pub resting_hr_bpm: Option<u32>,
    /// Overnight HRV as RMSSD (ms)
    pub hrv_rmssd_ms: Option<f64>,
    /// Last night's sleep
    pub sleep: Option<SleepSample>,
    /// Daily step count
    pub steps: Option<u32>,
    /// Training load impulse for the day's activity, if any (TRIMP/TSS-like)
    pub load_impulse: Option<f64>,
}

impl DailySample {
    /// Reject malformed or physiologically impossible values
    ///
    /// The engine never clamps impossible values into range: a clamped
    /// reading would silently corrupt the rolling statistics.
    ///
    /// # Errors
    ///
    /// Returns [`crate::errors::ErrorCode::InvalidSample`] naming the
    /// offending field.
    pub fn validate(&self, max_plausible_rmssd_ms: f64) -> AppResult<()> {
        if let Some(hrv) = self.hrv_rmssd_ms {
            if !hrv.is_finite() || hrv <= 0.0 {
                return Err(AppError::invalid_sample(
                    "hrv_rmssd_ms",
                    format!("HRV must be a positive number of milliseconds, got {hrv}"),
                ));
            }
            if hrv > max_plausible_rmssd_ms {
                return Err(AppError::invalid_sample(
                    "hrv_rmssd_ms",
                    format!("HRV {hrv} ms exceeds plausible maximum {max_plausible_rmssd_ms} ms"),
                ));
            }
        }
        if let Some(hr) = self.resting_hr_bpm {
            if !(MIN_PLAUSIBLE_RESTING_HR..=MAX_PLAUSIBLE_RESTING_HR).contains(&hr) {
                return Err(AppError::invalid_sample(
                    "resting_hr_bpm",
                    format!(
                        "resting HR {hr} outside plausible range \
                         {MIN_PLAUSIBLE_RESTING_HR}-{MAX_PLAUSIBLE_RESTING_HR} bpm"
                    ),
                ));
            }
        }
        if let Some(load) = self.load_impulse {
            if !load.is_finite() || load < 0.0 {
                return Err(AppError::invalid_sample(
                    "load_impulse",
                    format!("load impulse must be non-negative, got {load}"),
                ));
            }
        }
        if let Some(sleep) = &self.sleep {
            sleep.validate()?;
        }
        Ok(())
    }
}

/// Acute:chronic workload ratio injury-risk band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcwrBand {
    /// Load well below chronic baseline; detraining territory
    Undertraining,
    /// Load in the productive range
    Optimal,
    /// Acute spike above chronic baseline; elevated injury risk
    HighRisk,
}

/// Intensity the reasoning model recommends for the day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedIntensity {
    /// Full rest day
    Rest,
    /// Low-intensity recovery work
    Easy,
    /// Normal planned training
    Moderate,
    /// Quality session / hard training appropriate
    Hard,
}

/// Structured recommendation returned by the external reasoning call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationPayload {
    /// One-line headline shown to the athlete
    pub headline: String,
    /// Longer guidance text
    pub guidance: String,
    /// Suggested session intensity
    pub suggested_intensity: SuggestedIntensity,
}

/// Token counts reported alongside a reasoning response
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Uncached prompt tokens billed at the full input rate
    pub input_tokens: u64,
    /// Completion tokens
    pub output_tokens: u64,
    /// Prompt tokens served from the provider's prompt cache
    pub cached_tokens: u64,
}

/// Append-only record of one external reasoning call
///
/// Never mutated after creation; monthly aggregates are computed directly
/// from these records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRecord {
    /// Unique call identifier
    pub call_id: Uuid,
    /// User the call was made for
    pub user_id: Uuid,
    /// Calendar day of the call (aggregation key)
    pub date: NaiveDate,
    /// Model that served the call
    pub model: String,
    /// Uncached input tokens
    pub input_tokens: u64,
    /// Output tokens
    pub output_tokens: u64,
    /// Cached input tokens
    pub cached_tokens: u64,
    /// Cost in USD computed from the pricing table at record time
    pub computed_cost: f64,
    /// Wall-clock time the record was written
    pub recorded_at: DateTime<Utc>,
}

/// Budget alert level reported by the cost ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    /// Spend below the notice threshold
    None,
    /// Spend at or above the notice threshold (default 75%)
    Notice,
    /// Spend at or above the warning threshold (default 90%)
    Warning,
    /// Monthly budget exhausted (>= 100%)
    Exceeded,
}

/// Boolean qualifiers attached to a readiness assessment
///
/// Callers must branch on these flags, not on magic score thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessFlags {
    /// ACWR in the high-risk band or HRV sharply suppressed
    pub overtraining_risk: bool,
    /// One or more sub-metrics lacked the minimum history; score is low-confidence
    pub insufficient_data: bool,
}

/// Derived metrics underlying a readiness assessment
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReadinessMetrics {
    /// Today's HRV z-score against the rolling baseline (null below minimum history)
    pub hrv_z_score: Option<f64>,
    /// Acute:chronic workload ratio (null when chronic load is zero)
    pub acwr: Option<f64>,
    /// ACWR injury-risk band (null when ACWR is null)
    pub acwr_band: Option<AcwrBand>,
    /// Chronic training load (fitness)
    pub ctl: f64,
    /// Acute training load (fatigue)
    pub atl: f64,
    /// Training stress balance (CTL - ATL, form)
    pub tsb: f64,
    /// Sleep quality score 0-100 (null when no sleep was recorded)
    pub sleep_score: Option<f64>,
}

/// Final output handed to the orchestration/API layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResult {
    /// Athlete the assessment is for
    pub user_id: Uuid,
    /// Day assessed
    pub date: NaiveDate,
    /// Composite readiness score 0-100
    pub composite_score: f64,
    /// Assessment qualifiers
    pub flags: ReadinessFlags,
    /// Underlying derived metrics
    pub metrics: ReadinessMetrics,
    /// Recommendation from the reasoning model (possibly served from cache)
    pub recommendation: RecommendationPayload,
    /// Whether the recommendation came from cache
    pub cache_hit: bool,
    /// USD cost incurred by this request (`None` on cache hits)
    pub cost_incurred: Option<f64>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample(user_id: Uuid) -> DailySample {
        DailySample {
            user_id,
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            resting_hr_bpm: Some(48),
            hrv_rmssd_ms: Some(62.0),
            sleep: Some(SleepSample {
                duration_hours: 7.5,
                deep_hours: Some(1.4),
                rem_hours: Some(1.8),
                light_hours: Some(4.3),
            }),
            steps: Some(9_000),
            load_impulse: Some(80.0),
        }
    }

    #[test]
    fn valid_sample_passes() {
        assert!(sample(Uuid::new_v4()).validate(350.0).is_ok());
    }

    #[test]
    fn negative_hrv_rejected_with_field() {
        let mut s = sample(Uuid::new_v4());
        s.hrv_rmssd_ms = Some(-5.0);
        let err = s.validate(350.0).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("hrv_rmssd_ms"));
    }

    #[test]
    fn stage_exceeding_duration_rejected() {
        let mut s = sample(Uuid::new_v4());
        s.sleep = Some(SleepSample {
            duration_hours: 6.0,
            deep_hours: Some(7.0),
            rem_hours: None,
            light_hours: None,
        });
        assert!(s.validate(350.0).is_err());
    }
}
