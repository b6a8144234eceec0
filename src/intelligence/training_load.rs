// ABOUTME: Rolling training-load statistics: HRV baseline, ACWR EWMAs, and CTL/ATL/TSB decay
// ABOUTME: Pure state transition per daily sample; date-ordered application is enforced
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Readiness Intelligence

//! # Training-Load Engine
//!
//! Maintains per-user rolling state derived from daily wearable samples:
//!
//! - **HRV baseline**: mean and standard deviation over a fixed trailing
//!   window (default 60 days) of daily RMSSD readings. The window is stored
//!   in state and the statistics are recomputed with Welford's single-pass
//!   algorithm on every update. This is the fixed-window variant, not an
//!   exponentially weighted approximation; the two produce different
//!   z-scores.
//! - **ACWR**: acute (7-day half-life) and chronic (28-day half-life)
//!   exponentially weighted daily load averages. The ratio is undefined
//!   (`None`) while chronic load is zero.
//! - **CTL/ATL/TSB**: the Banister-style fitness-fatigue recursion
//!   `CTL_t = CTL_{t-1} + (load_t - CTL_{t-1}) / tc`. The first sample seeds
//!   `CTL = ATL = load` to avoid an artificial initial dip.
//!
//! Gap days (no sample) are replayed with zero load impulse for the decay
//! recursions, but contribute no HRV reading: an absent HRV measurement is
//! missing data, never zero.

use std::collections::VecDeque;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{AcwrBand, DailySample, ReadinessMetrics};

use super::sleep::{score_sleep, SleepScore};

/// One dated HRV reading retained in the baseline window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HrvReading {
    /// Day the reading was taken
    pub date: NaiveDate,
    /// RMSSD in milliseconds
    pub rmssd_ms: f64,
}

/// Per-user rolling derived state
///
/// Mutated once per day per user, strictly in date order: the decay
/// recursions are order-dependent, so out-of-order application is rejected
/// rather than absorbed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingLoadState {
    /// Owning athlete
    pub user_id: Uuid,
    /// Date of the most recently applied sample
    pub last_date: Option<NaiveDate>,
    /// 7-day-half-life EWMA of daily load impulse
    pub acute_load: Option<f64>,
    /// 28-day-half-life EWMA of daily load impulse
    pub chronic_load: Option<f64>,
    /// Chronic training load (fitness), 42-day time constant
    pub ctl: Option<f64>,
    /// Acute training load (fatigue), 7-day time constant
    pub atl: Option<f64>,
    /// Trailing window of HRV readings backing the baseline
    pub hrv_window: VecDeque<HrvReading>,
    /// Today's HRV z-score against the baseline, if computable
    pub hrv_z_score: Option<f64>,
    /// Last night's sleep quality, if sleep was recorded
    pub sleep_score: Option<SleepScore>,
}

impl TrainingLoadState {
    /// Fresh state for a user with no history
    #[must_use]
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            last_date: None,
            acute_load: None,
            chronic_load: None,
            ctl: None,
            atl: None,
            hrv_window: VecDeque::new(),
            hrv_z_score: None,
            sleep_score: None,
        }
    }

    /// Training stress balance (CTL - ATL), `None` before the first sample
    #[must_use]
    pub fn tsb(&self) -> Option<f64> {
        match (self.ctl, self.atl) {
            (Some(ctl), Some(atl)) => Some(ctl - atl),
            _ => None,
        }
    }

    /// Acute:chronic workload ratio; `None` when chronic load is zero
    ///
    /// Never divides by zero and never substitutes a default: a zero
    /// chronic load means the ratio is meaningless, not infinite.
    #[must_use]
    pub fn acwr(&self) -> Option<f64> {
        match (self.acute_load, self.chronic_load) {
            (Some(acute), Some(chronic)) if chronic > 0.0 => Some(acute / chronic),
            _ => None,
        }
    }
}

/// Welford's single-pass mean and sample standard deviation
///
/// Returns `(mean, stddev, count)`; stddev is 0.0 below two values.
fn welford(values: impl Iterator<Item = f64>) -> (f64, f64, usize) {
    let mut count = 0_usize;
    let mut mean = 0.0;
    let mut m2 = 0.0;
    for value in values {
        count += 1;
        let delta = value - mean;
        mean += delta / count as f64;
        m2 += delta * (value - mean);
    }
    let stddev = if count > 1 {
        (m2 / (count - 1) as f64).sqrt()
    } else {
        0.0
    };
    (mean, stddev, count)
}

/// The statistical engine folding daily samples into rolling state
#[derive(Debug, Clone)]
pub struct TrainingLoadEngine {
    config: EngineConfig,
}

impl Default for TrainingLoadEngine {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }
}

impl TrainingLoadEngine {
    /// Create an engine with the given configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the configuration is inconsistent.
    pub fn new(config: EngineConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Engine configuration (read-only)
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply one daily sample, producing the next state
    ///
    /// Pure function of `(state, sample)`: replaying the same ordered
    /// sequence from a fresh state always yields the same final state.
    ///
    /// # Errors
    ///
    /// - `InvalidSample` for malformed or physiologically impossible input
    /// - `OutOfOrderSample` when the sample's date does not advance the state
    /// - `InvalidInput` when the sample belongs to a different user
    pub fn apply_daily_sample(
        &self,
        state: &TrainingLoadState,
        sample: &DailySample,
    ) -> AppResult<TrainingLoadState> {
        if sample.user_id != state.user_id {
            return Err(AppError::invalid_input(format!(
                "sample for user {} applied to state of user {}",
                sample.user_id, state.user_id
            )));
        }
        sample.validate(self.config.hrv.max_plausible_rmssd_ms)?;

        if let Some(last) = state.last_date {
            if sample.date <= last {
                return Err(AppError::out_of_order_sample(format!(
                    "sample for {} does not advance state last applied on {last}",
                    sample.date
                )));
            }
        }

        let mut next = state.clone();
        let load_today = sample.load_impulse.unwrap_or(0.0);

        if state.last_date.is_none() {
            // First sample ever: seed all load statistics with today's load
            // so the decay recursions do not start from an artificial dip.
            next.acute_load = Some(load_today);
            next.chronic_load = Some(load_today);
            next.ctl = Some(load_today);
            next.atl = Some(load_today);
        } else {
            let elapsed = state
                .last_date
                .map_or(1, |last| (sample.date - last).num_days());
            // Gap days carry zero load impulse through the recursions.
            for day in 1..=elapsed {
                let load = if day == elapsed { load_today } else { 0.0 };
                self.step_load_day(&mut next, load);
            }
        }

        self.roll_hrv_window(&mut next, sample);
        next.sleep_score = sample
            .sleep
            .as_ref()
            .map(|sleep| score_sleep(sleep, &self.config.sleep));
        next.last_date = Some(sample.date);

        Ok(next)
    }

    /// Replay an ordered sample sequence from scratch (backfill support)
    ///
    /// # Errors
    ///
    /// Propagates the first per-sample error encountered.
    pub fn replay(&self, user_id: Uuid, samples: &[DailySample]) -> AppResult<TrainingLoadState> {
        let mut state = TrainingLoadState::new(user_id);
        for sample in samples {
            state = self.apply_daily_sample(&state, sample)?;
        }
        Ok(state)
    }

    /// Classify an ACWR value into its injury-risk band
    #[must_use]
    pub fn acwr_band(&self, acwr: f64) -> AcwrBand {
        if acwr < self.config.acwr.undertraining_max {
            AcwrBand::Undertraining
        } else if acwr <= self.config.acwr.optimal_max {
            AcwrBand::Optimal
        } else {
            AcwrBand::HighRisk
        }
    }

    /// Extract the derived metrics a readiness assessment is built from
    #[must_use]
    pub fn derive_metrics(&self, state: &TrainingLoadState) -> ReadinessMetrics {
        let acwr = state.acwr();
        ReadinessMetrics {
            hrv_z_score: state.hrv_z_score,
            acwr,
            acwr_band: acwr.map(|r| self.acwr_band(r)),
            ctl: state.ctl.unwrap_or(0.0),
            atl: state.atl.unwrap_or(0.0),
            tsb: state.tsb().unwrap_or(0.0),
            sleep_score: state.sleep_score.map(|s| s.score),
        }
    }

    /// One day of the EWMA and fitness-fatigue recursions
    fn step_load_day(&self, state: &mut TrainingLoadState, load: f64) {
        let alpha_acute = half_life_alpha(self.config.acwr.acute_halflife_days);
        let alpha_chronic = half_life_alpha(self.config.acwr.chronic_halflife_days);
        if let Some(acute) = state.acute_load {
            state.acute_load = Some(alpha_acute.mul_add(load - acute, acute));
        }
        if let Some(chronic) = state.chronic_load {
            state.chronic_load = Some(alpha_chronic.mul_add(load - chronic, chronic));
        }
        if let Some(ctl) = state.ctl {
            state.ctl = Some((load - ctl) / self.config.fitness_fatigue.ctl_time_constant_days + ctl);
        }
        if let Some(atl) = state.atl {
            state.atl = Some((load - atl) / self.config.fitness_fatigue.atl_time_constant_days + atl);
        }
    }

    /// Slide the HRV window to the sample date and compute today's z-score
    ///
    /// The baseline is computed from readings strictly before today, so a
    /// single anomalous reading does not mask its own deviation. Fewer than
    /// `min_history_days` prior readings, a missing reading today, or a zero
    /// baseline spread all report the z-score as `None`, never zero.
    fn roll_hrv_window(&self, state: &mut TrainingLoadState, sample: &DailySample) {
        let window_start = sample.date - chrono::Duration::days(self.config.hrv.window_days - 1);
        while state
            .hrv_window
            .front()
            .is_some_and(|reading| reading.date < window_start)
        {
            state.hrv_window.pop_front();
        }

        state.hrv_z_score = sample.hrv_rmssd_ms.and_then(|today| {
            let (mean, stddev, count) = welford(state.hrv_window.iter().map(|r| r.rmssd_ms));
            if count < self.config.hrv.min_history_days || stddev <= f64::EPSILON {
                None
            } else {
                Some((today - mean) / stddev)
            }
        });

        if let Some(rmssd_ms) = sample.hrv_rmssd_ms {
            state.hrv_window.push_back(HrvReading {
                date: sample.date,
                rmssd_ms,
            });
        }
    }
}

/// Per-day smoothing factor for an EWMA with the given half-life in days
fn half_life_alpha(half_life_days: f64) -> f64 {
    1.0 - 0.5_f64.powf(1.0 / half_life_days)
}
