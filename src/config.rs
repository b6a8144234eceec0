// ABOUTME: Per-component configuration structures with documented defaults and validation
// ABOUTME: Policy constants (thresholds, weights, pricing) live here, never inline in formulas
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Readiness Intelligence

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

/// Default L1 capacity (entries)
const DEFAULT_L1_CAPACITY: usize = 100;

/// Default cache entry TTL in seconds (24 hours)
const DEFAULT_TTL_SECS: u64 = 24 * 60 * 60;

/// Default timeout applied to L2 reads/writes before degrading to a miss
const DEFAULT_L2_TIMEOUT_MILLIS: u64 = 2_000;

/// Default interval between expired-entry sweeps
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;

/// Rolling HRV baseline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HrvBaselineConfig {
    /// Trailing window over which baseline mean/stddev are maintained (days)
    pub window_days: i64,
    /// Minimum HRV readings before a z-score is reported (below this: null)
    pub min_history_days: usize,
    /// Upper bound on plausible RMSSD readings (ms); higher values are rejected
    pub max_plausible_rmssd_ms: f64,
}

impl Default for HrvBaselineConfig {
    fn default() -> Self {
        Self {
            window_days: 60,
            min_history_days: 7,
            max_plausible_rmssd_ms: 350.0,
        }
    }
}

/// Acute:chronic workload ratio configuration
///
/// Banding boundaries follow the injury-risk literature: below
/// `undertraining_max` is undertraining, above `optimal_max` is high risk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcwrConfig {
    /// Half-life of the acute (short-term) load EWMA in days
    pub acute_halflife_days: f64,
    /// Half-life of the chronic (long-term) load EWMA in days
    pub chronic_halflife_days: f64,
    /// ACWR below this is classified as undertraining
    pub undertraining_max: f64,
    /// ACWR above this is classified as high injury risk
    pub optimal_max: f64,
}

impl Default for AcwrConfig {
    fn default() -> Self {
        Self {
            acute_halflife_days: 7.0,
            chronic_halflife_days: 28.0,
            undertraining_max: 0.8,
            optimal_max: 1.3,
        }
    }
}

/// Fitness-fatigue (CTL/ATL/TSB) decay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitnessFatigueConfig {
    /// CTL time constant in days (fitness, slow decay)
    pub ctl_time_constant_days: f64,
    /// ATL time constant in days (fatigue, fast decay)
    pub atl_time_constant_days: f64,
}

impl Default for FitnessFatigueConfig {
    fn default() -> Self {
        Self {
            ctl_time_constant_days: 42.0,
            atl_time_constant_days: 7.0,
        }
    }
}

/// Sleep quality scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepScoringConfig {
    /// Target nightly sleep duration (hours)
    pub target_hours: f64,
    /// Weight of the duration component when stage data is present
    pub duration_weight: f64,
    /// Weight of the stage-quality component when stage data is present
    pub stages_weight: f64,
    /// Deep sleep fraction of total sleep considered ideal
    pub deep_target_fraction: f64,
    /// REM sleep fraction of total sleep considered ideal
    pub rem_target_fraction: f64,
}

impl Default for SleepScoringConfig {
    fn default() -> Self {
        Self {
            target_hours: 8.0,
            duration_weight: 0.6,
            stages_weight: 0.4,
            deep_target_fraction: 0.20,
            rem_target_fraction: 0.25,
        }
    }
}

/// Weighting table for the composite readiness score
///
/// Defaults are illustrative, not clinically derived; deployments tune them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessWeights {
    /// Weight of the HRV z-score subscore
    pub hrv: f64,
    /// Weight of the TSB (form) subscore
    pub tsb: f64,
    /// Weight of the sleep quality subscore
    pub sleep: f64,
    /// Weight of the ACWR band penalty subscore
    pub acwr: f64,
}

impl Default for ReadinessWeights {
    fn default() -> Self {
        Self {
            hrv: 0.4,
            tsb: 0.3,
            sleep: 0.2,
            acwr: 0.1,
        }
    }
}

impl ReadinessWeights {
    /// Sum of all weights (used for normalization)
    #[must_use]
    pub fn total(&self) -> f64 {
        self.hrv + self.tsb + self.sleep + self.acwr
    }
}

/// Training-load engine configuration bundle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// HRV baseline windowing
    pub hrv: HrvBaselineConfig,
    /// ACWR half-lives and banding thresholds
    pub acwr: AcwrConfig,
    /// CTL/ATL decay constants
    pub fitness_fatigue: FitnessFatigueConfig,
    /// Sleep scoring policy
    pub sleep: SleepScoringConfig,
}

impl EngineConfig {
    /// Validate cross-field consistency
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when windows, half-lives, or banding
    /// boundaries are non-positive or inverted.
    pub fn validate(&self) -> AppResult<()> {
        if self.hrv.window_days <= 0 {
            return Err(AppError::config("HRV baseline window must be positive"));
        }
        if self.acwr.acute_halflife_days <= 0.0 || self.acwr.chronic_halflife_days <= 0.0 {
            return Err(AppError::config("ACWR half-lives must be positive"));
        }
        if self.acwr.undertraining_max >= self.acwr.optimal_max {
            return Err(AppError::config(
                "ACWR undertraining boundary must be below the high-risk boundary",
            ));
        }
        if self.fitness_fatigue.ctl_time_constant_days <= 0.0
            || self.fitness_fatigue.atl_time_constant_days <= 0.0
        {
            return Err(AppError::config("CTL/ATL time constants must be positive"));
        }
        if self.sleep.target_hours <= 0.0 {
            return Err(AppError::config("Sleep target must be positive"));
        }
        Ok(())
    }
}

/// Two-tier cache configuration
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Maximum entries held by the in-process L1 tier
    pub l1_capacity: usize,
    /// Default TTL applied to newly cached recommendations
    pub default_ttl: Duration,
    /// Timeout on L2 reads/writes; expiry degrades the operation to a miss
    pub l2_timeout: Duration,
    /// Interval between expired-entry sweeps
    pub cleanup_interval: Duration,
    /// Run the background sweep task (disable in tests to avoid runtime conflicts)
    pub enable_background_cleanup: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            l1_capacity: DEFAULT_L1_CAPACITY,
            default_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            l2_timeout: Duration::from_millis(DEFAULT_L2_TIMEOUT_MILLIS),
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            enable_background_cleanup: true,
        }
    }
}

impl CacheSettings {
    /// Build cache settings from environment variables, falling back to defaults
    ///
    /// Recognized variables: `CACHE_L1_CAPACITY`, `CACHE_TTL_SECS`,
    /// `CACHE_L2_TIMEOUT_MILLIS`, `CACHE_CLEANUP_INTERVAL_SECS`. A zero
    /// cleanup interval is invalid (the sweep ticker needs a nonzero
    /// period) and falls back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            l1_capacity: env_parse("CACHE_L1_CAPACITY").unwrap_or(defaults.l1_capacity),
            default_ttl: env_parse("CACHE_TTL_SECS")
                .map_or(defaults.default_ttl, Duration::from_secs),
            l2_timeout: env_parse("CACHE_L2_TIMEOUT_MILLIS")
                .map_or(defaults.l2_timeout, Duration::from_millis),
            cleanup_interval: env_parse("CACHE_CLEANUP_INTERVAL_SECS")
                .filter(|secs: &u64| *secs > 0)
                .map_or(defaults.cleanup_interval, Duration::from_secs),
            enable_background_cleanup: true,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Budget alert thresholds as fractions of the monthly budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetThresholds {
    /// Fraction at which a notice is raised
    pub notice: f64,
    /// Fraction at which a warning is raised
    pub warning: f64,
    /// Fraction at which the budget is reported exceeded
    pub exceeded: f64,
}

impl Default for BudgetThresholds {
    fn default() -> Self {
        Self {
            notice: 0.75,
            warning: 0.90,
            exceeded: 1.0,
        }
    }
}

/// Per-model token pricing in USD per million tokens
///
/// `cached_per_million` prices previously cached prompt tokens, which most
/// providers bill at a discount; `input_per_million` covers the uncached
/// remainder of the prompt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per million uncached input tokens
    pub input_per_million: f64,
    /// Price per million output tokens
    pub output_per_million: f64,
    /// Price per million cached input tokens
    pub cached_per_million: f64,
}

/// Pluggable pricing table keyed by model identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingTable {
    models: HashMap<String, ModelPricing>,
}

impl Default for PricingTable {
    fn default() -> Self {
        let mut models = HashMap::new();
        models.insert(
            "gemini-2.5-flash".to_owned(),
            ModelPricing {
                input_per_million: 0.30,
                output_per_million: 2.50,
                cached_per_million: 0.075,
            },
        );
        models.insert(
            "llama-3.3-70b-versatile".to_owned(),
            ModelPricing {
                input_per_million: 0.59,
                output_per_million: 0.79,
                cached_per_million: 0.59,
            },
        );
        Self { models }
    }
}

impl PricingTable {
    /// Empty table (deployments add only the models they actually use)
    #[must_use]
    pub fn empty() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    /// Add or replace pricing for a model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>, pricing: ModelPricing) -> Self {
        self.models.insert(model.into(), pricing);
        self
    }

    /// Look up pricing for a model
    #[must_use]
    pub fn price_for(&self, model: &str) -> Option<ModelPricing> {
        self.models.get(model).copied()
    }
}
