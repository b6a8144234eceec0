// ABOUTME: Analytics engine turning raw daily signals into training-load and readiness metrics
// ABOUTME: Pure per-sample state transitions enable deterministic replay and backfill
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Readiness Intelligence

/// Composite readiness scoring and flags
pub mod readiness;

/// Sleep quality scoring
pub mod sleep;

/// Rolling HRV baseline, ACWR, and fitness-fatigue (CTL/ATL/TSB) statistics
pub mod training_load;

pub use readiness::{ReadinessAssessment, ReadinessScorer};
pub use sleep::{score_sleep, SleepScore};
pub use training_load::{HrvReading, TrainingLoadEngine, TrainingLoadState};
