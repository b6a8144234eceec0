// ABOUTME: Integration tests for the training-load engine's rolling statistics
// ABOUTME: Covers replay determinism, gap handling, HRV baselines, and ACWR banding
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Readiness Intelligence

#![allow(clippy::unwrap_used)]

use chrono::NaiveDate;
use uuid::Uuid;

use readiness_engine::errors::ErrorCode;
use readiness_engine::intelligence::{TrainingLoadEngine, TrainingLoadState};
use readiness_engine::models::{AcwrBand, DailySample};

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
}

fn sample(user_id: Uuid, day: u32, load: Option<f64>, hrv: Option<f64>) -> DailySample {
    DailySample {
        user_id,
        date: date(day),
        resting_hr_bpm: Some(50),
        hrv_rmssd_ms: hrv,
        sleep: None,
        steps: None,
        load_impulse: load,
    }
}

#[test]
fn replay_matches_incremental_application() {
    let engine = TrainingLoadEngine::default();
    let user = Uuid::new_v4();
    let samples: Vec<DailySample> = (1..=10)
        .map(|day| sample(user, day, Some(40.0 + f64::from(day) * 5.0), Some(55.0 + f64::from(day))))
        .collect();

    let mut incremental = TrainingLoadState::new(user);
    for s in &samples {
        incremental = engine.apply_daily_sample(&incremental, s).unwrap();
    }
    let replayed = engine.replay(user, &samples).unwrap();

    assert_eq!(incremental.last_date, replayed.last_date);
    assert_eq!(incremental.acute_load, replayed.acute_load);
    assert_eq!(incremental.chronic_load, replayed.chronic_load);
    assert_eq!(incremental.ctl, replayed.ctl);
    assert_eq!(incremental.atl, replayed.atl);
    assert_eq!(incremental.hrv_z_score, replayed.hrv_z_score);
}

#[test]
fn gap_days_decay_acute_faster_than_chronic() {
    let engine = TrainingLoadEngine::default();
    let user = Uuid::new_v4();

    let mut state = TrainingLoadState::new(user);
    for day in 1..=5 {
        state = engine
            .apply_daily_sample(&state, &sample(user, day, Some(100.0), None))
            .unwrap();
    }
    // Eight idle days, then a rest-day sample.
    let resumed = engine
        .apply_daily_sample(&state, &sample(user, 14, Some(0.0), None))
        .unwrap();

    let acute = resumed.acute_load.unwrap();
    let chronic = resumed.chronic_load.unwrap();
    assert!(acute < state.acute_load.unwrap());
    assert!(acute < chronic, "acute load should decay faster during a layoff");
    assert!(resumed.tsb().unwrap() > state.tsb().unwrap());
}

#[test]
fn hrv_z_score_needs_minimum_history_then_appears() {
    let engine = TrainingLoadEngine::default();
    let user = Uuid::new_v4();
    let readings = [60.0, 62.0, 58.0, 61.0, 59.0, 63.0, 57.0];

    let mut state = TrainingLoadState::new(user);
    for (i, rmssd) in readings.iter().enumerate() {
        state = engine
            .apply_daily_sample(&state, &sample(user, i as u32 + 1, Some(50.0), Some(*rmssd)))
            .unwrap();
        // Fewer than 7 prior readings: no z-score yet.
        assert_eq!(state.hrv_z_score, None);
    }

    let state = engine
        .apply_daily_sample(&state, &sample(user, 8, Some(50.0), Some(75.0)))
        .unwrap();
    let z = state.hrv_z_score.unwrap();
    assert!(z > 1.0, "a clearly elevated reading should score z > 1, got {z}");
}

#[test]
fn missing_hrv_day_contributes_nothing_to_baseline() {
    let engine = TrainingLoadEngine::default();
    let user = Uuid::new_v4();

    let mut state = TrainingLoadState::new(user);
    for day in 1..=4 {
        state = engine
            .apply_daily_sample(&state, &sample(user, day, Some(50.0), Some(60.0)))
            .unwrap();
    }
    let before = state.hrv_window.len();
    state = engine
        .apply_daily_sample(&state, &sample(user, 5, Some(50.0), None))
        .unwrap();
    assert_eq!(state.hrv_window.len(), before);
    assert_eq!(state.hrv_z_score, None);
}

#[test]
fn load_spike_lands_in_high_risk_band() {
    let engine = TrainingLoadEngine::default();
    let user = Uuid::new_v4();

    let mut state = TrainingLoadState::new(user);
    for day in 1..=14 {
        state = engine
            .apply_daily_sample(&state, &sample(user, day, Some(50.0), None))
            .unwrap();
    }
    state = engine
        .apply_daily_sample(&state, &sample(user, 15, Some(400.0), None))
        .unwrap();

    let metrics = engine.derive_metrics(&state);
    assert!(metrics.acwr.unwrap() > 1.3);
    assert_eq!(metrics.acwr_band, Some(AcwrBand::HighRisk));
}

#[test]
fn acwr_undefined_while_chronic_load_is_zero() {
    let engine = TrainingLoadEngine::default();
    let user = Uuid::new_v4();

    let mut state = TrainingLoadState::new(user);
    for day in 1..=3 {
        state = engine
            .apply_daily_sample(&state, &sample(user, day, None, None))
            .unwrap();
    }
    assert_eq!(state.acwr(), None);
    let metrics = engine.derive_metrics(&state);
    assert_eq!(metrics.acwr, None);
    assert_eq!(metrics.acwr_band, None);
}

#[test]
fn implausible_hrv_rejected_with_field() {
    let engine = TrainingLoadEngine::default();
    let user = Uuid::new_v4();
    let err = engine
        .apply_daily_sample(
            &TrainingLoadState::new(user),
            &sample(user, 1, Some(50.0), Some(-5.0)),
        )
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidSample);
    assert_eq!(err.field.as_deref(), Some("hrv_rmssd_ms"));
}

#[test]
fn duplicate_date_rejected() {
    let engine = TrainingLoadEngine::default();
    let user = Uuid::new_v4();
    let state = engine
        .apply_daily_sample(&TrainingLoadState::new(user), &sample(user, 3, Some(50.0), None))
        .unwrap();
    let err = engine
        .apply_daily_sample(&state, &sample(user, 3, Some(60.0), None))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::OutOfOrderSample);
}
