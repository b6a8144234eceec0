// ABOUTME: Criterion benchmarks for the per-sample state transition and fingerprint hashing
// ABOUTME: Guards the hot path: one state fold plus one digest per ingested sample
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Readiness Intelligence

#![allow(clippy::unwrap_used)]
#![allow(missing_docs)]

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use uuid::Uuid;

use readiness_engine::fingerprint::ReadinessContext;
use readiness_engine::intelligence::{ReadinessScorer, TrainingLoadEngine, TrainingLoadState};
use readiness_engine::models::{DailySample, SleepSample};

fn sample(user_id: Uuid, day_offset: i64) -> DailySample {
    DailySample {
        user_id,
        date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + chrono::Duration::days(day_offset),
        resting_hr_bpm: Some(50),
        hrv_rmssd_ms: Some(58.0 + (day_offset % 9) as f64),
        sleep: Some(SleepSample {
            duration_hours: 7.2,
            deep_hours: Some(1.5),
            rem_hours: Some(1.7),
            light_hours: Some(4.0),
        }),
        steps: Some(10_000),
        load_impulse: Some(60.0 + (day_offset % 5) as f64 * 10.0),
    }
}

fn seasoned_state(engine: &TrainingLoadEngine, user_id: Uuid, days: i64) -> TrainingLoadState {
    let mut state = TrainingLoadState::new(user_id);
    for day in 0..days {
        state = engine
            .apply_daily_sample(&state, &sample(user_id, day))
            .unwrap();
    }
    state
}

fn bench_apply_daily_sample(c: &mut Criterion) {
    let engine = TrainingLoadEngine::default();
    let user_id = Uuid::new_v4();
    let state = seasoned_state(&engine, user_id, 60);
    let next = sample(user_id, 60);

    c.bench_function("apply_daily_sample_60d_history", |b| {
        b.iter(|| {
            engine
                .apply_daily_sample(black_box(&state), black_box(&next))
                .unwrap()
        });
    });
}

fn bench_fingerprint(c: &mut Criterion) {
    let engine = TrainingLoadEngine::default();
    let scorer = ReadinessScorer::default();
    let user_id = Uuid::new_v4();
    let state = seasoned_state(&engine, user_id, 60);
    let assessment = scorer.score(&engine.derive_metrics(&state));
    let context = ReadinessContext::from_assessment(
        user_id,
        NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
        &assessment,
    );

    c.bench_function("context_fingerprint", |b| {
        b.iter(|| black_box(&context).fingerprint());
    });
}

criterion_group!(benches, bench_apply_daily_sample, bench_fingerprint);
criterion_main!(benches);
