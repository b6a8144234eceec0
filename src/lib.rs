// ABOUTME: Athlete readiness analytics engine with cost-aware response caching
// ABOUTME: Turns daily wearable signals into training-load metrics and cached recommendations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Readiness Intelligence

//! # Readiness Engine
//!
//! This crate ingests a wearable athlete's daily physiological signals
//! (heart-rate variability, sleep, training load) and produces a daily
//! readiness assessment plus a training recommendation sourced from an
//! expensive external reasoning model.
//!
//! The pipeline, leaves first:
//!
//! 1. [`intelligence::TrainingLoadEngine`] folds one [`models::DailySample`]
//!    per day into a rolling [`intelligence::TrainingLoadState`]
//!    (HRV baseline, ACWR, CTL/ATL/TSB, sleep score).
//! 2. [`intelligence::ReadinessScorer`] composes the derived metrics into a
//!    single 0-100 score plus flags.
//! 3. [`fingerprint::ReadinessContext`] canonicalizes the analytical context
//!    and hashes it into the cache key.
//! 4. [`cache::TwoTierCache`] answers from an in-process LRU tier or a
//!    persistent SQLite tier, and guarantees at most one in-flight reasoning
//!    call per fingerprint (single-flight).
//! 5. [`ledger::CostLedger`] records every cache-miss call append-only and
//!    reports per-user monthly budget state.
//!
//! [`service::ReadinessService`] wires the pieces together.

/// Two-tier response cache (in-process LRU + persistent SQLite) with single-flight
pub mod cache;

/// Per-component configuration structures with documented defaults
pub mod config;

/// Unified error handling with standard error codes
pub mod errors;

/// Deterministic fingerprinting of the analytical context (cache key)
pub mod fingerprint;

/// Training-load statistics, sleep scoring, and readiness composition
pub mod intelligence;

/// Append-only API cost ledger with per-user budget alerts
pub mod ledger;

/// External reasoning-call contract (opaque provider trait)
pub mod llm;

/// Structured logging setup
pub mod logging;

/// Shared data models (samples, recommendations, cost records)
pub mod models;

/// Orchestration of the ingest -> score -> cache -> recommend flow
pub mod service;
