// ABOUTME: Deterministic fingerprinting of the analytical context used as the cache key
// ABOUTME: Fixed field order and fixed-precision rounding keep hashes stable across processes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Readiness Intelligence

//! # Context Fingerprinter
//!
//! The cache key for a recommendation is a SHA-256 digest of the canonical
//! serialization of a [`ReadinessContext`]: `{user, date, rounded derived
//! metrics}`. Canonicalization fixes the field order and rounds every metric
//! to [`CONTEXT_PRECISION_DECIMALS`] decimal places, so floating-point noise
//! in the analytics never fragments the cache. Two semantically identical
//! contexts hash identically across process restarts; no ambient input
//! (wall-clock time, map iteration order) participates.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::intelligence::ReadinessAssessment;
use crate::models::ReadinessMetrics;

/// Decimal places every metric is rounded to before hashing
///
/// Fixed by contract: changing this invalidates every cached fingerprint.
pub const CONTEXT_PRECISION_DECIMALS: u32 = 2;

/// Round to the fixed context precision, normalizing negative zero
fn round_metric(value: f64) -> f64 {
    let factor = 10_f64.powi(CONTEXT_PRECISION_DECIMALS as i32);
    let rounded = (value * factor).round() / factor;
    // Normalize negative zero; after rounding, anything under epsilon is zero.
    if rounded.abs() < f64::EPSILON {
        0.0
    } else {
        rounded
    }
}

/// Derived metrics rounded to the fixed context precision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundedMetrics {
    /// HRV z-score, rounded (null below minimum history)
    pub hrv_z_score: Option<f64>,
    /// ACWR, rounded (null when chronic load is zero)
    pub acwr: Option<f64>,
    /// Chronic training load, rounded
    pub ctl: f64,
    /// Acute training load, rounded
    pub atl: f64,
    /// Training stress balance, rounded
    pub tsb: f64,
    /// Sleep score, rounded (null when no sleep was recorded)
    pub sleep_score: Option<f64>,
    /// Composite readiness score, rounded
    pub composite_score: f64,
}

impl RoundedMetrics {
    fn from_assessment(metrics: &ReadinessMetrics, composite_score: f64) -> Self {
        Self {
            hrv_z_score: metrics.hrv_z_score.map(round_metric),
            acwr: metrics.acwr.map(round_metric),
            ctl: round_metric(metrics.ctl),
            atl: round_metric(metrics.atl),
            tsb: round_metric(metrics.tsb),
            sleep_score: metrics.sleep_score.map(round_metric),
            composite_score: round_metric(composite_score),
        }
    }
}

/// Deterministic summary of the analytical state used as a cache key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessContext {
    /// Athlete the context describes
    pub user_id: Uuid,
    /// Day assessed
    pub date: NaiveDate,
    /// Derived metrics at fixed precision
    pub metrics: RoundedMetrics,
}

impl ReadinessContext {
    /// Build a context from a readiness assessment, applying canonical rounding
    #[must_use]
    pub fn from_assessment(
        user_id: Uuid,
        date: NaiveDate,
        assessment: &ReadinessAssessment,
    ) -> Self {
        Self {
            user_id,
            date,
            metrics: RoundedMetrics::from_assessment(
                &assessment.metrics,
                assessment.composite_score,
            ),
        }
    }

    /// Canonical serialization: fixed field order, fixed precision
    ///
    /// Absent metrics serialize as the literal `null`, distinct from any
    /// numeric value.
    #[must_use]
    pub fn canonical_string(&self) -> String {
        format!(
            "user:{}|date:{}|hrv_z:{}|acwr:{}|ctl:{}|atl:{}|tsb:{}|sleep:{}|readiness:{}",
            self.user_id,
            self.date.format("%Y-%m-%d"),
            format_metric(self.metrics.hrv_z_score),
            format_metric(self.metrics.acwr),
            format_metric(Some(self.metrics.ctl)),
            format_metric(Some(self.metrics.atl)),
            format_metric(Some(self.metrics.tsb)),
            format_metric(self.metrics.sleep_score),
            format_metric(Some(self.metrics.composite_score)),
        )
    }

    /// Hash the canonical serialization into the cache key
    #[must_use]
    pub fn fingerprint(&self) -> ContextFingerprint {
        let digest = Sha256::digest(self.canonical_string().as_bytes());
        ContextFingerprint(digest.into())
    }
}

fn format_metric(value: Option<f64>) -> String {
    value.map_or_else(
        || "null".to_owned(),
        |v| format!("{:.prec$}", round_metric(v), prec = CONTEXT_PRECISION_DECIMALS as usize),
    )
}

/// 256-bit digest of a canonical readiness context
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextFingerprint([u8; 32]);

impl ContextFingerprint {
    /// Raw digest bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding (64 characters)
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from the hex encoding produced by [`Self::to_hex`]
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when the string is not 64 hex characters.
    pub fn from_hex(s: &str) -> AppResult<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| AppError::invalid_input(format!("invalid fingerprint hex: {e}")))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AppError::invalid_input("fingerprint must be 32 bytes"))?;
        Ok(Self(array))
    }
}

impl fmt::Display for ContextFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContextFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextFingerprint({})", self.to_hex())
    }
}

impl Serialize for ContextFingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContextFingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
