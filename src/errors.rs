// ABOUTME: Unified error handling with standard error codes across all modules
// ABOUTME: Distinguishes rejected input, degraded backends, and external-call failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Readiness Intelligence

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Input validation (1000-1999)
    /// Malformed or physiologically impossible sample field
    #[serde(rename = "INVALID_SAMPLE")]
    InvalidSample = 1000,
    /// Sample delivered out of non-decreasing date order
    #[serde(rename = "OUT_OF_ORDER_SAMPLE")]
    OutOfOrderSample = 1001,
    /// Other invalid caller input
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput = 1002,

    // Configuration (2000-2999)
    /// Configuration missing or inconsistent
    #[serde(rename = "CONFIG_ERROR")]
    ConfigError = 2000,

    // Storage and cache backends (3000-3999)
    /// Cache tier unreachable or failing (recoverable, tier is bypassed)
    #[serde(rename = "CACHE_BACKEND_ERROR")]
    CacheBackendError = 3000,
    /// Database operation failed
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError = 3001,
    /// Serialization or deserialization failed
    #[serde(rename = "SERIALIZATION_ERROR")]
    SerializationError = 3002,

    // External reasoning call (5000-5999)
    /// External reasoning service returned an error
    #[serde(rename = "EXTERNAL_SERVICE_ERROR")]
    ExternalServiceError = 5000,
    /// External reasoning call timed out
    #[serde(rename = "EXTERNAL_TIMEOUT")]
    ExternalTimeout = 5001,
    /// External reasoning service rate-limited the call
    #[serde(rename = "EXTERNAL_RATE_LIMITED")]
    ExternalRateLimited = 5002,
    /// External reasoning service returned an unparseable response
    #[serde(rename = "EXTERNAL_MALFORMED_RESPONSE")]
    ExternalMalformedResponse = 5003,

    // Internal (9000-9999)
    /// Unexpected internal failure
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError = 9000,
}

impl ErrorCode {
    /// Whether the failed operation is worth retrying by the orchestration layer
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::ExternalTimeout
                | Self::ExternalRateLimited
                | Self::CacheBackendError
                | Self::DatabaseError
        )
    }

    /// User-facing description of this error class
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::InvalidSample => "Sample contains a malformed or out-of-range value",
            Self::OutOfOrderSample => "Samples must be applied in non-decreasing date order",
            Self::InvalidInput => "The provided input is invalid",
            Self::ConfigError => "Configuration error encountered",
            Self::CacheBackendError => "Cache backend unavailable",
            Self::DatabaseError => "Database operation failed",
            Self::SerializationError => "Data serialization/deserialization failed",
            Self::ExternalServiceError => "External reasoning service error",
            Self::ExternalTimeout => "External reasoning call timed out",
            Self::ExternalRateLimited => "External reasoning service rate limit exceeded",
            Self::ExternalMalformedResponse => {
                "External reasoning service returned malformed output"
            }
            Self::InternalError => "An internal error occurred",
        }
    }
}

/// Unified error type for the engine
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Offending field name for input-validation errors
    pub field: Option<String>,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new error with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            source: None,
        }
    }

    /// Attach a source error for chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Malformed sample input, naming the offending field
    pub fn invalid_sample(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidSample,
            message: message.into(),
            field: Some(field.into()),
            source: None,
        }
    }

    /// Sample applied out of date order
    pub fn out_of_order_sample(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::OutOfOrderSample,
            message: message.into(),
            field: Some("date".to_owned()),
            source: None,
        }
    }

    /// Other invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Cache tier failure (callers degrade by bypassing the tier)
    pub fn cache_backend(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CacheBackendError, message)
    }

    /// Database failure
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// External reasoning service failure
    pub fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExternalServiceError,
            format!("{}: {}", service.into(), message.into()),
        )
    }

    /// External reasoning call timed out
    pub fn external_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExternalTimeout, message)
    }

    /// External reasoning service rate-limited the call
    pub fn external_rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExternalRateLimited, message)
    }

    /// External reasoning service returned an unparseable response
    pub fn external_malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExternalMalformedResponse, message)
    }

    /// Unexpected internal failure
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Whether the failed operation is worth retrying
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(
                f,
                "{}: {} (field: {field})",
                self.code.description(),
                self.message
            ),
            None => write!(f, "{}: {}", self.code.description(), self.message),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(ErrorCode::SerializationError, error.to_string()).with_source(error)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        Self::new(ErrorCode::DatabaseError, error.to_string()).with_source(error)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn retryable_codes() {
        assert!(ErrorCode::ExternalTimeout.is_retryable());
        assert!(ErrorCode::ExternalRateLimited.is_retryable());
        assert!(!ErrorCode::InvalidSample.is_retryable());
        assert!(!ErrorCode::ExternalMalformedResponse.is_retryable());
    }

    #[test]
    fn invalid_sample_names_field() {
        let err = AppError::invalid_sample("hrv_rmssd_ms", "HRV cannot be negative");
        assert_eq!(err.code, ErrorCode::InvalidSample);
        assert_eq!(err.field.as_deref(), Some("hrv_rmssd_ms"));
        assert!(err.to_string().contains("hrv_rmssd_ms"));
    }
}
