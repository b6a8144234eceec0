// ABOUTME: External reasoning provider abstraction producing narrative recommendations
// ABOUTME: The trait is the seam for real providers and the deterministic test double
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Readiness Intelligence

use serde::{Deserialize, Serialize};

use crate::errors::AppResult;
use crate::fingerprint::ReadinessContext;
use crate::models::{RecommendationPayload, TokenUsage};

/// One completed reasoning call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningResponse {
    /// The generated recommendation
    pub recommendation: RecommendationPayload,
    /// Token usage reported by the provider, used for cost computation
    pub usage: TokenUsage,
    /// Model identifier that served the call (keys the pricing table)
    pub model: String,
}

/// An external reasoning service that turns an analytical context into a
/// narrative recommendation
///
/// Implementations are responsible for their own transport, retries, and
/// response parsing; the engine only sees the typed result. Every call is
/// assumed to be expensive, which is why results are cached by context
/// fingerprint and deduplicated in flight.
#[async_trait::async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Generate a recommendation for the given context
    ///
    /// # Errors
    ///
    /// Returns `ExternalTimeout`, `ExternalRateLimited`,
    /// `ExternalMalformedResponse`, or `ExternalServiceError` depending on
    /// the failure mode.
    async fn generate(&self, context: &ReadinessContext) -> AppResult<ReasoningResponse>;

    /// Stable provider name used in logs
    fn name(&self) -> &'static str;
}
