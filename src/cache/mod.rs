// ABOUTME: Cache abstraction for recommendation responses keyed by context fingerprint
// ABOUTME: Pluggable tier trait implemented by the in-process LRU and persistent SQLite backends
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Readiness Intelligence

/// In-process bounded LRU tier (L1)
pub mod memory;

/// Persistent SQLite tier (L2)
pub mod sqlite;

/// Two-tier composition with single-flight miss coordination
pub mod two_tier;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::fingerprint::ContextFingerprint;
use crate::models::RecommendationPayload;

pub use memory::MemoryCache;
pub use sqlite::SqliteCache;
pub use two_tier::{CacheLookup, TwoTierCache};

/// One cached recommendation
///
/// Created on a cache miss after a successful external call; read-only
/// afterwards until TTL expiry or an explicit per-user invalidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Digest of the analytical context this recommendation answers
    pub fingerprint: ContextFingerprint,
    /// User the recommendation was produced for
    pub user_id: Uuid,
    /// The cached recommendation payload
    pub recommendation: RecommendationPayload,
    /// Creation time (compared against invalidation watermarks)
    pub created_at: DateTime<Utc>,
    /// Expiry time; entries at or past this instant are treated as absent
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry expiring `ttl` from now
    ///
    /// A zero TTL produces an entry that is already expired on the next
    /// read, which callers use to disable caching per entry.
    #[must_use]
    pub fn new(
        fingerprint: ContextFingerprint,
        user_id: Uuid,
        recommendation: RecommendationPayload,
        ttl: Duration,
    ) -> Self {
        let created_at = Utc::now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|d| created_at.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            fingerprint,
            user_id,
            recommendation,
            created_at,
            expires_at,
        }
    }

    /// Whether the entry is expired at the given instant
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A single cache tier
///
/// Expired entries are treated as absent on read (lazy expiry) by every
/// implementation; `sweep_expired` additionally deletes them physically.
#[async_trait::async_trait]
pub trait CacheTier: Send + Sync {
    /// Retrieve an unexpired entry
    ///
    /// # Errors
    ///
    /// Returns an error when the backend is unreachable or the stored
    /// payload fails to deserialize.
    async fn get(&self, fingerprint: &ContextFingerprint) -> AppResult<Option<CacheEntry>>;

    /// Store or replace an entry
    ///
    /// # Errors
    ///
    /// Returns an error when serialization or storage fails.
    async fn put(&self, entry: &CacheEntry) -> AppResult<()>;

    /// Remove a single entry
    ///
    /// # Errors
    ///
    /// Returns an error when the backend is unreachable.
    async fn remove(&self, fingerprint: &ContextFingerprint) -> AppResult<()>;

    /// Remove all of a user's entries created before the given instant
    ///
    /// Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend is unreachable.
    async fn purge_user(&self, user_id: Uuid, before: DateTime<Utc>) -> AppResult<u64>;

    /// Physically delete expired entries
    ///
    /// Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend is unreachable.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> AppResult<u64>;

    /// Verify the backend is reachable
    ///
    /// # Errors
    ///
    /// Returns an error when the health check fails.
    async fn health_check(&self) -> AppResult<()>;
}
