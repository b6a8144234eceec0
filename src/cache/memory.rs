// ABOUTME: In-process L1 cache tier backed by a bounded LRU map
// ABOUTME: Expired entries are dropped lazily on read and physically by the sweep
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Readiness Intelligence

use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lru::LruCache;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::cache::{CacheEntry, CacheTier};
use crate::errors::AppResult;
use crate::fingerprint::ContextFingerprint;

/// Capacity used when a caller passes zero
const FALLBACK_CAPACITY: usize = 100;

/// Bounded in-process cache tier
///
/// Eviction is LRU on overflow. All operations take the write lock because
/// even reads update recency.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Arc<RwLock<LruCache<ContextFingerprint, CacheEntry>>>,
}

impl MemoryCache {
    /// Create a tier holding at most `capacity` entries
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or_else(|| NonZeroUsize::new(FALLBACK_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Arc::new(RwLock::new(LruCache::new(capacity))),
        }
    }

    /// Number of live entries, expired or not
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the tier holds no entries
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl CacheTier for MemoryCache {
    async fn get(&self, fingerprint: &ContextFingerprint) -> AppResult<Option<CacheEntry>> {
        let mut entries = self.entries.write().await;
        match entries.get(fingerprint) {
            Some(entry) if entry.is_expired_at(Utc::now()) => {
                entries.pop(fingerprint);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.clone())),
            None => Ok(None),
        }
    }

    async fn put(&self, entry: &CacheEntry) -> AppResult<()> {
        self.entries
            .write()
            .await
            .put(entry.fingerprint, entry.clone());
        Ok(())
    }

    async fn remove(&self, fingerprint: &ContextFingerprint) -> AppResult<()> {
        self.entries.write().await.pop(fingerprint);
        Ok(())
    }

    async fn purge_user(&self, user_id: Uuid, before: DateTime<Utc>) -> AppResult<u64> {
        let mut entries = self.entries.write().await;
        let victims: Vec<ContextFingerprint> = entries
            .iter()
            .filter(|(_, entry)| entry.user_id == user_id && entry.created_at < before)
            .map(|(fingerprint, _)| *fingerprint)
            .collect();
        for fingerprint in &victims {
            entries.pop(fingerprint);
        }
        Ok(victims.len() as u64)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut entries = self.entries.write().await;
        let victims: Vec<ContextFingerprint> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(fingerprint, _)| *fingerprint)
            .collect();
        for fingerprint in &victims {
            entries.pop(fingerprint);
        }
        Ok(victims.len() as u64)
    }

    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }
}
