// ABOUTME: Two-tier cache composing the LRU L1 and SQLite L2 with single-flight misses
// ABOUTME: Concurrent misses on one fingerprint share exactly one external computation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Readiness Intelligence

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{CacheEntry, CacheTier, MemoryCache, SqliteCache};
use crate::config::CacheSettings;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::fingerprint::{ContextFingerprint, ReadinessContext};
use crate::models::RecommendationPayload;

/// Result of a cache lookup or coordinated computation
#[derive(Debug, Clone)]
pub struct CacheLookup {
    /// The entry served to the caller
    pub entry: Arc<CacheEntry>,
    /// True when the entry was served from a tier without computing
    pub cache_hit: bool,
    /// Cost of the external call, reported only on the request that made it
    pub cost_incurred: Option<f64>,
}

#[derive(Debug, Clone)]
struct FlightSuccess {
    entry: Arc<CacheEntry>,
    cost_incurred: Option<f64>,
}

#[derive(Debug, Clone)]
struct FlightFailure {
    code: ErrorCode,
    message: String,
}

impl FlightFailure {
    fn capture(err: &AppError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
        }
    }

    fn to_error(&self) -> AppError {
        AppError::new(self.code, self.message.clone())
    }
}

type FlightOutcome = Result<FlightSuccess, FlightFailure>;

/// Per-user invalidation cutoff plus the bookkeeping needed to retire it
///
/// A watermark is only required while pre-cutoff rows may still surface
/// from a tier or from a read already in flight. Once both purges have
/// succeeded and the in-flight read window has drained, the sweep drops it.
struct Watermark {
    cutoff: DateTime<Utc>,
    recorded_at: Instant,
    fully_purged: bool,
}

struct Inner {
    l1: MemoryCache,
    l2: Option<SqliteCache>,
    settings: CacheSettings,
    /// One broadcast channel per fingerprint currently being computed
    flights: DashMap<ContextFingerprint, broadcast::Sender<FlightOutcome>>,
    /// Per-user invalidation watermarks; entries created earlier are stale
    watermarks: DashMap<Uuid, Watermark>,
}

/// L1 + L2 cache with miss coordination
///
/// Reads check L1 first, then L2 under a timeout, promoting L2 hits into
/// L1. A slow or failing L2 degrades to a miss and never fails a request.
/// Concurrent misses on the same fingerprint are collapsed into a single
/// detached computation whose result every waiter shares; the computation
/// survives cancellation of the request that started it.
#[derive(Clone)]
pub struct TwoTierCache {
    inner: Arc<Inner>,
}

impl TwoTierCache {
    /// Create the cache; `l2` is optional for in-memory-only deployments
    ///
    /// When background cleanup is enabled this spawns the sweep task and
    /// must be called from within a Tokio runtime. The task exits once the
    /// last clone of the cache is dropped.
    #[must_use]
    pub fn new(settings: CacheSettings, l2: Option<SqliteCache>) -> Self {
        let inner = Arc::new(Inner {
            l1: MemoryCache::new(settings.l1_capacity),
            l2,
            settings,
            flights: DashMap::new(),
            watermarks: DashMap::new(),
        });
        if inner.settings.enable_background_cleanup {
            if inner.settings.cleanup_interval.is_zero() {
                warn!("cache cleanup interval is zero, background sweep disabled");
            } else {
                Self::spawn_cleanup(&inner);
            }
        }
        Self { inner }
    }

    fn spawn_cleanup(inner: &Arc<Inner>) {
        let weak = Arc::downgrade(inner);
        let interval = inner.settings.cleanup_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                let cache = Self { inner };
                match cache.sweep_expired().await {
                    Ok(0) => {}
                    Ok(removed) => debug!(removed, "cache sweep removed expired entries"),
                    Err(e) => warn!("cache sweep failed: {e}"),
                }
            }
        });
    }

    /// Whether an entry predates the user's invalidation watermark
    fn is_stale(&self, entry: &CacheEntry) -> bool {
        self.inner
            .watermarks
            .get(&entry.user_id)
            .is_some_and(|watermark| entry.created_at < watermark.cutoff)
    }

    async fn l2_get(&self, fingerprint: &ContextFingerprint) -> Option<CacheEntry> {
        let l2 = self.inner.l2.as_ref()?;
        match tokio::time::timeout(self.inner.settings.l2_timeout, l2.get(fingerprint)).await {
            Ok(Ok(entry)) => entry,
            Ok(Err(e)) => {
                warn!("persistent cache read failed, treating as miss: {e}");
                None
            }
            Err(_) => {
                warn!("persistent cache read timed out, treating as miss");
                None
            }
        }
    }

    /// Look up an unexpired, unrevoked entry, promoting L2 hits into L1
    pub async fn get(&self, fingerprint: &ContextFingerprint) -> Option<CacheEntry> {
        if let Ok(Some(entry)) = self.inner.l1.get(fingerprint).await {
            if self.is_stale(&entry) {
                let _ = self.inner.l1.remove(fingerprint).await;
            } else {
                return Some(entry);
            }
        }

        let entry = self.l2_get(fingerprint).await?;
        if self.is_stale(&entry) {
            return None;
        }
        if let Err(e) = self.inner.l1.put(&entry).await {
            warn!("failed to promote cache entry: {e}");
        }
        Some(entry)
    }

    /// Store an entry in both tiers, best effort
    ///
    /// L1 always receives the entry; an L2 failure or timeout is logged
    /// and otherwise ignored so a degraded backend never fails a write.
    pub async fn put(&self, entry: &CacheEntry) {
        if let Err(e) = self.inner.l1.put(entry).await {
            warn!("in-memory cache write failed: {e}");
        }
        if let Some(l2) = &self.inner.l2 {
            match tokio::time::timeout(self.inner.settings.l2_timeout, l2.put(entry)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("persistent cache write failed: {e}"),
                Err(_) => warn!("persistent cache write timed out"),
            }
        }
    }

    /// Serve from cache or coordinate exactly one computation of the value
    ///
    /// On a miss, the first caller becomes the leader: it registers a
    /// flight, spawns `fetch` on a detached task, and every concurrent
    /// caller for the same fingerprint awaits that flight's broadcast
    /// instead of computing again. The detached task caches the result
    /// before releasing waiters, so the computation completes even if the
    /// originating request is cancelled. A failed flight releases all
    /// waiters with the same error and leaves nothing cached, so the next
    /// request retries from scratch.
    ///
    /// `fetch` returns the payload plus the cost incurred by the external
    /// call; the cost is surfaced only on the leader's result.
    ///
    /// # Errors
    ///
    /// Propagates the error produced by `fetch` when the flight fails.
    pub async fn get_or_compute<F, Fut>(
        &self,
        context: &ReadinessContext,
        fetch: F,
    ) -> AppResult<CacheLookup>
    where
        F: FnOnce(ReadinessContext) -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<(RecommendationPayload, Option<f64>)>> + Send + 'static,
    {
        let fingerprint = context.fingerprint();
        let mut fetch = Some(fetch);

        loop {
            if let Some(entry) = self.get(&fingerprint).await {
                return Ok(CacheLookup {
                    entry: Arc::new(entry),
                    cache_hit: true,
                    cost_incurred: None,
                });
            }

            let (mut rx, leading) = match self.inner.flights.entry(fingerprint) {
                dashmap::mapref::entry::Entry::Occupied(occupied) => {
                    (occupied.get().subscribe(), false)
                }
                dashmap::mapref::entry::Entry::Vacant(vacant) => {
                    let Some(fetch_fn) = fetch.take() else {
                        return Err(AppError::internal(
                            "computation closure consumed without a result",
                        ));
                    };
                    let (tx, rx) = broadcast::channel(1);
                    vacant.insert(tx.clone());
                    self.spawn_flight(fingerprint, context.clone(), tx, fetch_fn);
                    (rx, true)
                }
            };

            match rx.recv().await {
                Ok(Ok(success)) => {
                    return Ok(CacheLookup {
                        entry: success.entry,
                        cache_hit: false,
                        cost_incurred: if leading { success.cost_incurred } else { None },
                    });
                }
                Ok(Err(failure)) => return Err(failure.to_error()),
                Err(_) => {
                    // The flight we joined finished between our cache check
                    // and the subscription; go around and re-check.
                }
            }
        }
    }

    fn spawn_flight<F, Fut>(
        &self,
        fingerprint: ContextFingerprint,
        context: ReadinessContext,
        tx: broadcast::Sender<FlightOutcome>,
        fetch: F,
    ) where
        F: FnOnce(ReadinessContext) -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<(RecommendationPayload, Option<f64>)>> + Send + 'static,
    {
        let cache = self.clone();
        let user_id = context.user_id;
        tokio::spawn(async move {
            // A caller that missed the cache just as a previous flight was
            // finishing can register a fresh flight for an already-cached
            // fingerprint; re-check the tiers before paying for the call.
            let outcome = if let Some(entry) = cache.get(&fingerprint).await {
                Ok(FlightSuccess {
                    entry: Arc::new(entry),
                    cost_incurred: None,
                })
            } else {
                match fetch(context).await {
                    Ok((recommendation, cost_incurred)) => {
                        let entry = CacheEntry::new(
                            fingerprint,
                            user_id,
                            recommendation,
                            cache.inner.settings.default_ttl,
                        );
                        cache.put(&entry).await;
                        Ok(FlightSuccess {
                            entry: Arc::new(entry),
                            cost_incurred,
                        })
                    }
                    Err(err) => {
                        warn!(%fingerprint, "recommendation computation failed: {err}");
                        Err(FlightFailure::capture(&err))
                    }
                }
            };
            // Deregister before broadcasting: anyone arriving after the
            // removal finds no flight and re-reads the freshly cached entry.
            cache.inner.flights.remove(&fingerprint);
            let _ = tx.send(outcome);
        });
    }

    /// Revoke every cached recommendation the user accumulated before `since`
    ///
    /// The watermark is raised before any physical deletion, so no read can
    /// serve a pre-watermark entry once this call returns, even if a tier
    /// purge fails or an L2 promotion races the deletion. Once both purges
    /// succeed the watermark is marked satisfied and a later sweep retires
    /// it, so the map does not accumulate one entry per user forever.
    /// Returns the number of entries physically removed.
    ///
    /// # Errors
    ///
    /// Currently infallible; tier purge failures are logged and covered by
    /// the watermark.
    pub async fn invalidate_user(&self, user_id: Uuid, since: DateTime<Utc>) -> AppResult<u64> {
        let cutoff = {
            let mut entry = self
                .inner
                .watermarks
                .entry(user_id)
                .or_insert_with(|| Watermark {
                    cutoff: since,
                    recorded_at: Instant::now(),
                    fully_purged: false,
                });
            if since > entry.cutoff {
                entry.cutoff = since;
            }
            entry.fully_purged = false;
            entry.recorded_at = Instant::now();
            entry.cutoff
        };

        let mut all_purged = true;
        let mut removed = match self.inner.l1.purge_user(user_id, cutoff).await {
            Ok(n) => n,
            Err(e) => {
                warn!(%user_id, "in-memory purge failed, watermark still guards reads: {e}");
                all_purged = false;
                0
            }
        };

        if let Some(l2) = &self.inner.l2 {
            match tokio::time::timeout(
                self.inner.settings.l2_timeout,
                l2.purge_user(user_id, cutoff),
            )
            .await
            {
                Ok(Ok(n)) => removed += n,
                Ok(Err(e)) => {
                    warn!(%user_id, "persistent purge failed, watermark still guards reads: {e}");
                    all_purged = false;
                }
                Err(_) => {
                    warn!(%user_id, "persistent purge timed out, watermark still guards reads");
                    all_purged = false;
                }
            }
        }

        if all_purged {
            if let Some(mut watermark) = self.inner.watermarks.get_mut(&user_id) {
                // A concurrent invalidation may have raised the cutoff past
                // ours; only the purge that matched it may satisfy it.
                if watermark.cutoff == cutoff {
                    watermark.fully_purged = true;
                    watermark.recorded_at = Instant::now();
                }
            }
        }

        Ok(removed)
    }

    /// Physically delete expired entries from both tiers
    ///
    /// Also retires satisfied invalidation watermarks whose in-flight read
    /// window has drained: a read that fetched a row before its purge
    /// completes within the L2 timeout, so twice that bound is long enough.
    ///
    /// # Errors
    ///
    /// Returns `CacheBackendError` when the persistent tier sweep fails.
    pub async fn sweep_expired(&self) -> AppResult<u64> {
        let now = Utc::now();
        let mut removed = self.inner.l1.sweep_expired(now).await?;
        if let Some(l2) = &self.inner.l2 {
            removed += l2.sweep_expired(now).await?;
        }

        let grace = self.inner.settings.l2_timeout.saturating_mul(2);
        self.inner.watermarks.retain(|_, watermark| {
            !(watermark.fully_purged && watermark.recorded_at.elapsed() > grace)
        });

        Ok(removed)
    }

    /// Verify both tiers are reachable
    ///
    /// # Errors
    ///
    /// Returns the first tier error encountered.
    pub async fn health_check(&self) -> AppResult<()> {
        self.inner.l1.health_check().await?;
        if let Some(l2) = &self.inner.l2 {
            l2.health_check().await?;
        }
        Ok(())
    }
}
