// ABOUTME: Persistent L2 cache tier backed by SQLite via sqlx
// ABOUTME: Entries survive restarts; per-user purges use the (user_id, created_at) index
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Readiness Intelligence

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use crate::cache::{CacheEntry, CacheTier};
use crate::errors::{AppError, AppResult};
use crate::fingerprint::ContextFingerprint;
use crate::models::RecommendationPayload;

/// Persistent cache tier
///
/// Timestamps are stored as RFC 3339 text so range predicates work with
/// plain string comparison.
#[derive(Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    /// Wrap an existing pool; call [`Self::migrate`] before first use
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `database_url` and migrate
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` when the database cannot be opened or the
    /// schema cannot be created.
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::database(format!("invalid database url: {e}")))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("failed to open cache database: {e}")))?;
        let cache = Self::new(pool);
        cache.migrate().await?;
        Ok(cache)
    }

    /// Create the cache table and its per-user index
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` when schema creation fails.
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS recommendation_cache (
                fingerprint TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to create cache table: {e}")))?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_recommendation_cache_user_created
            ON recommendation_cache(user_id, created_at)
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to create cache index: {e}")))?;

        Ok(())
    }

    fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> AppResult<CacheEntry> {
        let fingerprint: String = row.get("fingerprint");
        let user_id: String = row.get("user_id");
        let payload: String = row.get("payload");
        let created_at: String = row.get("created_at");
        let expires_at: String = row.get("expires_at");

        let recommendation: RecommendationPayload = serde_json::from_str(&payload)?;
        Ok(CacheEntry {
            fingerprint: ContextFingerprint::from_hex(&fingerprint)?,
            user_id: Uuid::parse_str(&user_id)
                .map_err(|e| AppError::database(format!("corrupt user_id in cache row: {e}")))?,
            recommendation,
            created_at: parse_timestamp(&created_at)?,
            expires_at: parse_timestamp(&expires_at)?,
        })
    }
}

fn parse_timestamp(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::database(format!("corrupt timestamp in cache row: {e}")))
}

#[async_trait::async_trait]
impl CacheTier for SqliteCache {
    async fn get(&self, fingerprint: &ContextFingerprint) -> AppResult<Option<CacheEntry>> {
        let row = sqlx::query(
            r"
            SELECT fingerprint, user_id, payload, created_at, expires_at
            FROM recommendation_cache
            WHERE fingerprint = ?
            ",
        )
        .bind(fingerprint.to_hex())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::cache_backend(format!("cache read failed: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let entry = Self::entry_from_row(&row)?;
        if entry.is_expired_at(Utc::now()) {
            self.remove(fingerprint).await?;
            Ok(None)
        } else {
            Ok(Some(entry))
        }
    }

    async fn put(&self, entry: &CacheEntry) -> AppResult<()> {
        let payload = serde_json::to_string(&entry.recommendation)?;
        sqlx::query(
            r"
            INSERT OR REPLACE INTO recommendation_cache
                (fingerprint, user_id, payload, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?)
            ",
        )
        .bind(entry.fingerprint.to_hex())
        .bind(entry.user_id.to_string())
        .bind(payload)
        .bind(entry.created_at.to_rfc3339())
        .bind(entry.expires_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::cache_backend(format!("cache write failed: {e}")))?;
        Ok(())
    }

    async fn remove(&self, fingerprint: &ContextFingerprint) -> AppResult<()> {
        sqlx::query("DELETE FROM recommendation_cache WHERE fingerprint = ?")
            .bind(fingerprint.to_hex())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::cache_backend(format!("cache delete failed: {e}")))?;
        Ok(())
    }

    async fn purge_user(&self, user_id: Uuid, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM recommendation_cache WHERE user_id = ? AND created_at < ?",
        )
        .bind(user_id.to_string())
        .bind(before.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::cache_backend(format!("cache purge failed: {e}")))?;
        Ok(result.rows_affected())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM recommendation_cache WHERE expires_at <= ?")
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::cache_backend(format!("cache sweep failed: {e}")))?;
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::cache_backend(format!("cache health check failed: {e}")))?;
        Ok(())
    }
}
