// ABOUTME: Append-only cost ledger for external reasoning calls, persisted in SQLite
// ABOUTME: Monthly aggregates and budget alerting are computed from the ledger alone
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Readiness Intelligence

use chrono::{Datelike, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use crate::config::{BudgetThresholds, PricingTable};
use crate::errors::{AppError, AppResult};
use crate::models::{AlertLevel, CostRecord, TokenUsage};

const TOKENS_PER_MILLION: f64 = 1_000_000.0;

/// Append-only ledger of external call costs
///
/// Every external call writes one record at its computed price; aggregates
/// are always recomputed from the stored records, never from a running
/// counter, so the ledger stays auditable and restart-safe.
#[derive(Clone)]
pub struct CostLedger {
    pool: SqlitePool,
    pricing: PricingTable,
    thresholds: BudgetThresholds,
}

impl CostLedger {
    /// Wrap an existing pool; call [`Self::migrate`] before first use
    #[must_use]
    pub const fn new(pool: SqlitePool, pricing: PricingTable, thresholds: BudgetThresholds) -> Self {
        Self {
            pool,
            pricing,
            thresholds,
        }
    }

    /// Open (creating if missing) the ledger database and migrate
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` when the database cannot be opened or the
    /// schema cannot be created.
    pub async fn connect(
        database_url: &str,
        pricing: PricingTable,
        thresholds: BudgetThresholds,
    ) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::database(format!("invalid database url: {e}")))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("failed to open ledger database: {e}")))?;
        let ledger = Self::new(pool, pricing, thresholds);
        ledger.migrate().await?;
        Ok(ledger)
    }

    /// Create the ledger table and its aggregation index
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` when schema creation fails.
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS cost_records (
                call_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,
                model TEXT NOT NULL,
                input_tokens INTEGER NOT NULL,
                output_tokens INTEGER NOT NULL,
                cached_tokens INTEGER NOT NULL,
                computed_cost REAL NOT NULL,
                recorded_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to create ledger table: {e}")))?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_cost_records_user_date
            ON cost_records(user_id, date)
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to create ledger index: {e}")))?;

        Ok(())
    }

    /// Price a call from the table without recording it
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the model is missing from the pricing
    /// table; silently defaulting a price would corrupt the ledger.
    pub fn compute_cost(&self, model: &str, usage: &TokenUsage) -> AppResult<f64> {
        let pricing = self.pricing.price_for(model).ok_or_else(|| {
            AppError::config(format!("no pricing configured for model '{model}'"))
        })?;
        let input = usage.input_tokens as f64 * pricing.input_per_million;
        let output = usage.output_tokens as f64 * pricing.output_per_million;
        let cached = usage.cached_tokens as f64 * pricing.cached_per_million;
        Ok((input + output + cached) / TOKENS_PER_MILLION)
    }

    /// Record one external call in the ledger
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an unpriced model and `DatabaseError` when
    /// the insert fails.
    pub async fn record_call(
        &self,
        user_id: Uuid,
        model: &str,
        usage: &TokenUsage,
    ) -> AppResult<CostRecord> {
        let computed_cost = self.compute_cost(model, usage)?;
        let recorded_at = Utc::now();
        let record = CostRecord {
            call_id: Uuid::new_v4(),
            user_id,
            date: recorded_at.date_naive(),
            model: model.to_owned(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cached_tokens: usage.cached_tokens,
            computed_cost,
            recorded_at,
        };

        sqlx::query(
            r"
            INSERT INTO cost_records
                (call_id, user_id, date, model, input_tokens, output_tokens,
                 cached_tokens, computed_cost, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(record.call_id.to_string())
        .bind(record.user_id.to_string())
        .bind(record.date.format("%Y-%m-%d").to_string())
        .bind(&record.model)
        .bind(record.input_tokens as i64)
        .bind(record.output_tokens as i64)
        .bind(record.cached_tokens as i64)
        .bind(record.computed_cost)
        .bind(record.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to record call cost: {e}")))?;

        Ok(record)
    }

    /// Total recorded spend for the user in the given calendar month
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` when the aggregate query fails or
    /// `InvalidInput` for an impossible year/month.
    pub async fn monthly_cost(&self, user_id: Uuid, year: i32, month: u32) -> AppResult<f64> {
        let (start, end) = month_bounds(year, month)?;
        let row = sqlx::query(
            r"
            SELECT COALESCE(SUM(computed_cost), 0.0) AS total
            FROM cost_records
            WHERE user_id = ? AND date >= ? AND date < ?
            ",
        )
        .bind(user_id.to_string())
        .bind(start.format("%Y-%m-%d").to_string())
        .bind(end.format("%Y-%m-%d").to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to aggregate monthly cost: {e}")))?;
        Ok(row.get("total"))
    }

    /// Alert level for the user's spend in the given month against a budget
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a non-positive budget and propagates
    /// aggregation failures.
    pub async fn check_budget_for_month(
        &self,
        user_id: Uuid,
        monthly_budget: f64,
        year: i32,
        month: u32,
    ) -> AppResult<AlertLevel> {
        if monthly_budget <= 0.0 {
            return Err(AppError::invalid_input("monthly budget must be positive"));
        }
        let spent = self.monthly_cost(user_id, year, month).await?;
        let ratio = spent / monthly_budget;
        Ok(if ratio >= self.thresholds.exceeded {
            AlertLevel::Exceeded
        } else if ratio >= self.thresholds.warning {
            AlertLevel::Warning
        } else if ratio >= self.thresholds.notice {
            AlertLevel::Notice
        } else {
            AlertLevel::None
        })
    }

    /// Alert level for the current calendar month
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::check_budget_for_month`].
    pub async fn check_budget(&self, user_id: Uuid, monthly_budget: f64) -> AppResult<AlertLevel> {
        let today = Utc::now().date_naive();
        self.check_budget_for_month(user_id, monthly_budget, today.year(), today.month())
            .await
    }
}

/// First day of the month and first day of the next month
fn month_bounds(year: i32, month: u32) -> AppResult<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::invalid_input(format!("invalid month {year}-{month:02}")))?;
    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| AppError::invalid_input(format!("invalid month {year}-{month:02}")))?;
    Ok((start, end))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn month_bounds_handle_december() {
        let (start, end) = month_bounds(2025, 12).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
    }

    #[test]
    fn month_bounds_reject_month_13() {
        assert!(month_bounds(2025, 13).is_err());
    }
}
