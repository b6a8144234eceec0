// ABOUTME: Orchestration facade wiring engine, scorer, cache, ledger, and provider together
// ABOUTME: Serializes per-user state updates while keeping independent users fully concurrent
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Readiness Intelligence

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::TwoTierCache;
use crate::errors::AppResult;
use crate::fingerprint::ReadinessContext;
use crate::intelligence::{ReadinessScorer, TrainingLoadEngine, TrainingLoadState};
use crate::ledger::CostLedger;
use crate::llm::ReasoningProvider;
use crate::models::{AlertLevel, DailySample, ReadinessResult};

/// End-to-end readiness pipeline
///
/// One instance serves all users. Updates to a single user's training-load
/// state are serialized through a per-user mutex so samples for that user
/// apply in order; different users never contend. The expensive
/// recommendation step sits behind the two-tier cache, so identical
/// analytical contexts are answered without a second external call.
#[derive(Clone)]
pub struct ReadinessService {
    engine: TrainingLoadEngine,
    scorer: ReadinessScorer,
    cache: TwoTierCache,
    ledger: CostLedger,
    provider: Arc<dyn ReasoningProvider>,
    states: Arc<DashMap<Uuid, Arc<Mutex<TrainingLoadState>>>>,
}

impl ReadinessService {
    /// Assemble the pipeline from its components
    #[must_use]
    pub fn new(
        engine: TrainingLoadEngine,
        scorer: ReadinessScorer,
        cache: TwoTierCache,
        ledger: CostLedger,
        provider: Arc<dyn ReasoningProvider>,
    ) -> Self {
        Self {
            engine,
            scorer,
            cache,
            ledger,
            provider,
            states: Arc::new(DashMap::new()),
        }
    }

    fn state_cell(&self, user_id: Uuid) -> Arc<Mutex<TrainingLoadState>> {
        let entry = self
            .states
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(TrainingLoadState::new(user_id))));
        Arc::clone(entry.value())
    }

    /// Ingest one daily sample and produce the day's readiness result
    ///
    /// The sample is applied under the user's state lock, the composite
    /// score and context are derived, and the recommendation is served
    /// from cache or computed exactly once per fingerprint. Re-delivering
    /// the day already applied skips the state update and re-assesses the
    /// current state, so a retryable reasoning failure is recovered by
    /// retrying the same sample; content corrections for an applied day
    /// go through [`Self::replay_history`]. A ledger write failure
    /// downgrades to a logged warning with `cost_incurred` unset; the
    /// athlete still gets their recommendation.
    ///
    /// # Errors
    ///
    /// Returns validation errors for rejected samples and external-call
    /// errors when a required computation fails.
    pub async fn ingest_and_assess(&self, sample: &DailySample) -> AppResult<ReadinessResult> {
        let user_id = sample.user_id;
        let date = sample.date;

        let cell = self.state_cell(user_id);
        let assessment = {
            let mut state = cell.lock().await;
            if state.last_date == Some(sample.date) {
                // The state already reflects this day; assess without
                // mutating so a failed reasoning call stays retryable.
                self.scorer.score(&self.engine.derive_metrics(&state))
            } else {
                let next = self.engine.apply_daily_sample(&state, sample)?;
                let metrics = self.engine.derive_metrics(&next);
                *state = next;
                self.scorer.score(&metrics)
            }
        };

        let context = ReadinessContext::from_assessment(user_id, date, &assessment);

        let provider = Arc::clone(&self.provider);
        let ledger = self.ledger.clone();
        let lookup = self
            .cache
            .get_or_compute(&context, move |ctx| async move {
                let response = provider.generate(&ctx).await?;
                let cost = match ledger
                    .record_call(ctx.user_id, &response.model, &response.usage)
                    .await
                {
                    Ok(record) => Some(record.computed_cost),
                    Err(e) => {
                        warn!(user_id = %ctx.user_id, "cost ledger write failed, serving anyway: {e}");
                        None
                    }
                };
                Ok((response.recommendation, cost))
            })
            .await?;

        debug!(
            %user_id,
            %date,
            cache_hit = lookup.cache_hit,
            composite = assessment.composite_score,
            "readiness assessed"
        );

        Ok(ReadinessResult {
            user_id,
            date,
            composite_score: assessment.composite_score,
            flags: assessment.flags,
            metrics: assessment.metrics,
            recommendation: lookup.entry.recommendation.clone(),
            cache_hit: lookup.cache_hit,
            cost_incurred: lookup.cost_incurred,
        })
    }

    /// Rebuild a user's state from corrected history
    ///
    /// Replaces the in-memory state with a replay of the full sample
    /// sequence and revokes the user's cached recommendations, since they
    /// were derived from the superseded history.
    ///
    /// # Errors
    ///
    /// Returns the first validation error encountered during replay; on
    /// error the existing state is left untouched.
    pub async fn replay_history(
        &self,
        user_id: Uuid,
        samples: &[DailySample],
    ) -> AppResult<TrainingLoadState> {
        let rebuilt = self.engine.replay(user_id, samples)?;
        let cell = self.state_cell(user_id);
        {
            let mut state = cell.lock().await;
            *state = rebuilt.clone();
        }
        let removed = self.cache.invalidate_user(user_id, Utc::now()).await?;
        debug!(%user_id, removed, "history replayed, cached recommendations revoked");
        Ok(rebuilt)
    }

    /// Revoke every recommendation cached for the user so far
    ///
    /// Returns the number of entries physically removed; the invalidation
    /// is effective for reads as soon as this returns regardless.
    ///
    /// # Errors
    ///
    /// Propagates cache invalidation failures.
    pub async fn invalidate_user(&self, user_id: Uuid) -> AppResult<u64> {
        self.cache.invalidate_user(user_id, Utc::now()).await
    }

    /// Current training-load state snapshot, if the user has any history
    pub async fn state_snapshot(&self, user_id: Uuid) -> Option<TrainingLoadState> {
        let cell = self.states.get(&user_id).map(|e| Arc::clone(e.value()))?;
        let state = cell.lock().await;
        Some(state.clone())
    }

    /// Budget alert level for the user's spend this month
    ///
    /// # Errors
    ///
    /// Propagates ledger failures.
    pub async fn check_budget(&self, user_id: Uuid, monthly_budget: f64) -> AppResult<AlertLevel> {
        self.ledger.check_budget(user_id, monthly_budget).await
    }
}
