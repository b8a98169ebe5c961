//! Scoring job: aggregate, score, persist, and alert for active tokens.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::aggregator::{LOOKBACK_MINUTES, MetricsAggregator};
use super::alerting::{AlertDispatcher, AlertStateMachine, DispatchOutcome};
use super::scoring::{ScoringEngine, ScoringInput};
use super::worker::BatchJob;
use crate::domain::{AlertDecision, HolderSnapshot, MetricsSnapshot, ScoreResult, TokenRecord};
use crate::error::RadarError;
use crate::notify::render_alert;
use crate::persistence::Storage;

/// Outcome of one scoring cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoringReport {
    /// Tokens scored and persisted.
    pub scored: usize,
    /// Alerts sent, edited or re-sent.
    pub alerts: usize,
    /// Tokens that failed anywhere in the chain.
    pub failed: usize,
}

/// Everything produced for one token in one cycle.
#[derive(Debug, Clone)]
pub struct TokenEvaluation {
    /// Metrics the score was computed from.
    pub metrics: MetricsSnapshot,
    /// The persisted score.
    pub score: ScoreResult,
    /// What the alert state machine decided.
    pub decision: AlertDecision,
    /// What the dispatcher did.
    pub outcome: DispatchOutcome,
}

/// Periodic scoring over the most active tokens.
#[derive(Debug, Clone)]
pub struct ScoringJob {
    storage: Arc<dyn Storage>,
    dispatcher: AlertDispatcher,
    alerts: AlertStateMachine,
    batch_size: u32,
}

impl ScoringJob {
    /// Creates a scoring job handling up to `batch_size` tokens per cycle.
    #[must_use]
    pub fn new(
        storage: Arc<dyn Storage>,
        dispatcher: AlertDispatcher,
        alerts: AlertStateMachine,
        batch_size: u32,
    ) -> Self {
        Self {
            storage,
            dispatcher,
            alerts,
            batch_size,
        }
    }

    /// Scores one batch of active tokens. A failing token is logged and
    /// counted; the rest of the batch continues.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::PersistenceError`] if the active tokens cannot
    /// be loaded.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<ScoringReport, RadarError> {
        let tokens = self.storage.get_active_tokens(self.batch_size).await?;
        let mut report = ScoringReport::default();
        for token in &tokens {
            match self.evaluate(token, now).await {
                Ok(evaluation) => {
                    report.scored += 1;
                    if evaluation.outcome != DispatchOutcome::Suppressed {
                        report.alerts += 1;
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(mint = %token.mint, error = %e, "token scoring failed");
                }
            }
        }
        Ok(report)
    }

    /// Runs the full chain for one token.
    ///
    /// # Errors
    ///
    /// Returns the first persistence or notification error. A score that
    /// was already stored stays stored when alerting fails.
    pub async fn evaluate(
        &self,
        token: &TokenRecord,
        now: DateTime<Utc>,
    ) -> Result<TokenEvaluation, RadarError> {
        let holders = self.storage.get_latest_holder_snapshot(&token.mint).await?;
        let metrics = self.collect_metrics(token, holders.as_ref(), now).await?;

        let score = ScoringEngine::score(&ScoringInput {
            token,
            metrics: &metrics,
            holders: holders.as_ref(),
            now,
        });
        self.storage.insert_score(&score).await?;
        tracing::debug!(mint = %token.mint, score = score.score, flags = score.risk_flags.len(), "token scored");

        let prior = self.storage.get_or_create_alert(&token.mint).await?;
        let decision = self.alerts.decide(&score, &prior);
        let outcome = if decision == AlertDecision::Suppress {
            DispatchOutcome::Suppressed
        } else {
            let content = render_alert(token, &score, &metrics);
            self.dispatcher
                .dispatch(decision, &score, &content, &prior, now)
                .await?
        };

        Ok(TokenEvaluation {
            metrics,
            score,
            decision,
            outcome,
        })
    }

    /// Window metrics plus liquidity from the newest pool and the holder
    /// count from the newest snapshot. The snapshot is persisted.
    async fn collect_metrics(
        &self,
        token: &TokenRecord,
        holders: Option<&HolderSnapshot>,
        now: DateTime<Utc>,
    ) -> Result<MetricsSnapshot, RadarError> {
        let since = now - Duration::minutes(LOOKBACK_MINUTES);
        let swaps = self.storage.get_swap_metrics(&token.mint, since).await?;
        let mut metrics = MetricsAggregator::aggregate(&token.mint, &swaps, now);

        let pools = self.storage.get_pools_for_token(&token.mint).await?;
        if let Some(pool) = pools.first() {
            metrics.liquidity_usd = pool.initial_liquidity_usd;
            metrics.liquidity_sol = pool.initial_liquidity_sol;
        }
        metrics.holder_count = holders.map(|h| h.holder_count);

        self.storage.insert_token_metrics(&metrics).await?;
        Ok(metrics)
    }
}

#[async_trait]
impl BatchJob for ScoringJob {
    fn name(&self) -> &'static str {
        "scoring"
    }

    async fn run_once(&self, now: DateTime<Utc>) -> Result<usize, RadarError> {
        let report = self.run_cycle(now).await?;
        if report.alerts > 0 || report.failed > 0 {
            tracing::info!(
                scored = report.scored,
                alerts = report.alerts,
                failed = report.failed,
                "scoring cycle complete"
            );
        }
        Ok(report.scored)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::config::AlertThresholds;
    use crate::domain::{MessageHandle, Mint, NormalizedPoolCreation};
    use crate::notify::Notifier;
    use crate::persistence::InMemoryStorage;

    #[derive(Debug, Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, content: &str) -> Result<MessageHandle, RadarError> {
            let mut sent = self.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            sent.push(content.to_string());
            Ok(MessageHandle::new(sent.len().to_string()))
        }

        async fn edit(&self, _handle: &MessageHandle, _content: &str) -> Result<bool, RadarError> {
            Ok(true)
        }
    }

    fn job(storage: &Arc<InMemoryStorage>, notifier: &Arc<RecordingNotifier>) -> ScoringJob {
        let storage = Arc::clone(storage) as Arc<dyn Storage>;
        let dispatcher =
            AlertDispatcher::new(Arc::clone(notifier) as Arc<dyn Notifier>, Arc::clone(&storage));
        ScoringJob::new(
            storage,
            dispatcher,
            AlertStateMachine::new(AlertThresholds::default()),
            50,
        )
    }

    #[tokio::test]
    async fn quiet_token_is_scored_without_alert() {
        let storage = Arc::new(InMemoryStorage::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let now = Utc::now();
        let Ok(_) = storage.upsert_token(&Mint::from("MintA"), now).await else {
            panic!("seed failed");
        };

        let Ok(report) = job(&storage, &notifier).run_cycle(now).await else {
            panic!("cycle failed");
        };
        assert_eq!(report.scored, 1);
        assert_eq!(report.alerts, 0);

        let Ok(Some(score)) = storage.get_latest_score(&Mint::from("MintA")).await else {
            panic!("score missing");
        };
        assert!(score.score < 70);
        let Ok(Some(metrics)) = storage.get_latest_token_metrics(&Mint::from("MintA")).await else {
            panic!("metrics missing");
        };
        assert_eq!(metrics.window_15m.swaps, 0);
    }

    #[tokio::test]
    async fn pool_liquidity_feeds_metrics() {
        let storage = Arc::new(InMemoryStorage::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let now = Utc::now();
        let mint = Mint::from("MintA");
        let Ok(_) = storage.upsert_token(&mint, now).await else {
            panic!("seed failed");
        };
        let pool = NormalizedPoolCreation {
            token_mint: mint.clone(),
            pool_address: Some("Pool1".to_string()),
            dex: "raydium".to_string(),
            base_mint: mint.clone(),
            quote_mint: None,
            created_at: now,
            signature: Some("p1".to_string()),
            initial_liquidity_usd: Some(60_000.0),
            initial_liquidity_sol: Some(400.0),
        };
        let Ok(_) = storage.upsert_pool(&pool).await else {
            panic!("pool insert failed");
        };

        let Some(token) = storage.get_token(&mint).await.ok().flatten() else {
            panic!("token missing");
        };
        let Ok(evaluation) = job(&storage, &notifier).evaluate(&token, now).await else {
            panic!("evaluation failed");
        };
        assert_eq!(evaluation.metrics.liquidity_usd, Some(60_000.0));
        assert_eq!(evaluation.metrics.liquidity_sol, Some(400.0));
    }
}
