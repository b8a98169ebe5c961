//! Enrichment job: metadata, mint authorities and holder concentration.
//!
//! Each cycle loads tokens that were never enriched or have gone stale and
//! enriches them with bounded concurrency. Per token, the three fetches run
//! concurrently and each is retried independently; a failed fetch is
//! recorded on the token as `"<fetch>: <error>"` and never aborts the
//! token or the batch.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;

use super::worker::BatchJob;
use crate::config::EnrichmentSettings;
use crate::domain::{HolderSnapshot, TokenEnrichment, TokenRecord};
use crate::error::RadarError;
use crate::persistence::Storage;
use crate::sources::{EnrichmentSource, RetryPolicy};

/// Outcome of one enrichment cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    /// Tokens selected for enrichment.
    pub selected: usize,
    /// Tokens whose enrichment was persisted.
    pub enriched: usize,
    /// Tokens with at least one failed fetch.
    pub partial: usize,
    /// Tokens whose enrichment could not be persisted.
    pub failed: usize,
}

/// Periodic token enrichment.
#[derive(Debug, Clone)]
pub struct EnrichmentJob {
    storage: Arc<dyn Storage>,
    source: Arc<dyn EnrichmentSource>,
    retry: RetryPolicy,
    settings: EnrichmentSettings,
}

impl EnrichmentJob {
    /// Creates an enrichment job.
    #[must_use]
    pub fn new(
        storage: Arc<dyn Storage>,
        source: Arc<dyn EnrichmentSource>,
        retry: RetryPolicy,
        settings: EnrichmentSettings,
    ) -> Self {
        Self {
            storage,
            source,
            retry,
            settings,
        }
    }

    /// Enriches one batch of due tokens.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::PersistenceError`] if the due tokens cannot be
    /// loaded. Per-token failures are counted in the report.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<EnrichmentReport, RadarError> {
        let tokens = self
            .storage
            .get_tokens_to_enrich(self.settings.batch_size, self.settings.stale_after, now)
            .await?;
        let mut report = EnrichmentReport {
            selected: tokens.len(),
            ..EnrichmentReport::default()
        };

        // Owned records keep the fan-out future `Send` inside `run_once`.
        let results: Vec<Result<TokenEnrichment, RadarError>> =
            futures_util::stream::iter(tokens)
                .map(|token| async move { self.enrich_token(&token, now).await })
                .buffer_unordered(self.settings.concurrency.max(1))
                .collect()
                .await;

        for result in results {
            match result {
                Ok(enrichment) => {
                    report.enriched += 1;
                    if !enrichment.errors.is_empty() {
                        report.partial += 1;
                    }
                }
                Err(_) => report.failed += 1,
            }
        }
        Ok(report)
    }

    /// Fetches and persists enrichment for a single token.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::PersistenceError`] if the result cannot be
    /// stored. Fetch failures are recorded, not returned.
    pub async fn enrich_token(
        &self,
        token: &TokenRecord,
        now: DateTime<Utc>,
    ) -> Result<TokenEnrichment, RadarError> {
        let mint = &token.mint;
        let source = self.source.as_ref();
        let limit = self.settings.holder_sample_limit;
        let (metadata, info, holders) = futures_util::join!(
            self.retry
                .run("metadata", || source.fetch_token_metadata(mint)),
            self.retry.run("info", || source.fetch_token_info(mint)),
            self.retry
                .run("holders", || source.fetch_token_holders(mint, limit)),
        );

        let mut errors = Vec::new();
        let (name, symbol) = match metadata {
            Ok(m) => (m.name, m.symbol),
            Err(e) => {
                errors.push(format!("metadata: {e}"));
                (None, None)
            }
        };
        let info = info.map_err(|e| errors.push(format!("info: {e}"))).ok();
        match holders {
            Ok(page) => {
                let snapshot =
                    HolderSnapshot::from_balances(mint.clone(), &page.balances, page.total, now);
                if let Err(e) = self.storage.insert_holder_snapshot(&snapshot).await {
                    errors.push(format!("holders: {e}"));
                }
            }
            Err(e) => errors.push(format!("holders: {e}")),
        }

        let enrichment = TokenEnrichment {
            name,
            symbol,
            info_fetched: info.is_some(),
            decimals: info.as_ref().map(|i| i.decimals),
            supply: info.as_ref().map(|i| i.supply),
            mint_authority: info.as_ref().and_then(|i| i.mint_authority.clone()),
            freeze_authority: info.as_ref().and_then(|i| i.freeze_authority.clone()),
            errors,
            enriched_at: now,
        };

        if let Err(e) = self.storage.update_token_enrichment(mint, &enrichment).await {
            tracing::warn!(%mint, error = %e, "enrichment not persisted");
            return Err(e);
        }
        if enrichment.errors.is_empty() {
            tracing::debug!(%mint, "token enriched");
        } else {
            tracing::warn!(%mint, errors = ?enrichment.errors, "token partially enriched");
        }
        Ok(enrichment)
    }
}

#[async_trait]
impl BatchJob for EnrichmentJob {
    fn name(&self) -> &'static str {
        "enrichment"
    }

    async fn run_once(&self, now: DateTime<Utc>) -> Result<usize, RadarError> {
        let report = self.run_cycle(now).await?;
        if report.partial > 0 || report.failed > 0 {
            tracing::info!(
                selected = report.selected,
                partial = report.partial,
                failed = report.failed,
                "enrichment cycle had failures"
            );
        }
        Ok(report.enriched)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::config::EnrichmentSettings;
    use crate::domain::Mint;
    use crate::error::FetchError;
    use crate::persistence::InMemoryStorage;
    use crate::sources::{HolderPage, TokenInfo, TokenMetadata};

    #[derive(Debug, Default)]
    struct ScriptedSource {
        info_transient_failures: usize,
        info_calls: AtomicUsize,
        holders_missing: bool,
    }

    #[async_trait]
    impl EnrichmentSource for ScriptedSource {
        async fn fetch_token_metadata(&self, _mint: &Mint) -> Result<TokenMetadata, FetchError> {
            Ok(TokenMetadata {
                name: Some("Radar".to_string()),
                symbol: Some("RDR".to_string()),
            })
        }

        async fn fetch_token_info(&self, _mint: &Mint) -> Result<TokenInfo, FetchError> {
            let call = self.info_calls.fetch_add(1, Ordering::SeqCst);
            if call < self.info_transient_failures {
                return Err(FetchError::Transient("503".to_string()));
            }
            Ok(TokenInfo {
                decimals: 6,
                supply: 1_000_000.0,
                mint_authority: None,
                freeze_authority: Some("Freezer".to_string()),
            })
        }

        async fn fetch_token_holders(
            &self,
            _mint: &Mint,
            _limit: u32,
        ) -> Result<HolderPage, FetchError> {
            if self.holders_missing {
                return Err(FetchError::Client {
                    status: 404,
                    message: "not found".to_string(),
                });
            }
            Ok(HolderPage {
                balances: vec![50.0, 30.0, 20.0],
                total: Some(3),
            })
        }
    }

    fn job(storage: &Arc<InMemoryStorage>, source: ScriptedSource) -> EnrichmentJob {
        EnrichmentJob::new(
            Arc::clone(storage) as Arc<dyn Storage>,
            Arc::new(source),
            RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(4)),
            EnrichmentSettings::default(),
        )
    }

    async fn seed(storage: &InMemoryStorage, mint: &str) -> TokenRecord {
        let now = Utc::now();
        let Ok(_) = storage.upsert_token(&Mint::from(mint), now).await else {
            panic!("seed failed");
        };
        let Ok(Some(token)) = storage.get_token(&Mint::from(mint)).await else {
            panic!("token missing");
        };
        token
    }

    #[tokio::test]
    async fn full_enrichment_persists_everything() {
        let storage = Arc::new(InMemoryStorage::default());
        let token = seed(&storage, "MintA").await;
        let job = job(&storage, ScriptedSource::default());

        let Ok(enrichment) = job.enrich_token(&token, Utc::now()).await else {
            panic!("enrichment should persist");
        };
        assert!(enrichment.errors.is_empty());
        assert!(enrichment.info_fetched);

        let Ok(Some(stored)) = storage.get_token(&token.mint).await else {
            panic!("token missing");
        };
        assert_eq!(stored.symbol.as_deref(), Some("RDR"));
        assert_eq!(stored.freeze_authority.as_deref(), Some("Freezer"));
        assert!(stored.last_enriched_at.is_some());

        let Ok(Some(holders)) = storage.get_latest_holder_snapshot(&token.mint).await else {
            panic!("holder snapshot missing");
        };
        assert_eq!(holders.holder_count, 3);
        assert!((holders.top1_pct - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn transient_info_failures_are_retried() {
        let storage = Arc::new(InMemoryStorage::default());
        let token = seed(&storage, "MintA").await;
        let source = ScriptedSource {
            info_transient_failures: 2,
            ..ScriptedSource::default()
        };
        let job = job(&storage, source);
        let Ok(enrichment) = job.enrich_token(&token, Utc::now()).await else {
            panic!("enrichment should persist");
        };
        assert!(enrichment.info_fetched);
        assert!(enrichment.errors.is_empty());
    }

    #[tokio::test]
    async fn failed_holders_fetch_is_recorded_not_fatal() {
        let storage = Arc::new(InMemoryStorage::default());
        let token = seed(&storage, "MintA").await;
        let source = ScriptedSource {
            holders_missing: true,
            ..ScriptedSource::default()
        };
        let job = job(&storage, source);
        let Ok(enrichment) = job.enrich_token(&token, Utc::now()).await else {
            panic!("enrichment should persist");
        };
        assert_eq!(enrichment.errors.len(), 1);
        assert!(enrichment.errors.iter().all(|e| e.starts_with("holders: ")));
        assert!(enrichment.info_fetched);

        let Ok(None) = storage.get_latest_holder_snapshot(&token.mint).await else {
            panic!("no snapshot expected");
        };
    }

    #[tokio::test]
    async fn exhausted_retries_leave_authorities_unknown() {
        let storage = Arc::new(InMemoryStorage::default());
        let token = seed(&storage, "MintA").await;
        let source = ScriptedSource {
            info_transient_failures: usize::MAX,
            ..ScriptedSource::default()
        };
        let job = job(&storage, source);
        let Ok(enrichment) = job.enrich_token(&token, Utc::now()).await else {
            panic!("enrichment should persist");
        };
        assert!(!enrichment.info_fetched);
        assert!(enrichment.errors.iter().any(|e| e.starts_with("info: ")));
    }

    #[tokio::test]
    async fn cycle_runs_on_a_spawned_task_as_batch_job() {
        let storage = Arc::new(InMemoryStorage::default());
        let _ = seed(&storage, "MintA").await;
        let _ = seed(&storage, "MintB").await;
        let job: Arc<dyn BatchJob> = Arc::new(job(&storage, ScriptedSource::default()));

        let handle = tokio::spawn(async move { job.run_once(Utc::now()).await });
        let Ok(Ok(enriched)) = handle.await else {
            panic!("spawned enrichment cycle failed");
        };
        assert_eq!(enriched, 2);
    }

    #[tokio::test]
    async fn cycle_skips_fresh_tokens() {
        let storage = Arc::new(InMemoryStorage::default());
        let _ = seed(&storage, "MintA").await;
        let _ = seed(&storage, "MintB").await;
        let job = job(&storage, ScriptedSource::default());

        let now = Utc::now();
        let Ok(first) = job.run_cycle(now).await else {
            panic!("cycle failed");
        };
        assert_eq!(first.selected, 2);
        assert_eq!(first.enriched, 2);

        let Ok(second) = job.run_cycle(now).await else {
            panic!("cycle failed");
        };
        assert_eq!(second.selected, 0);
    }
}
