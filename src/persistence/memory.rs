//! In-process storage for tests and local runs.
//!
//! [`InMemoryStorage`] keeps every table in one struct behind a single
//! [`tokio::sync::RwLock`]. Reads take the shared lock; each write takes
//! the exclusive lock once, so a write is atomic with respect to readers.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{Storage, pool_key};
use crate::domain::{
    AlertState, HolderSnapshot, MetricsSnapshot, Mint, NormalizedPoolCreation, NormalizedSwap,
    RawEvent, ScoreResult, TokenEnrichment, TokenRecord, TokenStatus,
};
use crate::error::RadarError;

#[derive(Debug, Default)]
struct Tables {
    tokens: HashMap<Mint, TokenRecord>,
    swaps: HashMap<String, NormalizedSwap>,
    pools: HashMap<String, NormalizedPoolCreation>,
    holders: HashMap<Mint, Vec<HolderSnapshot>>,
    metrics: HashMap<Mint, Vec<MetricsSnapshot>>,
    scores: HashMap<Mint, Vec<ScoreResult>>,
    alerts: HashMap<Mint, AlertState>,
    raw_events: Vec<RawEvent>,
}

impl Tables {
    fn last_swap_at(&self, mint: &Mint) -> Option<DateTime<Utc>> {
        self.swaps
            .values()
            .filter(|s| &s.token_mint == mint)
            .map(|s| s.timestamp)
            .max()
    }
}

/// Storage backed by in-process maps.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    tables: RwLock<Tables>,
}

impl InMemoryStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored swaps.
    pub async fn swap_count(&self) -> usize {
        self.tables.read().await.swaps.len()
    }

    /// Number of stored tokens.
    pub async fn token_count(&self) -> usize {
        self.tables.read().await.tokens.len()
    }

    /// Number of stored raw events.
    pub async fn raw_event_count(&self) -> usize {
        self.tables.read().await.raw_events.len()
    }

    /// All score results recorded for a token, oldest first.
    pub async fn score_history(&self, mint: &Mint) -> Vec<ScoreResult> {
        self.tables
            .read()
            .await
            .scores
            .get(mint)
            .cloned()
            .unwrap_or_default()
    }

    /// Overrides a token's lifecycle status.
    pub async fn set_token_status(&self, mint: &Mint, status: TokenStatus) {
        if let Some(token) = self.tables.write().await.tokens.get_mut(mint) {
            token.status = status;
        }
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn upsert_token(&self, mint: &Mint, seen_at: DateTime<Utc>) -> Result<bool, RadarError> {
        let mut tables = self.tables.write().await;
        if tables.tokens.contains_key(mint) {
            return Ok(false);
        }
        tables
            .tokens
            .insert(mint.clone(), TokenRecord::first_seen(mint.clone(), seen_at));
        Ok(true)
    }

    async fn get_token(&self, mint: &Mint) -> Result<Option<TokenRecord>, RadarError> {
        Ok(self.tables.read().await.tokens.get(mint).cloned())
    }

    async fn get_tokens_to_enrich(
        &self,
        batch_size: u32,
        stale_after: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<TokenRecord>, RadarError> {
        let stale = chrono::Duration::from_std(stale_after).unwrap_or(chrono::Duration::zero());
        let cutoff = now - stale;
        let tables = self.tables.read().await;
        let mut due: Vec<TokenRecord> = tables
            .tokens
            .values()
            .filter(|t| t.status == TokenStatus::Active)
            .filter(|t| t.last_enriched_at.is_none_or(|at| at < cutoff))
            .cloned()
            .collect();
        // `None` sorts before `Some`, so never-enriched tokens come first.
        due.sort_by(|a, b| {
            a.last_enriched_at
                .cmp(&b.last_enriched_at)
                .then(b.first_seen_at.cmp(&a.first_seen_at))
        });
        due.truncate(batch_size as usize);
        Ok(due)
    }

    async fn update_token_enrichment(
        &self,
        mint: &Mint,
        enrichment: &TokenEnrichment,
    ) -> Result<(), RadarError> {
        let mut tables = self.tables.write().await;
        if let Some(token) = tables.tokens.get_mut(mint) {
            token.apply_enrichment(enrichment);
        }
        Ok(())
    }

    async fn get_active_tokens(&self, batch_size: u32) -> Result<Vec<TokenRecord>, RadarError> {
        let tables = self.tables.read().await;
        let mut active: Vec<(Option<DateTime<Utc>>, TokenRecord)> = tables
            .tokens
            .values()
            .filter(|t| t.status == TokenStatus::Active)
            .map(|t| (tables.last_swap_at(&t.mint), t.clone()))
            .collect();
        // Most recent activity first; tokens with no swaps last.
        active.sort_by(|(a_at, a), (b_at, b)| {
            b_at.cmp(a_at)
                .then(b.first_seen_at.cmp(&a.first_seen_at))
                .then(a.mint.cmp(&b.mint))
        });
        active.truncate(batch_size as usize);
        Ok(active.into_iter().map(|(_, t)| t).collect())
    }

    async fn upsert_pool(&self, pool: &NormalizedPoolCreation) -> Result<bool, RadarError> {
        let key = pool_key(pool);
        let mut tables = self.tables.write().await;
        if tables.pools.contains_key(&key) {
            return Ok(false);
        }
        tables.pools.insert(key, pool.clone());
        Ok(true)
    }

    async fn get_pools_for_token(
        &self,
        mint: &Mint,
    ) -> Result<Vec<NormalizedPoolCreation>, RadarError> {
        let tables = self.tables.read().await;
        let mut pools: Vec<NormalizedPoolCreation> = tables
            .pools
            .values()
            .filter(|p| &p.token_mint == mint)
            .cloned()
            .collect();
        pools.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pools)
    }

    async fn insert_swap(&self, swap: &NormalizedSwap) -> Result<bool, RadarError> {
        let mut tables = self.tables.write().await;
        if tables.swaps.contains_key(&swap.signature) {
            return Ok(false);
        }
        tables.swaps.insert(swap.signature.clone(), swap.clone());
        Ok(true)
    }

    async fn get_swap_metrics(
        &self,
        mint: &Mint,
        since: DateTime<Utc>,
    ) -> Result<Vec<NormalizedSwap>, RadarError> {
        let tables = self.tables.read().await;
        let mut swaps: Vec<NormalizedSwap> = tables
            .swaps
            .values()
            .filter(|s| &s.token_mint == mint && s.timestamp >= since)
            .cloned()
            .collect();
        swaps.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then(a.signature.cmp(&b.signature))
        });
        Ok(swaps)
    }

    async fn insert_holder_snapshot(&self, snapshot: &HolderSnapshot) -> Result<(), RadarError> {
        self.tables
            .write()
            .await
            .holders
            .entry(snapshot.mint.clone())
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }

    async fn get_latest_holder_snapshot(
        &self,
        mint: &Mint,
    ) -> Result<Option<HolderSnapshot>, RadarError> {
        let tables = self.tables.read().await;
        Ok(tables
            .holders
            .get(mint)
            .and_then(|all| all.iter().max_by_key(|h| h.captured_at))
            .cloned())
    }

    async fn insert_token_metrics(&self, metrics: &MetricsSnapshot) -> Result<(), RadarError> {
        self.tables
            .write()
            .await
            .metrics
            .entry(metrics.mint.clone())
            .or_default()
            .push(metrics.clone());
        Ok(())
    }

    async fn get_latest_token_metrics(
        &self,
        mint: &Mint,
    ) -> Result<Option<MetricsSnapshot>, RadarError> {
        let tables = self.tables.read().await;
        Ok(tables
            .metrics
            .get(mint)
            .and_then(|all| all.iter().max_by_key(|m| m.computed_at))
            .cloned())
    }

    async fn insert_score(&self, score: &ScoreResult) -> Result<(), RadarError> {
        self.tables
            .write()
            .await
            .scores
            .entry(score.mint.clone())
            .or_default()
            .push(score.clone());
        Ok(())
    }

    async fn get_latest_score(&self, mint: &Mint) -> Result<Option<ScoreResult>, RadarError> {
        let tables = self.tables.read().await;
        Ok(tables.scores.get(mint).and_then(|all| all.last()).cloned())
    }

    async fn get_or_create_alert(&self, mint: &Mint) -> Result<AlertState, RadarError> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .alerts
            .entry(mint.clone())
            .or_insert_with(|| AlertState::unalerted(mint.clone()))
            .clone())
    }

    async fn update_alert(&self, state: &AlertState) -> Result<(), RadarError> {
        self.tables
            .write()
            .await
            .alerts
            .insert(state.mint.clone(), state.clone());
        Ok(())
    }

    async fn store_raw_event(&self, event: &RawEvent) -> Result<(), RadarError> {
        self.tables.write().await.raw_events.push(event.clone());
        Ok(())
    }
}
