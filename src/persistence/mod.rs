//! Persistence layer: the storage capability set the pipeline calls.
//!
//! [`Storage`] is implementation-agnostic. Writes keyed by natural ids
//! (swap signature, pool key, token mint) are idempotent upserts, so
//! at-least-once reprocessing after a restart or across processes is
//! absorbed here rather than by the in-memory dedup cache.
//!
//! Two implementations ship with the crate: [`postgres::PostgresStorage`]
//! for production and [`memory::InMemoryStorage`] for tests and local runs.

pub mod memory;
pub mod models;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    AlertState, HolderSnapshot, MetricsSnapshot, Mint, NormalizedPoolCreation, NormalizedSwap,
    RawEvent, ScoreResult, TokenEnrichment, TokenRecord,
};
use crate::error::RadarError;

pub use memory::InMemoryStorage;
pub use postgres::PostgresStorage;

/// Storage collaborator used by ingestion, enrichment and scoring.
#[async_trait]
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Inserts the token if absent. Returns `true` when a row was created.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::PersistenceError`] on storage failure.
    async fn upsert_token(&self, mint: &Mint, seen_at: DateTime<Utc>) -> Result<bool, RadarError>;

    /// Loads one token.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::PersistenceError`] on storage failure.
    async fn get_token(&self, mint: &Mint) -> Result<Option<TokenRecord>, RadarError>;

    /// Active tokens never enriched or enriched longer than `stale_after`
    /// before `now`, never-enriched first.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::PersistenceError`] on storage failure.
    async fn get_tokens_to_enrich(
        &self,
        batch_size: u32,
        stale_after: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<TokenRecord>, RadarError>;

    /// Persists the result of an enrichment pass.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::PersistenceError`] on storage failure.
    async fn update_token_enrichment(
        &self,
        mint: &Mint,
        enrichment: &TokenEnrichment,
    ) -> Result<(), RadarError>;

    /// Active tokens ordered by most recent swap activity.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::PersistenceError`] on storage failure.
    async fn get_active_tokens(&self, batch_size: u32) -> Result<Vec<TokenRecord>, RadarError>;

    /// Inserts a pool if its key is new. Returns `true` when inserted.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::PersistenceError`] on storage failure.
    async fn upsert_pool(&self, pool: &NormalizedPoolCreation) -> Result<bool, RadarError>;

    /// Pools for a token, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::PersistenceError`] on storage failure.
    async fn get_pools_for_token(
        &self,
        mint: &Mint,
    ) -> Result<Vec<NormalizedPoolCreation>, RadarError>;

    /// Inserts a swap unique on signature. A duplicate is a no-op that
    /// returns `false`.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::PersistenceError`] on storage failure.
    async fn insert_swap(&self, swap: &NormalizedSwap) -> Result<bool, RadarError>;

    /// Swaps for a token at or after `since`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::PersistenceError`] on storage failure.
    async fn get_swap_metrics(
        &self,
        mint: &Mint,
        since: DateTime<Utc>,
    ) -> Result<Vec<NormalizedSwap>, RadarError>;

    /// Appends a holder snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::PersistenceError`] on storage failure.
    async fn insert_holder_snapshot(&self, snapshot: &HolderSnapshot) -> Result<(), RadarError>;

    /// Most recent holder snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::PersistenceError`] on storage failure.
    async fn get_latest_holder_snapshot(
        &self,
        mint: &Mint,
    ) -> Result<Option<HolderSnapshot>, RadarError>;

    /// Appends a metrics snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::PersistenceError`] on storage failure.
    async fn insert_token_metrics(&self, metrics: &MetricsSnapshot) -> Result<(), RadarError>;

    /// Most recent metrics snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::PersistenceError`] on storage failure.
    async fn get_latest_token_metrics(
        &self,
        mint: &Mint,
    ) -> Result<Option<MetricsSnapshot>, RadarError>;

    /// Appends a score result.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::PersistenceError`] on storage failure.
    async fn insert_score(&self, score: &ScoreResult) -> Result<(), RadarError>;

    /// Most recent score result.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::PersistenceError`] on storage failure.
    async fn get_latest_score(&self, mint: &Mint) -> Result<Option<ScoreResult>, RadarError>;

    /// Loads the alert row, creating an unalerted one if absent.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::PersistenceError`] on storage failure.
    async fn get_or_create_alert(&self, mint: &Mint) -> Result<AlertState, RadarError>;

    /// Replaces the alert row in one write.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::PersistenceError`] on storage failure.
    async fn update_alert(&self, state: &AlertState) -> Result<(), RadarError>;

    /// Stores a raw record for audit. Callers treat failures as best-effort.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::PersistenceError`] on storage failure.
    async fn store_raw_event(&self, event: &RawEvent) -> Result<(), RadarError>;
}

/// Natural key of a pool: its address, else the creating signature, else
/// `dex:mint`.
#[must_use]
pub fn pool_key(pool: &NormalizedPoolCreation) -> String {
    pool.pool_address
        .clone()
        .or_else(|| pool.signature.clone())
        .unwrap_or_else(|| format!("{}:{}", pool.dex, pool.token_mint))
}
