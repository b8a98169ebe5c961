//! PostgreSQL implementation of the storage collaborator.
//!
//! Natural-key inserts use `ON CONFLICT DO NOTHING`, so duplicate
//! deliveries are silent no-ops rather than errors.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::models::{
    AlertRow, HolderRow, POOL_COLUMNS, PoolRow, SWAP_COLUMNS, SwapRow, TOKEN_COLUMNS, TokenRow,
    alert_from_row, flags_to_json, holder_from_row, pool_from_row, swap_from_row, token_from_row,
};
use super::{Storage, pool_key};
use crate::domain::{
    AlertState, HolderSnapshot, MetricsSnapshot, Mint, NormalizedPoolCreation, NormalizedSwap,
    RawEvent, ScoreResult, TokenEnrichment, TokenRecord,
};
use crate::error::RadarError;

/// PostgreSQL-backed storage using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Creates a storage layer over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects, verifies the connection and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::PersistenceError`] if the database cannot be
    /// reached or a migration fails.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, RadarError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| RadarError::PersistenceError(format!("migration failed: {e}")))?;

        Ok(Self::new(pool))
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, RadarError> {
    serde_json::to_value(value).map_err(|e| RadarError::Internal(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, RadarError> {
    serde_json::from_value(value)
        .map_err(|e| RadarError::PersistenceError(format!("corrupt stored json: {e}")))
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn upsert_token(&self, mint: &Mint, seen_at: DateTime<Utc>) -> Result<bool, RadarError> {
        let result = sqlx::query(
            "INSERT INTO tokens (mint, status, first_seen_at, enrichment_errors) \
             VALUES ($1, 'active', $2, '[]'::jsonb) ON CONFLICT (mint) DO NOTHING",
        )
        .bind(mint.as_str())
        .bind(seen_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_token(&self, mint: &Mint) -> Result<Option<TokenRecord>, RadarError> {
        let row = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE mint = $1"
        ))
        .bind(mint.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(token_from_row))
    }

    async fn get_tokens_to_enrich(
        &self,
        batch_size: u32,
        stale_after: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<TokenRecord>, RadarError> {
        let stale = chrono::Duration::from_std(stale_after).unwrap_or(chrono::Duration::zero());
        let cutoff = now - stale;
        let rows = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens \
             WHERE status = 'active' AND (last_enriched_at IS NULL OR last_enriched_at < $1) \
             ORDER BY last_enriched_at ASC NULLS FIRST, first_seen_at DESC \
             LIMIT $2"
        ))
        .bind(cutoff)
        .bind(i64::from(batch_size))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(token_from_row).collect())
    }

    async fn update_token_enrichment(
        &self,
        mint: &Mint,
        enrichment: &TokenEnrichment,
    ) -> Result<(), RadarError> {
        let errors = to_json(&enrichment.errors)?;
        sqlx::query(
            "UPDATE tokens SET \
               name = COALESCE($2, name), \
               symbol = COALESCE($3, symbol), \
               decimals = CASE WHEN $4 THEN $5 ELSE decimals END, \
               supply = CASE WHEN $4 THEN $6 ELSE supply END, \
               mint_authority = CASE WHEN $4 THEN $7 ELSE mint_authority END, \
               freeze_authority = CASE WHEN $4 THEN $8 ELSE freeze_authority END, \
               last_enriched_at = $9, \
               enrichment_errors = $10 \
             WHERE mint = $1",
        )
        .bind(mint.as_str())
        .bind(enrichment.name.as_deref())
        .bind(enrichment.symbol.as_deref())
        .bind(enrichment.info_fetched)
        .bind(enrichment.decimals.map(i16::from))
        .bind(enrichment.supply)
        .bind(enrichment.mint_authority.as_deref())
        .bind(enrichment.freeze_authority.as_deref())
        .bind(enrichment.enriched_at)
        .bind(errors)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_active_tokens(&self, batch_size: u32) -> Result<Vec<TokenRecord>, RadarError> {
        let rows = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens t \
             WHERE t.status = 'active' \
             ORDER BY (SELECT MAX(s.ts) FROM swaps s WHERE s.token_mint = t.mint) DESC NULLS LAST, \
                      t.first_seen_at DESC \
             LIMIT $1"
        ))
        .bind(i64::from(batch_size))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(token_from_row).collect())
    }

    async fn upsert_pool(&self, pool: &NormalizedPoolCreation) -> Result<bool, RadarError> {
        let result = sqlx::query(
            "INSERT INTO pools (pool_key, token_mint, pool_address, dex, base_mint, quote_mint, \
               created_at, signature, initial_liquidity_usd, initial_liquidity_sol) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (pool_key) DO NOTHING",
        )
        .bind(pool_key(pool))
        .bind(pool.token_mint.as_str())
        .bind(pool.pool_address.as_deref())
        .bind(&pool.dex)
        .bind(pool.base_mint.as_str())
        .bind(pool.quote_mint.as_ref().map(Mint::as_str))
        .bind(pool.created_at)
        .bind(pool.signature.as_deref())
        .bind(pool.initial_liquidity_usd)
        .bind(pool.initial_liquidity_sol)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_pools_for_token(
        &self,
        mint: &Mint,
    ) -> Result<Vec<NormalizedPoolCreation>, RadarError> {
        let rows = sqlx::query_as::<_, PoolRow>(&format!(
            "SELECT {POOL_COLUMNS} FROM pools WHERE token_mint = $1 ORDER BY created_at DESC"
        ))
        .bind(mint.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(pool_from_row).collect())
    }

    async fn insert_swap(&self, swap: &NormalizedSwap) -> Result<bool, RadarError> {
        let result = sqlx::query(&format!(
            "INSERT INTO swaps ({SWAP_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (signature) DO NOTHING"
        ))
        .bind(swap.token_mint.as_str())
        .bind(&swap.signature)
        .bind(swap.timestamp)
        .bind(swap.side.as_str())
        .bind(swap.amount_usd)
        .bind(swap.amount_token)
        .bind(swap.amount_sol)
        .bind(swap.buyer.as_deref())
        .bind(swap.seller.as_deref())
        .bind(swap.pool_address.as_deref())
        .bind(swap.dex.as_deref())
        .bind(swap.provenance.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_swap_metrics(
        &self,
        mint: &Mint,
        since: DateTime<Utc>,
    ) -> Result<Vec<NormalizedSwap>, RadarError> {
        let rows = sqlx::query_as::<_, SwapRow>(&format!(
            "SELECT {SWAP_COLUMNS} FROM swaps WHERE token_mint = $1 AND ts >= $2 ORDER BY ts DESC"
        ))
        .bind(mint.as_str())
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(swap_from_row).collect())
    }

    async fn insert_holder_snapshot(&self, snapshot: &HolderSnapshot) -> Result<(), RadarError> {
        sqlx::query(
            "INSERT INTO holder_snapshots (mint, holder_count, top1_pct, top5_pct, top10_pct, \
               top20_pct, captured_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(snapshot.mint.as_str())
        .bind(i64::try_from(snapshot.holder_count).unwrap_or(i64::MAX))
        .bind(snapshot.top1_pct)
        .bind(snapshot.top5_pct)
        .bind(snapshot.top10_pct)
        .bind(snapshot.top20_pct)
        .bind(snapshot.captured_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_latest_holder_snapshot(
        &self,
        mint: &Mint,
    ) -> Result<Option<HolderSnapshot>, RadarError> {
        let row = sqlx::query_as::<_, HolderRow>(
            "SELECT mint, holder_count, top1_pct, top5_pct, top10_pct, top20_pct, captured_at \
             FROM holder_snapshots WHERE mint = $1 ORDER BY captured_at DESC LIMIT 1",
        )
        .bind(mint.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(holder_from_row))
    }

    async fn insert_token_metrics(&self, metrics: &MetricsSnapshot) -> Result<(), RadarError> {
        sqlx::query(
            "INSERT INTO token_metrics (mint, computed_at, snapshot) VALUES ($1, $2, $3)",
        )
        .bind(metrics.mint.as_str())
        .bind(metrics.computed_at)
        .bind(to_json(metrics)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_latest_token_metrics(
        &self,
        mint: &Mint,
    ) -> Result<Option<MetricsSnapshot>, RadarError> {
        let value = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT snapshot FROM token_metrics WHERE mint = $1 ORDER BY computed_at DESC LIMIT 1",
        )
        .bind(mint.as_str())
        .fetch_optional(&self.pool)
        .await?;
        value.map(from_json).transpose()
    }

    async fn insert_score(&self, score: &ScoreResult) -> Result<(), RadarError> {
        sqlx::query(
            "INSERT INTO scores (mint, score, risk_flags, computed_at, result) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(score.mint.as_str())
        .bind(i16::from(score.score))
        .bind(flags_to_json(&score.risk_flags))
        .bind(score.computed_at)
        .bind(to_json(score)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_latest_score(&self, mint: &Mint) -> Result<Option<ScoreResult>, RadarError> {
        let value = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT result FROM scores WHERE mint = $1 ORDER BY computed_at DESC, id DESC LIMIT 1",
        )
        .bind(mint.as_str())
        .fetch_optional(&self.pool)
        .await?;
        value.map(from_json).transpose()
    }

    async fn get_or_create_alert(&self, mint: &Mint) -> Result<AlertState, RadarError> {
        sqlx::query(
            "INSERT INTO alerts (mint, alert_count, last_risk_flags) VALUES ($1, 0, '[]'::jsonb) \
             ON CONFLICT (mint) DO NOTHING",
        )
        .bind(mint.as_str())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, AlertRow>(
            "SELECT mint, last_score, last_sent_at, message_handle, alert_count, last_risk_flags \
             FROM alerts WHERE mint = $1",
        )
        .bind(mint.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(alert_from_row(row))
    }

    async fn update_alert(&self, state: &AlertState) -> Result<(), RadarError> {
        sqlx::query(
            "INSERT INTO alerts (mint, last_score, last_sent_at, message_handle, alert_count, \
               last_risk_flags) VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (mint) DO UPDATE SET \
               last_score = EXCLUDED.last_score, \
               last_sent_at = EXCLUDED.last_sent_at, \
               message_handle = EXCLUDED.message_handle, \
               alert_count = EXCLUDED.alert_count, \
               last_risk_flags = EXCLUDED.last_risk_flags",
        )
        .bind(state.mint.as_str())
        .bind(state.last_score.map(i16::from))
        .bind(state.last_sent_at)
        .bind(state.message_handle.as_ref().map(|h| h.as_str()))
        .bind(i32::try_from(state.alert_count).unwrap_or(i32::MAX))
        .bind(flags_to_json(&state.last_risk_flags))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn store_raw_event(&self, event: &RawEvent) -> Result<(), RadarError> {
        sqlx::query("INSERT INTO raw_events (signature, payload) VALUES ($1, $2)")
            .bind(event.signature.as_deref())
            .bind(to_json(event)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
