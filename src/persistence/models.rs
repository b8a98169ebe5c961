//! Database row shapes and their conversion to domain types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::domain::{
    AlertState, HolderSnapshot, MessageHandle, Mint, NormalizedPoolCreation, NormalizedSwap,
    Provenance, RiskFlag, Side, TokenRecord, TokenStatus,
};

/// A row of the `tokens` table.
pub type TokenRow = (
    String,
    String,
    Option<String>,
    Option<String>,
    Option<i16>,
    Option<f64>,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    serde_json::Value,
);

/// Column list matching [`TokenRow`].
pub const TOKEN_COLUMNS: &str = "mint, status, name, symbol, decimals, supply, mint_authority, \
     freeze_authority, first_seen_at, last_enriched_at, enrichment_errors";

/// Converts a `tokens` row.
#[must_use]
pub fn token_from_row(row: TokenRow) -> TokenRecord {
    let (
        mint,
        status,
        name,
        symbol,
        decimals,
        supply,
        mint_authority,
        freeze_authority,
        first_seen_at,
        last_enriched_at,
        errors,
    ) = row;
    TokenRecord {
        mint: Mint::from(mint),
        status: TokenStatus::parse(&status),
        name,
        symbol,
        decimals: decimals.and_then(|d| u8::try_from(d).ok()),
        supply,
        mint_authority,
        freeze_authority,
        first_seen_at,
        last_enriched_at,
        enrichment_errors: serde_json::from_value(errors).unwrap_or_default(),
    }
}

/// A row of the `swaps` table.
pub type SwapRow = (
    String,
    String,
    DateTime<Utc>,
    String,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
);

/// Column list matching [`SwapRow`].
pub const SWAP_COLUMNS: &str = "token_mint, signature, ts, side, amount_usd, amount_token, \
     amount_sol, buyer, seller, pool_address, dex, provenance";

/// Converts a `swaps` row.
#[must_use]
pub fn swap_from_row(row: SwapRow) -> NormalizedSwap {
    let (
        token_mint,
        signature,
        timestamp,
        side,
        amount_usd,
        amount_token,
        amount_sol,
        buyer,
        seller,
        pool_address,
        dex,
        provenance,
    ) = row;
    NormalizedSwap {
        token_mint: Mint::from(token_mint),
        signature,
        timestamp,
        side: Side::parse(&side),
        amount_usd,
        amount_token,
        amount_sol,
        buyer,
        seller,
        pool_address,
        dex,
        provenance: Provenance::parse(&provenance),
    }
}

/// A row of the `pools` table.
pub type PoolRow = (
    String,
    Option<String>,
    String,
    String,
    Option<String>,
    DateTime<Utc>,
    Option<String>,
    Option<f64>,
    Option<f64>,
);

/// Column list matching [`PoolRow`].
pub const POOL_COLUMNS: &str = "token_mint, pool_address, dex, base_mint, quote_mint, \
     created_at, signature, initial_liquidity_usd, initial_liquidity_sol";

/// Converts a `pools` row.
#[must_use]
pub fn pool_from_row(row: PoolRow) -> NormalizedPoolCreation {
    let (
        token_mint,
        pool_address,
        dex,
        base_mint,
        quote_mint,
        created_at,
        signature,
        initial_liquidity_usd,
        initial_liquidity_sol,
    ) = row;
    NormalizedPoolCreation {
        token_mint: Mint::from(token_mint),
        pool_address,
        dex,
        base_mint: Mint::from(base_mint),
        quote_mint: quote_mint.map(Mint::from),
        created_at,
        signature,
        initial_liquidity_usd,
        initial_liquidity_sol,
    }
}

/// A row of the `holder_snapshots` table.
pub type HolderRow = (String, i64, f64, f64, f64, f64, DateTime<Utc>);

/// Converts a `holder_snapshots` row.
#[must_use]
pub fn holder_from_row(row: HolderRow) -> HolderSnapshot {
    let (mint, holder_count, top1_pct, top5_pct, top10_pct, top20_pct, captured_at) = row;
    HolderSnapshot {
        mint: Mint::from(mint),
        holder_count: u64::try_from(holder_count).unwrap_or(0),
        top1_pct,
        top5_pct,
        top10_pct,
        top20_pct,
        captured_at,
    }
}

/// A row of the `alerts` table.
pub type AlertRow = (
    String,
    Option<i16>,
    Option<DateTime<Utc>>,
    Option<String>,
    i32,
    serde_json::Value,
);

/// Converts an `alerts` row. Unknown stored flag codes are dropped.
#[must_use]
pub fn alert_from_row(row: AlertRow) -> AlertState {
    let (mint, last_score, last_sent_at, message_handle, alert_count, flags) = row;
    let codes: Vec<String> = serde_json::from_value(flags).unwrap_or_default();
    AlertState {
        mint: Mint::from(mint),
        last_score: last_score.and_then(|s| u8::try_from(s).ok()),
        last_sent_at,
        message_handle: message_handle.map(MessageHandle::new),
        alert_count: u32::try_from(alert_count).unwrap_or(0),
        last_risk_flags: codes
            .iter()
            .filter_map(|c| RiskFlag::parse(c))
            .collect::<BTreeSet<_>>(),
    }
}

/// Encodes a flag set as a JSON array of codes.
#[must_use]
pub fn flags_to_json(flags: &BTreeSet<RiskFlag>) -> serde_json::Value {
    serde_json::Value::Array(
        flags
            .iter()
            .map(|f| serde_json::Value::String(f.as_str().to_string()))
            .collect(),
    )
}
