//! Canonical records produced by the event normalizer.
//!
//! Each raw event yields at most one [`NormalizedEvent`]. Swap and pool
//! records are persisted by the storage collaborator under unique keys
//! (signature for swaps, pool address or signature for pools).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Mint;

/// Direction of a swap relative to the subject token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The fee payer received the subject token.
    Buy,
    /// The fee payer sent the subject token.
    Sell,
    /// The fee payer was neither party of the subject-token leg.
    Unknown,
}

impl Side {
    /// Returns the side as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Unknown => "unknown",
        }
    }

    /// Parses a stored side string; anything unrecognized is `Unknown`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "buy" => Self::Buy,
            "sell" => Self::Sell,
            _ => Self::Unknown,
        }
    }
}

/// Which classification rule recognized the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Upstream-declared type field.
    DeclaredType,
    /// Upstream source name matched a known DEX.
    SourceName,
    /// An instruction program id matched the DEX registry.
    ProgramRegistry,
    /// Only token transfers were present.
    TransferFallback,
}

impl Provenance {
    /// Returns the provenance as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DeclaredType => "declared_type",
            Self::SourceName => "source_name",
            Self::ProgramRegistry => "program_registry",
            Self::TransferFallback => "transfer_fallback",
        }
    }

    /// Parses a stored provenance string, defaulting to `DeclaredType`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "source_name" => Self::SourceName,
            "program_registry" => Self::ProgramRegistry,
            "transfer_fallback" => Self::TransferFallback,
            _ => Self::DeclaredType,
        }
    }
}

/// A swap of a subject token against a quote asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSwap {
    /// Subject token. Never a quote asset.
    pub token_mint: Mint,
    /// Transaction signature (unique).
    pub signature: String,
    /// Block time.
    pub timestamp: DateTime<Utc>,
    /// Trade direction.
    pub side: Side,
    /// Trade size in USD, when derivable.
    pub amount_usd: Option<f64>,
    /// Subject-token amount.
    pub amount_token: Option<f64>,
    /// Native-coin amount of the quote leg.
    pub amount_sol: Option<f64>,
    /// Buying wallet (fee payer on buys).
    pub buyer: Option<String>,
    /// Selling wallet (fee payer on sells).
    pub seller: Option<String>,
    /// Pool the swap went through, when known.
    pub pool_address: Option<String>,
    /// DEX label, when known.
    pub dex: Option<String>,
    /// Classification rule that produced this record.
    pub provenance: Provenance,
}

impl NormalizedSwap {
    /// USD price of one subject token implied by this swap.
    #[must_use]
    pub fn unit_price_usd(&self) -> Option<f64> {
        match (self.amount_usd, self.amount_token) {
            (Some(usd), Some(tokens)) if usd > 0.0 && tokens > 0.0 => Some(usd / tokens),
            _ => None,
        }
    }
}

/// A liquidity pool creation for a subject token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoolCreation {
    /// Subject (base) token.
    pub token_mint: Mint,
    /// Provisional pool address (first account of the DEX instruction).
    pub pool_address: Option<String>,
    /// DEX label.
    pub dex: String,
    /// Base mint; equals `token_mint`.
    pub base_mint: Mint,
    /// Quote mint, when a quote-asset leg was present.
    pub quote_mint: Option<Mint>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Signature of the creating transaction.
    pub signature: Option<String>,
    /// Estimated initial liquidity in USD (both sides of the deposit).
    pub initial_liquidity_usd: Option<f64>,
    /// Estimated initial liquidity in native units (both sides).
    pub initial_liquidity_sol: Option<f64>,
}

/// A token seen in a generic transfer, not attributable to a trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSighting {
    /// Observed token.
    pub token_mint: Mint,
    /// Signature of the observing transaction, when present.
    pub signature: Option<String>,
    /// Observation time.
    pub seen_at: DateTime<Utc>,
}

/// Output of normalizing one raw event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizedEvent {
    /// A token-vs-quote trade.
    Swap(NormalizedSwap),
    /// A pool creation.
    PoolCreation(NormalizedPoolCreation),
    /// A token observed in a transfer.
    TokenSighting(TokenSighting),
    /// Nothing usable could be extracted.
    Unrecognized,
}

impl NormalizedEvent {
    /// Returns the subject mint, if any.
    #[must_use]
    pub fn token_mint(&self) -> Option<&Mint> {
        match self {
            Self::Swap(swap) => Some(&swap.token_mint),
            Self::PoolCreation(pool) => Some(&pool.token_mint),
            Self::TokenSighting(sighting) => Some(&sighting.token_mint),
            Self::Unrecognized => None,
        }
    }

    /// Returns the event kind as a static string slice.
    #[must_use]
    pub const fn kind_str(&self) -> &'static str {
        match self {
            Self::Swap(_) => "swap",
            Self::PoolCreation(_) => "pool_creation",
            Self::TokenSighting(_) => "token_sighting",
            Self::Unrecognized => "unrecognized",
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn make_swap() -> NormalizedSwap {
        NormalizedSwap {
            token_mint: Mint::from("MintA"),
            signature: "sig".to_string(),
            timestamp: Utc::now(),
            side: Side::Buy,
            amount_usd: Some(300.0),
            amount_token: Some(1_000.0),
            amount_sol: Some(2.0),
            buyer: Some("Wallet".to_string()),
            seller: None,
            pool_address: None,
            dex: Some("raydium".to_string()),
            provenance: Provenance::DeclaredType,
        }
    }

    #[test]
    fn unit_price_requires_both_amounts() {
        let mut swap = make_swap();
        assert_eq!(swap.unit_price_usd(), Some(0.3));
        swap.amount_token = None;
        assert_eq!(swap.unit_price_usd(), None);
    }

    #[test]
    fn swap_event_serializes_with_kind_tag() {
        let event = NormalizedEvent::Swap(make_swap());
        let Ok(json) = serde_json::to_string(&event) else {
            panic!("serialization failed");
        };
        assert!(json.contains("\"kind\":\"swap\""));
        assert!(json.contains("\"side\":\"buy\""));
    }

    #[test]
    fn side_and_provenance_parse_round_trip() {
        for side in [Side::Buy, Side::Sell, Side::Unknown] {
            assert_eq!(Side::parse(side.as_str()), side);
        }
        for p in [
            Provenance::DeclaredType,
            Provenance::SourceName,
            Provenance::ProgramRegistry,
            Provenance::TransferFallback,
        ] {
            assert_eq!(Provenance::parse(p.as_str()), p);
        }
    }

    #[test]
    fn unrecognized_has_no_mint() {
        assert!(NormalizedEvent::Unrecognized.token_mint().is_none());
        assert_eq!(NormalizedEvent::Unrecognized.kind_str(), "unrecognized");
    }
}
