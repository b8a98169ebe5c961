//! Long-lived token entity and its enrichment fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Mint;

/// Lifecycle status of a tracked token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    /// Enriched and scored on every cycle.
    Active,
    /// Excluded by an operator.
    Ignored,
    /// No longer trading.
    Dead,
    /// Confirmed malicious.
    Scam,
}

impl TokenStatus {
    /// Returns the status as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Ignored => "ignored",
            Self::Dead => "dead",
            Self::Scam => "scam",
        }
    }

    /// Parses a stored status string; unknown values map to `Active`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "ignored" => Self::Ignored,
            "dead" => Self::Dead,
            "scam" => Self::Scam,
            _ => Self::Active,
        }
    }
}

/// A tracked token keyed by mint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Token mint.
    pub mint: Mint,
    /// Lifecycle status.
    pub status: TokenStatus,
    /// Display name from metadata.
    pub name: Option<String>,
    /// Ticker symbol from metadata.
    pub symbol: Option<String>,
    /// Decimal places.
    pub decimals: Option<u8>,
    /// Total supply in UI units.
    pub supply: Option<f64>,
    /// Mint authority, if not revoked.
    pub mint_authority: Option<String>,
    /// Freeze authority, if not revoked.
    pub freeze_authority: Option<String>,
    /// When the token was first observed.
    pub first_seen_at: DateTime<Utc>,
    /// When enrichment last ran.
    pub last_enriched_at: Option<DateTime<Utc>>,
    /// Partial-enrichment errors from the last run.
    pub enrichment_errors: Vec<String>,
}

impl TokenRecord {
    /// Creates a freshly observed, not yet enriched token.
    #[must_use]
    pub fn first_seen(mint: Mint, at: DateTime<Utc>) -> Self {
        Self {
            mint,
            status: TokenStatus::Active,
            name: None,
            symbol: None,
            decimals: None,
            supply: None,
            mint_authority: None,
            freeze_authority: None,
            first_seen_at: at,
            last_enriched_at: None,
            enrichment_errors: Vec::new(),
        }
    }

    /// Age of the token at `now`, in whole minutes (never negative).
    #[must_use]
    pub fn age_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.first_seen_at).num_minutes().max(0)
    }

    /// Copies enrichment results onto the record. Fields the fetch could
    /// not produce keep their previous values.
    pub fn apply_enrichment(&mut self, enrichment: &TokenEnrichment) {
        if enrichment.name.is_some() {
            self.name.clone_from(&enrichment.name);
        }
        if enrichment.symbol.is_some() {
            self.symbol.clone_from(&enrichment.symbol);
        }
        if enrichment.info_fetched {
            self.decimals = enrichment.decimals;
            self.supply = enrichment.supply;
            self.mint_authority.clone_from(&enrichment.mint_authority);
            self.freeze_authority.clone_from(&enrichment.freeze_authority);
        }
        self.last_enriched_at = Some(enrichment.enriched_at);
        self.enrichment_errors.clone_from(&enrichment.errors);
    }
}

/// Result of one enrichment pass for a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenEnrichment {
    /// Display name.
    pub name: Option<String>,
    /// Ticker symbol.
    pub symbol: Option<String>,
    /// Whether the mint account itself was fetched; authorities are only
    /// trusted when it was.
    pub info_fetched: bool,
    /// Decimal places.
    pub decimals: Option<u8>,
    /// Total supply in UI units.
    pub supply: Option<f64>,
    /// Mint authority.
    pub mint_authority: Option<String>,
    /// Freeze authority.
    pub freeze_authority: Option<String>,
    /// Per-fetch failures, e.g. `"holders: not found"`.
    pub errors: Vec<String>,
    /// When the pass completed.
    pub enriched_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_enrichment(info_fetched: bool) -> TokenEnrichment {
        TokenEnrichment {
            name: Some("Dog".to_string()),
            symbol: Some("DOG".to_string()),
            info_fetched,
            decimals: Some(6),
            supply: Some(1_000_000_000.0),
            mint_authority: None,
            freeze_authority: Some("Freezer".to_string()),
            errors: vec![],
            enriched_at: Utc::now(),
        }
    }

    #[test]
    fn status_parse_round_trip() {
        for status in [
            TokenStatus::Active,
            TokenStatus::Ignored,
            TokenStatus::Dead,
            TokenStatus::Scam,
        ] {
            assert_eq!(TokenStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn age_is_clamped_at_zero() {
        let now = Utc::now();
        let token = TokenRecord::first_seen(Mint::from("M"), now + Duration::minutes(5));
        assert_eq!(token.age_minutes(now), 0);
        let token = TokenRecord::first_seen(Mint::from("M"), now - Duration::minutes(12));
        assert_eq!(token.age_minutes(now), 12);
    }

    #[test]
    fn enrichment_without_info_keeps_authorities() {
        let mut token = TokenRecord::first_seen(Mint::from("M"), Utc::now());
        token.mint_authority = Some("Minter".to_string());
        token.apply_enrichment(&make_enrichment(false));
        assert_eq!(token.mint_authority.as_deref(), Some("Minter"));
        assert_eq!(token.symbol.as_deref(), Some("DOG"));
        assert!(token.last_enriched_at.is_some());
    }

    #[test]
    fn enrichment_with_info_replaces_authorities() {
        let mut token = TokenRecord::first_seen(Mint::from("M"), Utc::now());
        token.mint_authority = Some("Minter".to_string());
        token.apply_enrichment(&make_enrichment(true));
        assert_eq!(token.mint_authority, None);
        assert_eq!(token.freeze_authority.as_deref(), Some("Freezer"));
        assert_eq!(token.decimals, Some(6));
    }
}
