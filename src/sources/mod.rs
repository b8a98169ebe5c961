//! Enrichment source collaborator: token metadata, mint info and holders.
//!
//! [`EnrichmentSource`] is the seam the enrichment job calls. The
//! production implementation is [`helius::HeliusSource`]; callers wrap
//! each fetch in [`retry::RetryPolicy`].

pub mod helius;
pub mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::Mint;
use crate::error::FetchError;

pub use helius::HeliusSource;
pub use retry::RetryPolicy;

/// Display metadata for a token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    /// Display name.
    pub name: Option<String>,
    /// Ticker symbol.
    pub symbol: Option<String>,
}

/// On-chain mint account facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Decimal places.
    pub decimals: u8,
    /// Total supply in UI units.
    pub supply: f64,
    /// Mint authority, `None` when revoked.
    pub mint_authority: Option<String>,
    /// Freeze authority, `None` when revoked.
    pub freeze_authority: Option<String>,
}

/// A ranked sample of the largest holder accounts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HolderPage {
    /// UI balances, largest first.
    pub balances: Vec<f64>,
    /// Holder count reported by the source, when it provides one.
    pub total: Option<u64>,
}

/// External source of token facts.
#[async_trait]
pub trait EnrichmentSource: Send + Sync + std::fmt::Debug {
    /// Fetches name and symbol.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] classified for retry.
    async fn fetch_token_metadata(&self, mint: &Mint) -> Result<TokenMetadata, FetchError>;

    /// Fetches authorities, decimals and supply.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] classified for retry.
    async fn fetch_token_info(&self, mint: &Mint) -> Result<TokenInfo, FetchError>;

    /// Fetches up to `limit` of the largest holder accounts.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] classified for retry.
    async fn fetch_token_holders(&self, mint: &Mint, limit: u32)
    -> Result<HolderPage, FetchError>;
}

/// Source used when no API key is configured. Every call is a client
/// error, so enrichment records the gap without retrying.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredSource;

impl UnconfiguredSource {
    fn error() -> FetchError {
        FetchError::Client {
            status: 0,
            message: "enrichment source not configured".to_string(),
        }
    }
}

#[async_trait]
impl EnrichmentSource for UnconfiguredSource {
    async fn fetch_token_metadata(&self, _mint: &Mint) -> Result<TokenMetadata, FetchError> {
        Err(Self::error())
    }

    async fn fetch_token_info(&self, _mint: &Mint) -> Result<TokenInfo, FetchError> {
        Err(Self::error())
    }

    async fn fetch_token_holders(
        &self,
        _mint: &Mint,
        _limit: u32,
    ) -> Result<HolderPage, FetchError> {
        Err(Self::error())
    }
}
