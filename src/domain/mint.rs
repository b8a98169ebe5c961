//! Type-safe token mint identifier and the quote-asset set.
//!
//! [`Mint`] is a newtype wrapper around the base58 mint address so that
//! mints cannot be confused with wallet addresses or signatures.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Wrapped SOL, the native coin's token-program representation.
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// USD Coin.
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// Tether USD.
pub const USDT_MINT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";

/// Stable-value quote assets whose amounts are already denominated in USD.
pub const STABLE_MINTS: [&str; 2] = [USDC_MINT, USDT_MINT];

/// Unique identifier of a fungible token type.
///
/// Used as the key for token records, swaps, pools, metrics and alert
/// state. Quote assets (native coin and stablecoins) are representable
/// but never become the subject of a swap or pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mint(String);

impl Mint {
    /// Creates a `Mint` from an address string.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the native coin (wrapped SOL).
    #[must_use]
    pub fn is_native(&self) -> bool {
        self.0 == WSOL_MINT
    }

    /// Returns `true` for members of the fixed stablecoin set.
    #[must_use]
    pub fn is_stable(&self) -> bool {
        STABLE_MINTS.contains(&self.0.as_str())
    }

    /// Returns `true` if this mint is a quote asset: the counter-leg of a
    /// trade, never the scored subject.
    #[must_use]
    pub fn is_quote_asset(&self) -> bool {
        self.is_native() || self.is_stable()
    }
}

impl fmt::Display for Mint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Mint {
    fn from(address: &str) -> Self {
        Self(address.to_string())
    }
}

impl From<String> for Mint {
    fn from(address: String) -> Self {
        Self(address)
    }
}

impl AsRef<str> for Mint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
