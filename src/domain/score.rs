//! Score results: numeric score, contributing reasons and risk flags.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Mint;

/// Non-scoring warning surfaced alongside the numeric score.
///
/// Ordered so that flag sets compare and render deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFlag {
    /// Mint authority present (only one authority held).
    MintAuthority,
    /// Freeze authority present (only one authority held).
    FreezeAuthority,
    /// Both mint and freeze authorities present.
    MintAndFreezeAuthority,
    /// Liquidity below the floor.
    LowLiquidity,
    /// Token younger than the minimum age.
    NewToken,
    /// Holder count below the floor.
    LowHolders,
    /// No 1-minute volume at all.
    NoVolume,
    /// Largest single holder above the whale floor.
    WhaleHolder,
    /// 5-minute price change below the dump floor.
    PriceDump,
}

impl RiskFlag {
    /// Authority flags gate the first alert unless the score is very high.
    #[must_use]
    pub const fn is_hard(&self) -> bool {
        matches!(
            self,
            Self::MintAuthority | Self::FreezeAuthority | Self::MintAndFreezeAuthority
        )
    }

    /// Returns the flag code as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MintAuthority => "mint_authority",
            Self::FreezeAuthority => "freeze_authority",
            Self::MintAndFreezeAuthority => "mint_and_freeze_authority",
            Self::LowLiquidity => "low_liquidity",
            Self::NewToken => "new_token",
            Self::LowHolders => "low_holders",
            Self::NoVolume => "no_volume",
            Self::WhaleHolder => "whale_holder",
            Self::PriceDump => "price_dump",
        }
    }

    /// Parses a stored flag code.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "mint_authority" => Self::MintAuthority,
            "freeze_authority" => Self::FreezeAuthority,
            "mint_and_freeze_authority" => Self::MintAndFreezeAuthority,
            "low_liquidity" => Self::LowLiquidity,
            "new_token" => Self::NewToken,
            "low_holders" => Self::LowHolders,
            "no_volume" => Self::NoVolume,
            "whale_holder" => Self::WhaleHolder,
            "price_dump" => Self::PriceDump,
            _ => return None,
        })
    }
}

impl fmt::Display for RiskFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scoring factor, listed in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreComponent {
    /// Pool liquidity in USD.
    Liquidity,
    /// Distinct buyers in the last minute.
    UniqueBuyers1m,
    /// Swaps in the last minute.
    Swaps1m,
    /// USD volume in the last minute.
    Volume1m,
    /// Holder count.
    Holders,
    /// Distinct buyers in the last five minutes.
    UniqueBuyers5m,
    /// Buy share of 1-minute volume.
    BuyPressure,
    /// Top-10 holder concentration penalty.
    Top10Concentration,
    /// Top-1 holder concentration penalty.
    Top1Concentration,
    /// Mint/freeze authority penalty.
    Authorities,
}

impl ScoreComponent {
    /// Returns the component code as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Liquidity => "liquidity",
            Self::UniqueBuyers1m => "unique_buyers_1m",
            Self::Swaps1m => "swaps_1m",
            Self::Volume1m => "volume_1m",
            Self::Holders => "holders",
            Self::UniqueBuyers5m => "unique_buyers_5m",
            Self::BuyPressure => "buy_pressure",
            Self::Top10Concentration => "top10_concentration",
            Self::Top1Concentration => "top1_concentration",
            Self::Authorities => "authorities",
        }
    }
}

/// One contributing reason: a component and the tier it landed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reason {
    /// Factor that produced the reason.
    pub component: ScoreComponent,
    /// Tier label (e.g. `"strong"`).
    pub tier: String,
    /// Signed contribution to the score.
    pub points: f64,
}

impl Reason {
    /// Stable reason code, `"<component>:<tier>"`.
    #[must_use]
    pub fn code(&self) -> String {
        format!("{}:{}", self.component.as_str(), self.tier)
    }
}

/// Per-factor breakdown entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentScore {
    /// Factor.
    pub component: ScoreComponent,
    /// Input value the factor was evaluated on, if present.
    pub value: Option<f64>,
    /// Signed contribution.
    pub points: f64,
}

/// Output of one scoring cycle for one token. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Scored token.
    pub mint: Mint,
    /// Final score in `[0, 100]`.
    pub score: u8,
    /// Reasons in evaluation order.
    pub reasons: Vec<Reason>,
    /// Non-scoring flags plus authority flags.
    pub risk_flags: BTreeSet<RiskFlag>,
    /// Per-factor breakdown.
    pub components: Vec<ComponentScore>,
    /// Reference time of the inputs.
    pub computed_at: DateTime<Utc>,
}

impl ScoreResult {
    /// Returns `true` if any authority flag is raised.
    #[must_use]
    pub fn has_hard_flag(&self) -> bool {
        self.risk_flags.iter().any(RiskFlag::is_hard)
    }

    /// Reason codes in evaluation order.
    #[must_use]
    pub fn reason_codes(&self) -> Vec<String> {
        self.reasons.iter().map(Reason::code).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_authority_flags_are_hard() {
        assert!(RiskFlag::MintAuthority.is_hard());
        assert!(RiskFlag::FreezeAuthority.is_hard());
        assert!(RiskFlag::MintAndFreezeAuthority.is_hard());
        assert!(!RiskFlag::LowLiquidity.is_hard());
        assert!(!RiskFlag::WhaleHolder.is_hard());
    }

    #[test]
    fn flag_codes_parse_back() {
        for flag in [
            RiskFlag::MintAuthority,
            RiskFlag::FreezeAuthority,
            RiskFlag::MintAndFreezeAuthority,
            RiskFlag::LowLiquidity,
            RiskFlag::NewToken,
            RiskFlag::LowHolders,
            RiskFlag::NoVolume,
            RiskFlag::WhaleHolder,
            RiskFlag::PriceDump,
        ] {
            assert_eq!(RiskFlag::parse(flag.as_str()), Some(flag));
        }
        assert_eq!(RiskFlag::parse("nonsense"), None);
    }

    #[test]
    fn reason_code_format() {
        let reason = Reason {
            component: ScoreComponent::Liquidity,
            tier: "strong".to_string(),
            points: 25.0,
        };
        assert_eq!(reason.code(), "liquidity:strong");
    }
}
