//! Deterministic scoring engine.
//!
//! Every factor is a statically ordered tier table evaluated top-down: the
//! first tier whose minimum the value meets wins, and the last tier is the
//! default. The engine reads no clock; the caller passes `now`, which only
//! feeds the token-age risk flag.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::domain::{
    ComponentScore, HolderSnapshot, MetricsSnapshot, Reason, RiskFlag, ScoreComponent,
    ScoreResult, TokenRecord,
};

/// One row of a tier table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tier {
    /// Inclusive lower bound for positive tiers, exclusive for penalties.
    pub min: f64,
    /// Points awarded (negative for penalties).
    pub points: f64,
    /// Label used in the reason code.
    pub label: &'static str,
}

const fn tier(min: f64, points: f64, label: &'static str) -> Tier {
    Tier { min, points, label }
}

/// Liquidity in USD. Max 25.
pub const LIQUIDITY_TIERS: &[Tier] = &[
    tier(50_000.0, 25.0, "50k"),
    tier(20_000.0, 20.0, "20k"),
    tier(10_000.0, 15.0, "10k"),
    tier(5_000.0, 10.0, "5k"),
    tier(1_000.0, 5.0, "1k"),
    tier(0.0, 0.0, "none"),
];

/// Distinct buyers in the last minute. Max 20.
pub const UNIQUE_BUYERS_1M_TIERS: &[Tier] = &[
    tier(20.0, 20.0, "20"),
    tier(10.0, 14.0, "10"),
    tier(5.0, 8.0, "5"),
    tier(2.0, 4.0, "2"),
    tier(0.0, 0.0, "none"),
];

/// Swaps in the last minute. Max 15.
pub const SWAPS_1M_TIERS: &[Tier] = &[
    tier(40.0, 15.0, "40"),
    tier(20.0, 10.0, "20"),
    tier(10.0, 6.0, "10"),
    tier(5.0, 3.0, "5"),
    tier(0.0, 0.0, "none"),
];

/// USD volume in the last minute. Max 10.
pub const VOLUME_1M_TIERS: &[Tier] = &[
    tier(50_000.0, 10.0, "50k"),
    tier(20_000.0, 7.0, "20k"),
    tier(5_000.0, 4.0, "5k"),
    tier(1_000.0, 2.0, "1k"),
    tier(0.0, 0.0, "none"),
];

/// Holder count. Max 10.
pub const HOLDER_TIERS: &[Tier] = &[
    tier(200.0, 10.0, "200"),
    tier(100.0, 7.0, "100"),
    tier(50.0, 4.0, "50"),
    tier(20.0, 2.0, "20"),
    tier(0.0, 0.0, "none"),
];

/// Distinct buyers in the last five minutes. Max 10.
pub const UNIQUE_BUYERS_5M_TIERS: &[Tier] = &[
    tier(50.0, 10.0, "50"),
    tier(25.0, 7.0, "25"),
    tier(10.0, 4.0, "10"),
    tier(5.0, 2.0, "5"),
    tier(0.0, 0.0, "none"),
];

/// Buy share of 1-minute volume. Max 10.
pub const BUY_PRESSURE_TIERS: &[Tier] = &[
    tier(0.70, 10.0, "70pct"),
    tier(0.60, 6.0, "60pct"),
    tier(0.55, 3.0, "55pct"),
    tier(0.0, 0.0, "neutral"),
];

/// Top-10 concentration in percent; strictly-greater thresholds.
pub const TOP10_PENALTY_TIERS: &[Tier] = &[
    tier(80.0, -25.0, "gt80"),
    tier(70.0, -18.0, "gt70"),
    tier(60.0, -10.0, "gt60"),
    tier(50.0, -5.0, "gt50"),
];

/// Top-1 concentration in percent; strictly-greater thresholds.
pub const TOP1_PENALTY_TIERS: &[Tier] = &[
    tier(50.0, -15.0, "gt50"),
    tier(30.0, -10.0, "gt30"),
    tier(20.0, -5.0, "gt20"),
];

/// Penalty when both authorities are held.
pub const BOTH_AUTHORITIES_PENALTY: f64 = -20.0;
/// Penalty when one authority is held.
pub const SINGLE_AUTHORITY_PENALTY: f64 = -10.0;

/// Liquidity floor (USD) for the low-liquidity flag.
pub const LOW_LIQUIDITY_FLOOR_USD: f64 = 5_000.0;
/// Minimum age in minutes before the new-token flag clears.
pub const NEW_TOKEN_MINUTES: i64 = 10;
/// Holder floor for the low-holders flag.
pub const LOW_HOLDERS_FLOOR: u64 = 50;
/// Top-1 share (percent) above which the whale flag is raised.
pub const WHALE_TOP1_PCT: f64 = 60.0;
/// 5-minute price change (percent) below which the dump flag is raised.
pub const PRICE_DUMP_PCT: f64 = -30.0;

/// Positive tier lookup: first tier with `value >= min`, else the last.
#[must_use]
pub fn positive_tier(table: &'static [Tier], value: f64) -> Option<&'static Tier> {
    table.iter().find(|t| value >= t.min).or_else(|| table.last())
}

/// Penalty tier lookup: first tier with `value > min`, else none.
#[must_use]
pub fn penalty_tier(table: &'static [Tier], value: f64) -> Option<&'static Tier> {
    table.iter().find(|t| value > t.min)
}

/// Everything one scoring pass reads.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInput<'a> {
    /// Token entity (authorities, first-seen).
    pub token: &'a TokenRecord,
    /// Fresh rolling metrics.
    pub metrics: &'a MetricsSnapshot,
    /// Latest holder snapshot, if any.
    pub holders: Option<&'a HolderSnapshot>,
    /// Reference time for token age.
    pub now: DateTime<Utc>,
}

/// Stateless scoring engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine;

#[derive(Debug, Default)]
struct Tally {
    total: f64,
    reasons: Vec<Reason>,
    components: Vec<ComponentScore>,
}

impl Tally {
    fn positive(&mut self, component: ScoreComponent, table: &'static [Tier], value: f64) {
        let (points, label) =
            positive_tier(table, value).map_or((0.0, "none"), |t| (t.points, t.label));
        self.total += points;
        self.reasons.push(Reason {
            component,
            tier: label.to_string(),
            points,
        });
        self.components.push(ComponentScore {
            component,
            value: Some(value),
            points,
        });
    }

    fn penalty(&mut self, component: ScoreComponent, value: Option<f64>, hit: Option<(f64, &str)>) {
        let points = hit.map_or(0.0, |(p, _)| p);
        if let Some((p, label)) = hit
            && p != 0.0
        {
            self.total += p;
            self.reasons.push(Reason {
                component,
                tier: label.to_string(),
                points: p,
            });
        }
        self.components.push(ComponentScore {
            component,
            value,
            points,
        });
    }
}

impl ScoringEngine {
    /// Scores one token. Same input, same output.
    #[must_use]
    pub fn score(input: &ScoringInput<'_>) -> ScoreResult {
        let metrics = input.metrics;
        let liquidity = metrics.liquidity_usd.unwrap_or(0.0);
        let holder_count = input
            .holders
            .map(|h| h.holder_count)
            .or(metrics.holder_count)
            .unwrap_or(0);
        #[allow(clippy::cast_precision_loss)]
        let holder_value = holder_count as f64;

        let mut tally = Tally::default();
        tally.positive(ScoreComponent::Liquidity, LIQUIDITY_TIERS, liquidity);
        tally.positive(
            ScoreComponent::UniqueBuyers1m,
            UNIQUE_BUYERS_1M_TIERS,
            f64::from(metrics.window_1m.unique_buyers),
        );
        tally.positive(
            ScoreComponent::Swaps1m,
            SWAPS_1M_TIERS,
            f64::from(metrics.window_1m.swaps),
        );
        tally.positive(
            ScoreComponent::Volume1m,
            VOLUME_1M_TIERS,
            metrics.window_1m.volume_usd,
        );
        tally.positive(ScoreComponent::Holders, HOLDER_TIERS, holder_value);
        tally.positive(
            ScoreComponent::UniqueBuyers5m,
            UNIQUE_BUYERS_5M_TIERS,
            f64::from(metrics.window_5m.unique_buyers),
        );
        tally.positive(
            ScoreComponent::BuyPressure,
            BUY_PRESSURE_TIERS,
            metrics.buy_pressure_1m(),
        );

        let top10 = input.holders.map(|h| h.top10_pct).filter(|v| *v > 0.0);
        tally.penalty(
            ScoreComponent::Top10Concentration,
            top10,
            top10
                .and_then(|v| penalty_tier(TOP10_PENALTY_TIERS, v))
                .map(|t| (t.points, t.label)),
        );
        let top1 = input.holders.map(|h| h.top1_pct).filter(|v| *v > 0.0);
        tally.penalty(
            ScoreComponent::Top1Concentration,
            top1,
            top1.and_then(|v| penalty_tier(TOP1_PENALTY_TIERS, v))
                .map(|t| (t.points, t.label)),
        );

        let mut risk_flags = BTreeSet::new();
        let has_mint = input.token.mint_authority.is_some();
        let has_freeze = input.token.freeze_authority.is_some();
        let authority_hit = match (has_mint, has_freeze) {
            (true, true) => {
                risk_flags.insert(RiskFlag::MintAndFreezeAuthority);
                Some((BOTH_AUTHORITIES_PENALTY, "both"))
            }
            (true, false) => {
                risk_flags.insert(RiskFlag::MintAuthority);
                Some((SINGLE_AUTHORITY_PENALTY, "mint"))
            }
            (false, true) => {
                risk_flags.insert(RiskFlag::FreezeAuthority);
                Some((SINGLE_AUTHORITY_PENALTY, "freeze"))
            }
            (false, false) => None,
        };
        let authority_count = f64::from(u8::from(has_mint) + u8::from(has_freeze));
        tally.penalty(
            ScoreComponent::Authorities,
            Some(authority_count),
            authority_hit,
        );

        if liquidity < LOW_LIQUIDITY_FLOOR_USD {
            risk_flags.insert(RiskFlag::LowLiquidity);
        }
        if input.token.age_minutes(input.now) < NEW_TOKEN_MINUTES {
            risk_flags.insert(RiskFlag::NewToken);
        }
        if holder_count < LOW_HOLDERS_FLOOR {
            risk_flags.insert(RiskFlag::LowHolders);
        }
        if metrics.window_1m.volume_usd <= 0.0 {
            risk_flags.insert(RiskFlag::NoVolume);
        }
        if top1.is_some_and(|v| v > WHALE_TOP1_PCT) {
            risk_flags.insert(RiskFlag::WhaleHolder);
        }
        if metrics
            .price_change_5m_pct
            .is_some_and(|v| v < PRICE_DUMP_PCT)
        {
            risk_flags.insert(RiskFlag::PriceDump);
        }

        ScoreResult {
            mint: input.token.mint.clone(),
            score: clamp_score(tally.total),
            reasons: tally.reasons,
            risk_flags,
            components: tally.components,
            computed_at: metrics.computed_at,
        }
    }
}

/// Rounds to the nearest integer and clamps to `[0, 100]`.
#[must_use]
pub fn clamp_score(total: f64) -> u8 {
    if total.is_nan() {
        return 0;
    }
    let clamped = total.round().clamp(0.0, 100.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let score = clamped as u8;
    score
}
