//! Rolling activity metrics and holder concentration snapshots.
//!
//! Both are recomputed from scratch on every cycle and never updated
//! incrementally, so they stay correct across ingestion gaps and restarts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Mint;

/// Statistics for one trailing window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    /// Number of swaps.
    pub swaps: u32,
    /// Distinct buyer wallets.
    pub unique_buyers: u32,
    /// Distinct seller wallets.
    pub unique_sellers: u32,
    /// Total USD volume.
    pub volume_usd: f64,
}

/// Per-token rolling aggregates over 1/5/15-minute windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Token the metrics describe.
    pub mint: Mint,
    /// Reference time the windows were cut against.
    pub computed_at: DateTime<Utc>,
    /// Trailing 1-minute window.
    pub window_1m: WindowStats,
    /// Trailing 5-minute window.
    pub window_5m: WindowStats,
    /// Trailing 15-minute window.
    pub window_15m: WindowStats,
    /// USD volume of buys in the 1-minute window.
    pub buy_volume_usd_1m: f64,
    /// USD volume of sells in the 1-minute window.
    pub sell_volume_usd_1m: f64,
    /// Percentage change of the implied unit price across the 5-minute window.
    pub price_change_5m_pct: Option<f64>,
    /// Pool liquidity in USD.
    pub liquidity_usd: Option<f64>,
    /// Pool liquidity in native units.
    pub liquidity_sol: Option<f64>,
    /// Holder count from the latest holder snapshot.
    pub holder_count: Option<u64>,
}

impl MetricsSnapshot {
    /// All-zero snapshot for a token with no activity.
    #[must_use]
    pub fn empty(mint: Mint, computed_at: DateTime<Utc>) -> Self {
        Self {
            mint,
            computed_at,
            window_1m: WindowStats::default(),
            window_5m: WindowStats::default(),
            window_15m: WindowStats::default(),
            buy_volume_usd_1m: 0.0,
            sell_volume_usd_1m: 0.0,
            price_change_5m_pct: None,
            liquidity_usd: None,
            liquidity_sol: None,
            holder_count: None,
        }
    }

    /// Share of 1-minute volume that was buying, `0.5` when there was none.
    #[must_use]
    pub fn buy_pressure_1m(&self) -> f64 {
        let total = self.buy_volume_usd_1m + self.sell_volume_usd_1m;
        if total <= 0.0 {
            0.5
        } else {
            self.buy_volume_usd_1m / total
        }
    }
}

/// Point-in-time concentration of the largest sampled holder accounts.
///
/// Percentages are relative to the sum of sampled holdings, an estimate
/// rather than true circulating supply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderSnapshot {
    /// Token the snapshot describes.
    pub mint: Mint,
    /// Holder count reported by the source, or the sampled non-empty count.
    pub holder_count: u64,
    /// Share held by the largest account, in percent.
    pub top1_pct: f64,
    /// Share held by the five largest accounts, in percent.
    pub top5_pct: f64,
    /// Share held by the ten largest accounts, in percent.
    pub top10_pct: f64,
    /// Share held by the twenty largest accounts, in percent.
    pub top20_pct: f64,
    /// When the sample was taken.
    pub captured_at: DateTime<Utc>,
}

impl HolderSnapshot {
    /// Builds a snapshot from sampled balances in any order.
    #[must_use]
    pub fn from_balances(
        mint: Mint,
        balances: &[f64],
        reported_holder_count: Option<u64>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        let mut sorted: Vec<f64> = balances
            .iter()
            .copied()
            .filter(|b| b.is_finite() && *b > 0.0)
            .collect();
        sorted.sort_by(|a, b| b.total_cmp(a));

        let total: f64 = sorted.iter().sum();
        let top_pct = |n: usize| {
            if total <= 0.0 {
                0.0
            } else {
                sorted.iter().take(n).sum::<f64>() / total * 100.0
            }
        };

        Self {
            holder_count: reported_holder_count
                .unwrap_or_else(|| u64::try_from(sorted.len()).unwrap_or(u64::MAX)),
            top1_pct: top_pct(1),
            top5_pct: top_pct(5),
            top10_pct: top_pct(10),
            top20_pct: top_pct(20),
            mint,
            captured_at,
        }
    }
}
