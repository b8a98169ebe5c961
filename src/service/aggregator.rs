//! Rolling-window metrics over a token's recent swaps.
//!
//! One pass over the trailing 15 minutes fills the 1/5/15-minute windows;
//! cutoffs are computed once per call. Buyer and seller uniqueness uses
//! per-window sets keyed by wallet.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::domain::{MetricsSnapshot, Mint, NormalizedSwap, Side, WindowStats};

/// Largest window the aggregator needs, in minutes.
pub const LOOKBACK_MINUTES: i64 = 15;

#[derive(Debug, Default)]
struct WindowAccumulator<'a> {
    swaps: u32,
    volume_usd: f64,
    buyers: HashSet<&'a str>,
    sellers: HashSet<&'a str>,
}

impl<'a> WindowAccumulator<'a> {
    fn add(&mut self, swap: &'a NormalizedSwap) {
        self.swaps = self.swaps.saturating_add(1);
        self.volume_usd += swap.amount_usd.unwrap_or(0.0);
        if let Some(buyer) = swap.buyer.as_deref().filter(|b| !b.is_empty()) {
            self.buyers.insert(buyer);
        }
        if let Some(seller) = swap.seller.as_deref().filter(|s| !s.is_empty()) {
            self.sellers.insert(seller);
        }
    }

    fn finish(&self) -> WindowStats {
        WindowStats {
            swaps: self.swaps,
            unique_buyers: u32::try_from(self.buyers.len()).unwrap_or(u32::MAX),
            unique_sellers: u32::try_from(self.sellers.len()).unwrap_or(u32::MAX),
            volume_usd: self.volume_usd,
        }
    }
}

/// Stateless metrics aggregator.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsAggregator;

impl MetricsAggregator {
    /// Computes window statistics at `now`. Swaps older than
    /// [`LOOKBACK_MINUTES`] are ignored; with no swaps the result is all zeros.
    /// Liquidity and holder fields are left empty for the caller.
    #[must_use]
    pub fn aggregate(mint: &Mint, swaps: &[NormalizedSwap], now: DateTime<Utc>) -> MetricsSnapshot {
        let cutoff_15m = now - Duration::minutes(LOOKBACK_MINUTES);
        let cutoff_5m = now - Duration::minutes(5);
        let cutoff_1m = now - Duration::minutes(1);

        let mut w15 = WindowAccumulator::default();
        let mut w5 = WindowAccumulator::default();
        let mut w1 = WindowAccumulator::default();
        let mut buy_volume = 0.0;
        let mut sell_volume = 0.0;
        let mut oldest_price: Option<(DateTime<Utc>, f64)> = None;
        let mut newest_price: Option<(DateTime<Utc>, f64)> = None;

        for swap in swaps.iter().filter(|s| s.token_mint == *mint) {
            if swap.timestamp < cutoff_15m {
                continue;
            }
            w15.add(swap);

            if swap.timestamp >= cutoff_5m {
                w5.add(swap);
                if let Some(price) = swap.unit_price_usd() {
                    if oldest_price.is_none_or(|(at, _)| swap.timestamp < at) {
                        oldest_price = Some((swap.timestamp, price));
                    }
                    if newest_price.is_none_or(|(at, _)| swap.timestamp > at) {
                        newest_price = Some((swap.timestamp, price));
                    }
                }
            }

            if swap.timestamp >= cutoff_1m {
                w1.add(swap);
                let usd = swap.amount_usd.unwrap_or(0.0);
                match swap.side {
                    Side::Buy => buy_volume += usd,
                    Side::Sell => sell_volume += usd,
                    Side::Unknown => {}
                }
            }
        }

        let price_change_5m_pct = match (oldest_price, newest_price) {
            (Some((first_at, first)), Some((last_at, last))) if last_at > first_at && first > 0.0 => {
                Some((last - first) / first * 100.0)
            }
            _ => None,
        };

        MetricsSnapshot {
            window_1m: w1.finish(),
            window_5m: w5.finish(),
            window_15m: w15.finish(),
            buy_volume_usd_1m: buy_volume,
            sell_volume_usd_1m: sell_volume,
            price_change_5m_pct,
            ..MetricsSnapshot::empty(mint.clone(), now)
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Provenance;

    fn swap(
        sig: &str,
        secs_ago: i64,
        side: Side,
        wallet: &str,
        usd: f64,
        tokens: f64,
        now: DateTime<Utc>,
    ) -> NormalizedSwap {
        let (buyer, seller) = match side {
            Side::Buy => (Some(wallet.to_string()), None),
            Side::Sell => (None, Some(wallet.to_string())),
            Side::Unknown => (None, None),
        };
        NormalizedSwap {
            token_mint: Mint::from("MintA"),
            signature: sig.to_string(),
            timestamp: now - Duration::seconds(secs_ago),
            side,
            amount_usd: Some(usd),
            amount_token: Some(tokens),
            amount_sol: None,
            buyer,
            seller,
            pool_address: None,
            dex: None,
            provenance: Provenance::DeclaredType,
        }
    }

    #[test]
    fn empty_history_is_all_zero() {
        let now = Utc::now();
        let m = MetricsAggregator::aggregate(&Mint::from("MintA"), &[], now);
        assert_eq!(m.window_1m, WindowStats::default());
        assert_eq!(m.window_15m, WindowStats::default());
        assert!(m.price_change_5m_pct.is_none());
        assert!((m.buy_pressure_1m() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn windows_nest_and_count_unique_wallets() {
        let now = Utc::now();
        let swaps = vec![
            swap("a", 10, Side::Buy, "w1", 100.0, 10.0, now),
            swap("b", 20, Side::Buy, "w1", 50.0, 5.0, now),
            swap("c", 30, Side::Sell, "w2", 25.0, 2.0, now),
            swap("d", 120, Side::Buy, "w3", 10.0, 1.0, now),
            swap("e", 600, Side::Sell, "w4", 5.0, 1.0, now),
            swap("f", 1200, Side::Buy, "w5", 1.0, 1.0, now),
        ];
        let m = MetricsAggregator::aggregate(&Mint::from("MintA"), &swaps, now);

        assert_eq!(m.window_1m.swaps, 3);
        assert_eq!(m.window_1m.unique_buyers, 1);
        assert_eq!(m.window_1m.unique_sellers, 1);
        assert!((m.window_1m.volume_usd - 175.0).abs() < 1e-9);
        assert!((m.buy_volume_usd_1m - 150.0).abs() < 1e-9);
        assert!((m.sell_volume_usd_1m - 25.0).abs() < 1e-9);

        assert_eq!(m.window_5m.swaps, 4);
        assert_eq!(m.window_5m.unique_buyers, 2);

        assert_eq!(m.window_15m.swaps, 5);
        assert_eq!(m.window_15m.unique_sellers, 2);
    }

    #[test]
    fn price_change_uses_oldest_and_newest_priced_swap() {
        let now = Utc::now();
        let swaps = vec![
            swap("new", 5, Side::Buy, "w1", 30.0, 10.0, now),
            swap("mid", 100, Side::Buy, "w2", 999.0, 1.0, now),
            swap("old", 250, Side::Buy, "w3", 20.0, 10.0, now),
            swap("stale", 400, Side::Buy, "w4", 1.0, 10.0, now),
        ];
        let m = MetricsAggregator::aggregate(&Mint::from("MintA"), &swaps, now);
        let Some(change) = m.price_change_5m_pct else {
            panic!("expected a price change");
        };
        assert!((change - 50.0).abs() < 1e-9);
    }

    #[test]
    fn single_priced_swap_has_no_change() {
        let now = Utc::now();
        let swaps = vec![swap("only", 5, Side::Buy, "w1", 30.0, 10.0, now)];
        let m = MetricsAggregator::aggregate(&Mint::from("MintA"), &swaps, now);
        assert!(m.price_change_5m_pct.is_none());
    }

    #[test]
    fn other_mints_are_ignored() {
        let now = Utc::now();
        let mut other = swap("x", 5, Side::Buy, "w1", 30.0, 10.0, now);
        other.token_mint = Mint::from("MintB");
        let m = MetricsAggregator::aggregate(&Mint::from("MintA"), &[other], now);
        assert_eq!(m.window_15m.swaps, 0);
    }
}
