//! Alert message rendering (Telegram HTML subset).

use std::fmt::Write as _;

use crate::domain::{MetricsSnapshot, ScoreResult, TokenRecord};

/// Escapes the characters Telegram's HTML parse mode reserves.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            other => out.push(other),
        }
    }
    out
}

fn usd(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("${v:.0}"))
}

/// Renders one alert: header, activity summary, contributing reasons and
/// warnings.
#[must_use]
pub fn render_alert(token: &TokenRecord, score: &ScoreResult, metrics: &MetricsSnapshot) -> String {
    let label = match (&token.symbol, &token.name) {
        (Some(symbol), Some(name)) => format!("{} ({})", escape_html(symbol), escape_html(name)),
        (Some(symbol), None) => escape_html(symbol),
        (None, Some(name)) => escape_html(name),
        (None, None) => "unknown token".to_string(),
    };

    let mut out = String::new();
    let _ = writeln!(out, "<b>{label}</b> score <b>{}</b>/100", score.score);
    let _ = writeln!(out, "<code>{}</code>", escape_html(token.mint.as_str()));
    let _ = writeln!(
        out,
        "liq {} | vol 1m {} | swaps 1m {} | buyers 1m {} | holders {}",
        usd(metrics.liquidity_usd),
        usd(Some(metrics.window_1m.volume_usd)),
        metrics.window_1m.swaps,
        metrics.window_1m.unique_buyers,
        metrics
            .holder_count
            .map_or_else(|| "n/a".to_string(), |h| h.to_string()),
    );
    if let Some(change) = metrics.price_change_5m_pct {
        let _ = writeln!(out, "price 5m {change:+.1}%");
    }

    let scored: Vec<String> = score
        .reasons
        .iter()
        .filter(|r| r.points != 0.0)
        .map(|r| format!("{} {:+.0}", r.code(), r.points))
        .collect();
    if !scored.is_empty() {
        let _ = writeln!(out, "\n{}", scored.join("\n"));
    }

    if !score.risk_flags.is_empty() {
        let flags: Vec<&str> = score.risk_flags.iter().map(|f| f.as_str()).collect();
        let _ = writeln!(out, "\n\u{26a0} {}", flags.join(", "));
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;

    use super::*;
    use crate::domain::{Mint, Reason, RiskFlag, ScoreComponent};

    #[test]
    fn escapes_reserved_characters() {
        assert_eq!(escape_html("<a&b>"), "&lt;a&amp;b&gt;");
    }

    #[test]
    fn renders_reasons_and_flags() {
        let now = Utc::now();
        let mint = Mint::from("MintA");
        let mut token = TokenRecord::first_seen(mint.clone(), now);
        token.symbol = Some("RDR".to_string());
        let mut metrics = MetricsSnapshot::empty(mint.clone(), now);
        metrics.liquidity_usd = Some(12_345.6);
        let score = ScoreResult {
            mint,
            score: 72,
            reasons: vec![
                Reason {
                    component: ScoreComponent::Liquidity,
                    tier: "10000".to_string(),
                    points: 15.0,
                },
                Reason {
                    component: ScoreComponent::Swaps1m,
                    tier: "0".to_string(),
                    points: 0.0,
                },
            ],
            risk_flags: [RiskFlag::NewToken].into_iter().collect::<BTreeSet<_>>(),
            components: Vec::new(),
            computed_at: now,
        };
        let text = render_alert(&token, &score, &metrics);
        assert!(text.starts_with("<b>RDR</b> score <b>72</b>/100"));
        assert!(text.contains("liq $12346"));
        assert!(text.contains("liquidity:10000 +15"));
        assert!(!text.contains("swaps_1m"));
        assert!(text.contains("new_token"));
    }
}
