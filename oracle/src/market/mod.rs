//! Market data consumed by the prediction flows.

mod cache;
pub mod tokens;

pub use cache::CachedSource;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One coin as returned by CoinGecko's `/coins/markets`, plus an optional
/// social mention count filled in by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub current_price: f64,
    #[serde(default)]
    pub market_cap: f64,
    #[serde(default)]
    pub total_volume: f64,
    #[serde(default)]
    pub price_change_24h: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub market_cap_change_24h: Option<f64>,
    #[serde(default)]
    pub market_cap_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tweet_mentions: Option<u64>,
}

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Current market snapshot for `coin_id`. An error means "skip this cycle".
    async fn snapshot(&self, coin_id: &str) -> Result<MarketSnapshot>;
}

/// Counts recent social mentions of a query.
#[async_trait]
pub trait MentionCounter: Send + Sync {
    async fn count_mentions(&self, query: &str) -> Result<u64>;
}

/// One-line summary used inside prompts, fields separated by `" | "`.
pub fn format_snapshot(snapshot: &MarketSnapshot) -> String {
    let symbol = if snapshot.symbol.starts_with('$') {
        snapshot.symbol.clone()
    } else {
        format!("${}", snapshot.symbol)
    };

    let mut fields = vec![
        format!("{} ({})", snapshot.name, symbol),
        format!("Price: ${}", group_thousands(snapshot.current_price)),
        format!("Market Cap: ${}", group_thousands(snapshot.market_cap)),
        format!("Volume: ${}", group_thousands(snapshot.total_volume)),
    ];

    if let (Some(pct), Some(abs)) = (
        snapshot.price_change_percentage_24h,
        snapshot.price_change_24h,
    ) {
        fields.push(format!("24h Price Change: {pct:.2}% (${})", group_thousands(abs)));
    }
    if let (Some(pct), Some(abs)) = (
        snapshot.market_cap_change_percentage_24h,
        snapshot.market_cap_change_24h,
    ) {
        fields.push(format!(
            "24h Market Cap Change: {pct:.2}% (${})",
            group_thousands(abs)
        ));
    }
    if let Some(rank) = snapshot.market_cap_rank {
        fields.push(format!("Rank: #{rank}"));
    }
    if let Some(mentions) = snapshot.tweet_mentions {
        fields.push(format!("Tweet Mentions: {mentions}"));
    }

    fields.join(" | ")
}

/// `1234567.891` -> `1,234,567.891`. At most three fraction digits, trailing
/// zeros dropped.
pub fn group_thousands(value: f64) -> String {
    let formatted = format!("{:.3}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let negative = value < 0.0 && (int_part != "0" || !frac_part.is_empty());
    let sign = if negative { "-" } else { "" };
    if frac_part.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac_part}")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn bitcoin(price: f64) -> MarketSnapshot {
        MarketSnapshot {
            id: "bitcoin".to_string(),
            symbol: "btc".to_string(),
            name: "Bitcoin".to_string(),
            current_price: price,
            market_cap: 1_267_891_234_567.0,
            total_volume: 32_145_678_901.0,
            price_change_24h: Some(-1234.56),
            price_change_percentage_24h: Some(-1.8766),
            market_cap_change_24h: Some(-24_567_890_123.0),
            market_cap_change_percentage_24h: Some(-1.9),
            market_cap_rank: Some(1),
            last_updated: None,
            tweet_mentions: None,
        }
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0.0), "0");
        assert_eq!(group_thousands(999.0), "999");
        assert_eq!(group_thousands(1000.0), "1,000");
        assert_eq!(group_thousands(64_123.5), "64,123.5");
        assert_eq!(group_thousands(1_234_567.891), "1,234,567.891");
        assert_eq!(group_thousands(-1234.56), "-1,234.56");
        assert_eq!(group_thousands(0.00001), "0");
    }

    #[test]
    fn test_format_snapshot() {
        let mut snapshot = bitcoin(64_123.5);
        assert_eq!(
            format_snapshot(&snapshot),
            "Bitcoin ($btc) | Price: $64,123.5 | Market Cap: $1,267,891,234,567 | \
             Volume: $32,145,678,901 | 24h Price Change: -1.88% ($-1,234.56) | \
             24h Market Cap Change: -1.90% ($-24,567,890,123) | Rank: #1"
        );

        snapshot.tweet_mentions = Some(42);
        assert!(format_snapshot(&snapshot).ends_with(" | Rank: #1 | Tweet Mentions: 42"));
    }

    #[test]
    fn test_deserialize_coingecko_market_row() {
        let body = r#"[{
            "id": "bitcoin", "symbol": "btc", "name": "Bitcoin",
            "image": "https://assets.coingecko.com/coins/images/1/large/bitcoin.png",
            "current_price": 64000.12, "market_cap": 1260000000000,
            "market_cap_rank": 1, "total_volume": 31000000000,
            "price_change_24h": 512.4, "price_change_percentage_24h": 0.81,
            "market_cap_change_24h": null, "market_cap_change_percentage_24h": null,
            "roi": null, "last_updated": "2024-12-01T12:00:00.000Z"
        }]"#;

        let rows: Vec<MarketSnapshot> = serde_json::from_str(body).unwrap();
        assert_eq!(rows[0].current_price, 64000.12);
        assert_eq!(rows[0].market_cap_rank, Some(1));
        assert_eq!(rows[0].market_cap_change_24h, None);
        assert_eq!(rows[0].tweet_mentions, None);
    }
}
