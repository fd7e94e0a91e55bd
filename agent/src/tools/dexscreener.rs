//! DexScreener feed of newly listed Solana tokens.
//!
//! Two requests: the latest token profiles, then the pairs for up to
//! [`MAX_PROFILE_ADDRESSES`] Solana profiles that carry a description. Pairs
//! are kept only when market cap, peak volume and age pass the configured
//! thresholds.

use crate::utils::serialization::de_opt_f64;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tarot_oracle::{NewToken, NewTokenSource, TokenScanConfig};
use tracing::debug;

const DEXSCREENER_API_URL: &str = "https://api.dexscreener.com";
const MAX_PROFILE_ADDRESSES: usize = 30;
const SOLANA_CHAIN_ID: &str = "solana";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenProfile {
    chain_id: String,
    token_address: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PairsResponse {
    #[serde(default)]
    pairs: Option<Vec<Pair>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pair {
    base_token: BaseToken,
    #[serde(default, deserialize_with = "de_opt_f64")]
    price_usd: Option<f64>,
    #[serde(default)]
    volume: Windows,
    #[serde(default)]
    price_change: Windows,
    #[serde(default, deserialize_with = "de_opt_f64")]
    market_cap: Option<f64>,
    /// Unix millis.
    #[serde(default)]
    pair_created_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BaseToken {
    name: String,
    symbol: String,
}

#[derive(Debug, Default, Deserialize)]
struct Windows {
    #[serde(default)]
    m5: f64,
    #[serde(default)]
    h1: f64,
    #[serde(default)]
    h6: f64,
    #[serde(default)]
    h24: f64,
}

impl Windows {
    fn peak(&self) -> f64 {
        [self.m5, self.h1, self.h6, self.h24]
            .into_iter()
            .fold(0.0, f64::max)
    }
}

/// Addresses of described Solana profiles, in feed order.
fn solana_addresses(profiles: &[TokenProfile]) -> Vec<&str> {
    profiles
        .iter()
        .filter(|profile| profile.chain_id == SOLANA_CHAIN_ID)
        .filter(|profile| {
            profile
                .description
                .as_deref()
                .is_some_and(|text| !text.trim().is_empty())
        })
        .map(|profile| profile.token_address.as_str())
        .take(MAX_PROFILE_ADDRESSES)
        .collect()
}

fn pair_to_token(pair: Pair, config: &TokenScanConfig, now: DateTime<Utc>) -> Option<NewToken> {
    let market_cap = pair.market_cap?;
    if market_cap <= config.min_market_cap || pair.volume.peak() <= config.min_volume {
        return None;
    }

    let created = DateTime::from_timestamp_millis(pair.pair_created_at?)?;
    let age_hours = (now - created).num_seconds() as f64 / 3600.0;
    if age_hours < config.min_age_hours || age_hours > config.max_age_hours {
        return None;
    }

    Some(NewToken {
        name: pair.base_token.name,
        symbol: pair.base_token.symbol,
        price_usd: pair.price_usd.unwrap_or_default(),
        volume_24h: pair.volume.h24,
        market_cap,
        price_change_24h: pair.price_change.h24,
        tweet_mentions: None,
    })
}

#[derive(Debug, Clone)]
pub struct DexScreenerTool {
    client: Client,
    base_url: String,
    config: TokenScanConfig,
}

impl DexScreenerTool {
    pub fn new(config: TokenScanConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: DEXSCREENER_API_URL.to_string(),
            config,
        })
    }

    fn profiles_url(&self) -> String {
        format!("{}/token-profiles/latest/v1", self.base_url)
    }

    fn pairs_url(&self, addresses: &[&str]) -> String {
        format!("{}/latest/dex/tokens/{}", self.base_url, addresses.join(","))
    }
}

#[async_trait]
impl NewTokenSource for DexScreenerTool {
    async fn new_tokens(&self) -> Result<Vec<NewToken>> {
        let start = Instant::now();

        let profiles: Vec<TokenProfile> = self
            .client
            .get(self.profiles_url())
            .send()
            .await
            .context("DexScreener profiles request failed")?
            .error_for_status()
            .context("DexScreener API error")?
            .json()
            .await
            .context("Failed to parse DexScreener profiles")?;

        let addresses = solana_addresses(&profiles);
        if addresses.is_empty() {
            debug!("no described Solana profiles in the latest feed");
            return Ok(Vec::new());
        }

        let response: PairsResponse = self
            .client
            .get(self.pairs_url(&addresses))
            .send()
            .await
            .context("DexScreener pairs request failed")?
            .error_for_status()
            .context("DexScreener API error")?
            .json()
            .await
            .context("Failed to parse DexScreener pairs")?;

        let now = Utc::now();
        let tokens: Vec<NewToken> = response
            .pairs
            .unwrap_or_default()
            .into_iter()
            .filter_map(|pair| pair_to_token(pair, &self.config, now))
            .collect();

        debug!(
            profiles = addresses.len(),
            tokens = tokens.len(),
            fetch_time_ms = start.elapsed().as_millis() as u64,
            "new tokens fetched"
        );

        Ok(tokens)
    }
}
