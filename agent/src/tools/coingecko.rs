//! CoinGecko market feed.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::time::{Duration, Instant};
use tarot_oracle::{MarketDataSource, MarketSnapshot, TopTokenSource};
use tracing::{debug, warn};

const COINGECKO_MARKETS_URL: &str = "https://api.coingecko.com/api/v3/coins/markets";
const TOP_TOKENS_CATEGORY: &str = "solana-meme-coins";
const TOP_TOKENS_PER_PAGE: u32 = 20;
const MAJOR_COIN_IDS: &str = "bitcoin,ethereum";

#[derive(Debug, Clone)]
pub struct CoinGeckoTool {
    client: Client,
    base_url: Url,
}

impl CoinGeckoTool {
    pub fn new() -> Result<Self> {
        Self::with_base_url(COINGECKO_MARKETS_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid CoinGecko URL: {base_url}"))?;

        Ok(Self { client, base_url })
    }

    fn markets_url(&self, coin_ids: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("vs_currency", "usd")
            .append_pair("ids", coin_ids);
        url
    }

    fn category_url(&self, category: &str, per_page: u32) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("vs_currency", "usd")
            .append_pair("category", category)
            .append_pair("per_page", &per_page.to_string());
        url
    }

    async fn fetch_rows(&self, url: Url) -> Result<Vec<MarketSnapshot>> {
        let resp = self
            .client
            .get(url)
            .header("accept", "application/json")
            .send()
            .await
            .context("CoinGecko request failed")?;

        // Rate limits skip the cycle; never substitute a price.
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            warn!("CoinGecko rate limited");
            bail!("CoinGecko rate limited");
        }

        resp.error_for_status()
            .context("CoinGecko API error")?
            .json()
            .await
            .context("Failed to parse CoinGecko response")
    }
}

/// Pick `coin_id` out of a `/coins/markets` response.
fn select_snapshot(rows: Vec<MarketSnapshot>, coin_id: &str) -> Result<MarketSnapshot> {
    let snapshot = rows
        .into_iter()
        .find(|row| row.id == coin_id)
        .with_context(|| format!("CoinGecko returned no market data for '{coin_id}'"))?;

    if !snapshot.current_price.is_finite() || snapshot.current_price <= 0.0 {
        bail!(
            "CoinGecko returned an unusable price for '{coin_id}': {}",
            snapshot.current_price
        );
    }

    Ok(snapshot)
}

#[async_trait]
impl MarketDataSource for CoinGeckoTool {
    async fn snapshot(&self, coin_id: &str) -> Result<MarketSnapshot> {
        let start = Instant::now();
        let rows = self.fetch_rows(self.markets_url(coin_id)).await?;

        let snapshot = select_snapshot(rows, coin_id)?;
        debug!(
            coin_id,
            price = snapshot.current_price,
            fetch_time_ms = start.elapsed().as_millis() as u64,
            "market snapshot fetched"
        );

        Ok(snapshot)
    }
}

/// Top category coins first, then the majors.
#[async_trait]
impl TopTokenSource for CoinGeckoTool {
    async fn top_tokens(&self) -> Result<Vec<MarketSnapshot>> {
        let start = Instant::now();
        let (category, majors) = tokio::join!(
            self.fetch_rows(self.category_url(TOP_TOKENS_CATEGORY, TOP_TOKENS_PER_PAGE)),
            self.fetch_rows(self.markets_url(MAJOR_COIN_IDS)),
        );

        let mut rows = category.context("Failed to fetch top category tokens")?;
        rows.extend(majors.context("Failed to fetch major coins")?);

        debug!(
            tokens = rows.len(),
            fetch_time_ms = start.elapsed().as_millis() as u64,
            "top tokens fetched"
        );
        Ok(rows)
    }
}
