//! Multi-token market board for readings.
//!
//! Each read flips a weighted coin: either every known token is listed, or
//! only the biggest 24h movers are kept and mention-counted. The formatted
//! board is cached per choice for [`TokenScanConfig::refresh`].

use super::{format_snapshot, group_thousands, MarketSnapshot, MentionCounter};
use crate::config::TokenScanConfig;
use anyhow::{bail, Result};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use strum::Display;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A recently listed DEX token that passed the listing filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewToken {
    pub name: String,
    pub symbol: String,
    pub price_usd: f64,
    pub volume_24h: f64,
    pub market_cap: f64,
    /// Percent.
    pub price_change_24h: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tweet_mentions: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenEntry {
    Listed(MarketSnapshot),
    New(NewToken),
}

impl TokenEntry {
    pub fn symbol(&self) -> &str {
        match self {
            TokenEntry::Listed(snapshot) => &snapshot.symbol,
            TokenEntry::New(token) => &token.symbol,
        }
    }

    /// Absolute 24h change used to rank movers: market cap change for
    /// listed coins, price change for new tokens.
    pub fn movement(&self) -> f64 {
        let change = match self {
            TokenEntry::Listed(snapshot) => snapshot.market_cap_change_percentage_24h.unwrap_or(0.0),
            TokenEntry::New(token) => token.price_change_24h,
        };
        if change.is_finite() {
            change.abs()
        } else {
            0.0
        }
    }

    fn set_mentions(&mut self, count: u64) {
        match self {
            TokenEntry::Listed(snapshot) => snapshot.tweet_mentions = Some(count),
            TokenEntry::New(token) => token.tweet_mentions = Some(count),
        }
    }

    pub fn format(&self) -> String {
        match self {
            TokenEntry::Listed(snapshot) => format_snapshot(snapshot),
            TokenEntry::New(token) => format_new_token(token),
        }
    }
}

/// Source of established coins (top category listings plus majors).
#[async_trait]
pub trait TopTokenSource: Send + Sync {
    async fn top_tokens(&self) -> Result<Vec<MarketSnapshot>>;
}

/// Source of freshly listed tokens, already filtered.
#[async_trait]
pub trait NewTokenSource: Send + Sync {
    async fn new_tokens(&self) -> Result<Vec<NewToken>>;
}

/// Which board a read produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum BoardChoice {
    AllTokens,
    LargeMovers,
}

/// `$`-prefixed ticker used as the mention search query.
pub fn mention_query(symbol: &str) -> String {
    if symbol.starts_with('$') {
        symbol.to_string()
    } else {
        format!("${symbol}")
    }
}

pub fn format_new_token(token: &NewToken) -> String {
    let mut fields = vec![
        format!("{} ({})", token.name, mention_query(&token.symbol)),
        format!("Price: ${}", group_thousands(token.price_usd)),
        format!("Volume (24h): ${}", group_thousands(token.volume_24h)),
        format!("Market Cap: ${}", group_thousands(token.market_cap)),
        format!("Price Change (24h): {:.2}%", token.price_change_24h),
        "New listing".to_string(),
    ];
    if let Some(mentions) = token.tweet_mentions {
        fields.push(format!("Tweet Mentions: {mentions}"));
    }
    fields.join(" | ")
}

pub fn format_board(entries: &[TokenEntry]) -> String {
    let body = entries
        .iter()
        .map(TokenEntry::format)
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("Tokens data:\n\n{body}")
}

/// The `count` entries with the largest absolute 24h move, biggest first.
pub fn select_movers(mut entries: Vec<TokenEntry>, count: usize) -> Vec<TokenEntry> {
    entries.sort_by(|a, b| b.movement().total_cmp(&a.movement()));
    entries.truncate(count);
    entries
}

pub struct TokenBoard {
    top: Arc<dyn TopTokenSource>,
    fresh: Arc<dyn NewTokenSource>,
    mentions: Option<Arc<dyn MentionCounter>>,
    config: TokenScanConfig,
    cache: Mutex<HashMap<BoardChoice, (Instant, String)>>,
}

impl TokenBoard {
    pub fn new(
        top: Arc<dyn TopTokenSource>,
        fresh: Arc<dyn NewTokenSource>,
        config: TokenScanConfig,
    ) -> Self {
        Self {
            top,
            fresh,
            mentions: None,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_mentions(mut self, mentions: Arc<dyn MentionCounter>) -> Self {
        self.mentions = Some(mentions);
        self
    }

    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> BoardChoice {
        if rng.random_bool(self.config.new_tokens_chance.clamp(0.0, 1.0)) {
            BoardChoice::LargeMovers
        } else {
            BoardChoice::AllTokens
        }
    }

    /// Formatted board for a randomly chosen [`BoardChoice`].
    pub async fn reading(&self) -> Result<String> {
        let choice = self.choose(&mut rand::rng());
        self.reading_for(choice).await
    }

    /// Formatted board for `choice`. A failing source is logged and treated
    /// as empty; the read fails only when both come back empty.
    pub async fn reading_for(&self, choice: BoardChoice) -> Result<String> {
        let mut cache = self.cache.lock().await;

        if let Some((built_at, board)) = cache.get(&choice) {
            if built_at.elapsed() < self.config.refresh {
                debug!(%choice, "token board served from cache");
                return Ok(board.clone());
            }
        }

        let (fresh, top) = tokio::join!(self.fresh.new_tokens(), self.top.top_tokens());
        let fresh = fresh.unwrap_or_else(|err| {
            warn!("Failed to fetch new tokens: {err:#}");
            Vec::new()
        });
        let top = top.unwrap_or_else(|err| {
            warn!("Failed to fetch top tokens: {err:#}");
            Vec::new()
        });

        let mut entries: Vec<TokenEntry> = fresh
            .into_iter()
            .map(TokenEntry::New)
            .chain(top.into_iter().map(TokenEntry::Listed))
            .collect();
        if entries.is_empty() {
            bail!("no token data from any source");
        }

        if choice == BoardChoice::LargeMovers {
            entries = select_movers(entries, self.config.tokens_for_tweet_count);
            self.count_mentions(&mut entries).await;
        }

        info!(%choice, tokens = entries.len(), "token board built");
        let board = format_board(&entries);
        cache.insert(choice, (Instant::now(), board.clone()));
        Ok(board)
    }

    async fn count_mentions(&self, entries: &mut [TokenEntry]) {
        let Some(counter) = &self.mentions else {
            return;
        };

        for entry in entries.iter_mut() {
            let query = mention_query(entry.symbol());
            match counter.count_mentions(&query).await {
                Ok(count) => entry.set_mentions(count),
                Err(err) => warn!(query = %query, "Failed to count tweet mentions: {err:#}"),
            }
        }
    }
}
