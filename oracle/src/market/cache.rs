use super::{MarketDataSource, MarketSnapshot};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Wraps a [`MarketDataSource`] and reuses each coin's snapshot for `ttl`.
/// Failed fetches are never cached.
pub struct CachedSource<S> {
    inner: S,
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, MarketSnapshot)>>,
}

impl<S: MarketDataSource> CachedSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: MarketDataSource> MarketDataSource for CachedSource<S> {
    async fn snapshot(&self, coin_id: &str) -> Result<MarketSnapshot> {
        let mut entries = self.entries.lock().await;

        if let Some((fetched_at, snapshot)) = entries.get(coin_id) {
            if fetched_at.elapsed() < self.ttl {
                debug!(coin_id, "market snapshot served from cache");
                return Ok(snapshot.clone());
            }
        }

        let snapshot = self.inner.snapshot(coin_id).await?;
        entries.insert(coin_id.to_string(), (Instant::now(), snapshot.clone()));
        Ok(snapshot)
    }
}
