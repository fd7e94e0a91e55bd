//! TweetScout mention counter.
//!
//! Search results arrive newest first, one cursor-linked page at a time.
//! Paging stops at the first page that reaches past the time window, when the
//! cursor runs out, or once `max_tweets` have been counted.

use crate::utils::serialization::de_tweet_time;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tarot_oracle::MentionCounter;
use tracing::{debug, warn};

const TWEETSCOUT_SEARCH_URL: &str = "https://api.tweetscout.io/v2/search-tweets";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Page(SearchPage),
    Error { message: String },
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    tweets: Vec<Tweet>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    #[serde(deserialize_with = "de_tweet_time")]
    created_at: DateTime<Utc>,
}

/// Tally of one page against the cutoff.
#[derive(Debug, PartialEq, Eq)]
struct PageTally {
    counted: u64,
    reached_cutoff: bool,
}

fn tally_page(created: &[DateTime<Utc>], cutoff: DateTime<Utc>) -> PageTally {
    match created.last() {
        Some(oldest) if *oldest < cutoff => PageTally {
            counted: created.iter().filter(|at| **at >= cutoff).count() as u64,
            reached_cutoff: true,
        },
        Some(_) => PageTally {
            counted: created.len() as u64,
            reached_cutoff: false,
        },
        None => PageTally {
            counted: 0,
            reached_cutoff: true,
        },
    }
}

#[derive(Debug, Clone)]
pub struct TweetScoutTool {
    client: Client,
    api_key: String,
    window: Duration,
    max_tweets: Option<u64>,
}

impl TweetScoutTool {
    pub fn new(api_key: impl Into<String>, window_minutes: i64, max_tweets: Option<u64>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            window: Duration::minutes(window_minutes),
            max_tweets,
        }
    }

    async fn fetch_page(&self, query: &str, cursor: Option<&str>) -> Result<SearchResponse> {
        let mut body = json!({ "query": query });
        if let Some(cursor) = cursor {
            body["cursor"] = json!(cursor);
        }

        self.client
            .post(TWEETSCOUT_SEARCH_URL)
            .header("Accept", "application/json")
            .header("ApiKey", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("TweetScout request failed")?
            .json()
            .await
            .context("Failed to parse TweetScout response")
    }
}

#[async_trait]
impl MentionCounter for TweetScoutTool {
    async fn count_mentions(&self, query: &str) -> Result<u64> {
        let cutoff = Utc::now() - self.window;
        let mut total = 0u64;
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = match self.fetch_page(query, cursor.as_deref()).await {
                Ok(SearchResponse::Page(page)) => page,
                Ok(SearchResponse::Error { message }) => {
                    warn!(query, error = %message, "TweetScout returned an error");
                    break;
                }
                Err(err) if pages > 0 => {
                    warn!(query, error = %err, total, "TweetScout paging failed; keeping partial count");
                    break;
                }
                Err(err) => return Err(err),
            };
            pages += 1;

            let created: Vec<DateTime<Utc>> = page.tweets.iter().map(|t| t.created_at).collect();
            let tally = tally_page(&created, cutoff);
            total += tally.counted;

            if tally.reached_cutoff {
                break;
            }
            if self.max_tweets.is_some_and(|max| total >= max) {
                break;
            }
            match page.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(query, total, pages, "tweet mentions counted");
        Ok(total)
    }
}
