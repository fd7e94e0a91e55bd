//! CLI argument parsing for the tarot agent.
//!
//! Uses clap for argument parsing with environment variable fallbacks.

use clap::{Parser, ValueHint};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Which prediction flow a cycle runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    /// Directional Bitcoin call, verdict pass and ledger reconciliation
    #[default]
    Bitcoin,
    /// Free-text market reading with a rendered spread image
    Reading,
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flow::Bitcoin => write!(f, "bitcoin"),
            Flow::Reading => write!(f, "reading"),
        }
    }
}

/// Tarot agent - market tarot readings and self-scoring Bitcoin predictions
///
/// Draws a three card spread, asks the model for a reading tied to live market
/// data, and keeps score of its own directional calls.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct AgentArgs {
    /// Base URL of the model API (e.g., https://api.openai.com)
    #[arg(
        long = "api-base",
        env = "MODEL_API_BASE",
        default_value = "https://api.openai.com",
        value_hint = ValueHint::Url
    )]
    pub api_base: String,

    /// API key for the model API
    #[arg(long = "api-key", env = "MODEL_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Model used for small generations
    #[arg(long = "small-model", env = "SMALL_MODEL", default_value = "gpt-4o-mini")]
    pub small_model: String,

    /// Model used for large generations
    #[arg(long = "large-model", env = "LARGE_MODEL", default_value = "gpt-4o")]
    pub large_model: String,

    /// Prediction flow to run each round.
    /// - bitcoin: direction call + verdict + ledger
    /// - reading: market tarot reading with spread image
    #[arg(
        short = 'f',
        long = "flow",
        env = "TAROT_FLOW",
        value_parser = parse_flow,
        default_value = "bitcoin"
    )]
    pub flow: Flow,

    /// CoinGecko coin id the flows read market data for
    #[arg(long = "coin-id", env = "COIN_ID", default_value = "bitcoin")]
    pub coin_id: String,

    /// Prediction horizon mentioned in the Bitcoin prompt, in minutes
    #[arg(long = "horizon-minutes", env = "PREDICTION_HORIZON_MINUTES", default_value = "5")]
    pub horizon_minutes: u64,

    /// SQLite database holding predictions and diagnostic logs
    #[arg(
        long = "db-path",
        env = "TAROT_DB_PATH",
        default_value = "tarot.db",
        value_hint = ValueHint::FilePath
    )]
    pub db_path: PathBuf,

    /// Directory with `template.png` and the `cards/` artwork
    #[arg(
        long = "assets-dir",
        env = "TAROT_ASSETS_DIR",
        default_value = "images",
        value_hint = ValueHint::DirPath
    )]
    pub assets_dir: PathBuf,

    /// Where rendered spread images are written
    #[arg(
        long = "images-dir",
        env = "GENERATED_IMAGES_DIR",
        default_value = "generatedImages",
        value_hint = ValueHint::DirPath
    )]
    pub images_dir: PathBuf,

    /// Number of cycles to execute
    #[arg(
        short = 'r',
        long = "rounds",
        env = "AGENT_ROUNDS",
        default_value = "1"
    )]
    pub rounds: usize,

    /// Delay between rounds in seconds (0 = no delay)
    #[arg(
        short = 'd',
        long = "round-delay",
        env = "AGENT_ROUND_DELAY",
        default_value = "0"
    )]
    pub round_delay: u64,

    /// Log posts instead of publishing them
    #[arg(long = "dry-run", env = "DRY_RUN", default_value = "false")]
    pub dry_run: bool,

    /// Also write logs to a timestamped file in this directory
    #[arg(long = "log-dir", env = "LOG_DIR", value_hint = ValueHint::DirPath)]
    pub log_dir: Option<PathBuf>,

    /// TweetScout API key; mention counts are skipped without it
    #[arg(long = "tweetscout-api-key", env = "TWEETSCOUT_API_KEY", hide_env_values = true)]
    pub tweetscout_api_key: Option<String>,

    /// Search query for mention counting
    #[arg(long = "tweet-query", env = "TWEET_QUERY", default_value = "$btc")]
    pub tweet_query: String,

    /// Only count mentions from the last N minutes
    #[arg(long = "tweet-last-minutes", env = "TWEET_LAST_MINUTES", default_value = "5")]
    pub tweet_last_minutes: i64,

    /// Stop paging once this many mentions were counted
    #[arg(long = "max-tweets", env = "MAX_TWEETS_COUNT")]
    pub max_tweets: Option<u64>,
}

/// Parse flow from string.
fn parse_flow(s: &str) -> Result<Flow, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "bitcoin" | "btc" | "prediction" => Ok(Flow::Bitcoin),
        "reading" | "spread" | "market" => Ok(Flow::Reading),
        other => Err(format!(
            "invalid TAROT_FLOW '{}'; expected one of: bitcoin, reading",
            other
        )),
    }
}
