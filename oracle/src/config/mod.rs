//! Explicit configuration threaded into each pipeline component.
//!
//! Nothing below reads the environment on its own; [`OracleConfig::from_env`]
//! is the single place where env vars turn into settings.

mod load;

use crate::ledger::ReconcilePolicy;
use crate::providers::SizeClass;
use derive_builder::Builder;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_VERDICT_MAX_CHARS: usize = 260;
pub const DEFAULT_PRICE_TOLERANCE: f64 = 0.002;
/// Farcaster's cast limit.
pub const DEFAULT_POST_MAX_LENGTH: usize = 320;
pub const DEFAULT_MARKET_REFRESH_MINUTES: u64 = 5;
pub const DEFAULT_NEW_TOKENS_CHANCE: f64 = 0.3;
pub const DEFAULT_TOKENS_FOR_TWEET_COUNT: usize = 5;

#[derive(Builder, Clone, Debug)]
pub struct ModelConfig {
    /// Base URL of the model API, e.g. `https://api.openai.com`
    #[builder(setter(into))]
    pub api_base: String,
    /// The API key for authentication with the model API
    #[builder(setter(into))]
    pub api_key: String,
    /// Model used for [`SizeClass::Small`] requests
    #[builder(setter(into))]
    pub small_model: String,
    /// Model used for [`SizeClass::Large`] requests
    #[builder(setter(into))]
    pub large_model: String,
    #[builder(default = "1024")]
    pub max_tokens: u32,
    #[builder(default = "120")]
    pub timeout_secs: u64,
}

impl ModelConfig {
    pub fn builder() -> ModelConfigBuilder {
        ModelConfigBuilder::default()
    }
}

/// Bounds and constraints for one generate-and-validate loop.
#[derive(Builder, Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    #[builder(default = "DEFAULT_MAX_ATTEMPTS")]
    pub max_attempts: usize,
    /// At least one of these must appear (case-insensitive) when non-empty.
    #[builder(default)]
    pub required_substrings: Vec<String>,
    #[builder(default)]
    pub size_class: SizeClass,
    /// Write rejected attempts to the diagnostic log.
    #[builder(default = "true")]
    pub log_attempts: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            required_substrings: Vec::new(),
            size_class: SizeClass::default(),
            log_attempts: true,
        }
    }
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_required<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_substrings = words.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Builder, Clone, Debug)]
pub struct VerdictConfig {
    /// Hard ceiling communicated to the model for the final post.
    #[builder(default = "DEFAULT_VERDICT_MAX_CHARS")]
    pub max_chars: usize,
    #[builder(default = "DEFAULT_MAX_ATTEMPTS")]
    pub max_attempts: usize,
    /// Tokens that introduce the verdict section.
    #[builder(default = "default_markers()")]
    pub markers: Vec<String>,
    /// Buy-side / sell-side keywords the verdict must carry.
    #[builder(default = "default_actions()")]
    pub actions: Vec<String>,
}

fn default_markers() -> Vec<String> {
    vec!["verdict".to_string(), "tldr".to_string()]
}

fn default_actions() -> Vec<String> {
    vec!["buy".to_string(), "sell".to_string()]
}

impl Default for VerdictConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_VERDICT_MAX_CHARS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            markers: default_markers(),
            actions: default_actions(),
        }
    }
}

impl VerdictConfig {
    pub fn builder() -> VerdictConfigBuilder {
        VerdictConfigBuilder::default()
    }

    pub fn required_substrings(&self) -> Vec<String> {
        self.markers.iter().chain(&self.actions).cloned().collect()
    }
}

#[derive(Builder, Clone, Debug)]
pub struct LedgerConfig {
    /// Maximum relative error for a price claim to count as correct.
    #[builder(default = "DEFAULT_PRICE_TOLERANCE")]
    pub tolerance_fraction: f64,
    #[builder(default)]
    pub policy: ReconcilePolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            tolerance_fraction: DEFAULT_PRICE_TOLERANCE,
            policy: ReconcilePolicy::default(),
        }
    }
}

impl LedgerConfig {
    pub fn builder() -> LedgerConfigBuilder {
        LedgerConfigBuilder::default()
    }
}

#[derive(Builder, Clone, Debug)]
pub struct PostConfig {
    /// Character budget of the published post.
    #[builder(default = "DEFAULT_POST_MAX_LENGTH")]
    pub max_length: usize,
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_POST_MAX_LENGTH,
        }
    }
}

impl PostConfig {
    pub fn builder() -> PostConfigBuilder {
        PostConfigBuilder::default()
    }
}

/// Token board selection and the thresholds new DEX listings must pass.
#[derive(Builder, Clone, Debug, PartialEq)]
pub struct TokenScanConfig {
    /// Probability of reading only the biggest 24h movers, with mentions.
    #[builder(default = "DEFAULT_NEW_TOKENS_CHANCE")]
    pub new_tokens_chance: f64,
    /// How many movers are kept (and mention-counted) in that case.
    #[builder(default = "DEFAULT_TOKENS_FOR_TWEET_COUNT")]
    pub tokens_for_tweet_count: usize,
    #[builder(default = "100_000.0")]
    pub min_market_cap: f64,
    /// Compared against the largest of the m5/h1/h6/h24 volumes.
    #[builder(default = "10_000.0")]
    pub min_volume: f64,
    #[builder(default = "1.0")]
    pub min_age_hours: f64,
    #[builder(default = "72.0")]
    pub max_age_hours: f64,
    /// How long a formatted board stays fresh.
    #[builder(default = "Duration::from_secs(DEFAULT_MARKET_REFRESH_MINUTES * 60)")]
    pub refresh: Duration,
}

impl Default for TokenScanConfig {
    fn default() -> Self {
        Self {
            new_tokens_chance: DEFAULT_NEW_TOKENS_CHANCE,
            tokens_for_tweet_count: DEFAULT_TOKENS_FOR_TWEET_COUNT,
            min_market_cap: 100_000.0,
            min_volume: 10_000.0,
            min_age_hours: 1.0,
            max_age_hours: 72.0,
            refresh: Duration::from_secs(DEFAULT_MARKET_REFRESH_MINUTES * 60),
        }
    }
}

impl TokenScanConfig {
    pub fn builder() -> TokenScanConfigBuilder {
        TokenScanConfigBuilder::default()
    }
}

#[derive(Builder, Clone, Debug)]
pub struct OracleConfig {
    #[builder(default)]
    pub retry: RetryPolicy,
    #[builder(default)]
    pub verdict: VerdictConfig,
    #[builder(default)]
    pub ledger: LedgerConfig,
    #[builder(default)]
    pub post: PostConfig,
    #[builder(default)]
    pub tokens: TokenScanConfig,
    /// How long a fetched market snapshot stays fresh.
    #[builder(default = "Duration::from_secs(DEFAULT_MARKET_REFRESH_MINUTES * 60)")]
    pub market_refresh: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            verdict: VerdictConfig::default(),
            ledger: LedgerConfig::default(),
            post: PostConfig::default(),
            tokens: TokenScanConfig::default(),
            market_refresh: Duration::from_secs(DEFAULT_MARKET_REFRESH_MINUTES * 60),
        }
    }
}

impl OracleConfig {
    pub fn builder() -> OracleConfigBuilder {
        OracleConfigBuilder::default()
    }
}
