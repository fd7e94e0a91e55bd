use super::{
    LedgerConfig, OracleConfig, PostConfig, RetryPolicy, TokenScanConfig, VerdictConfig,
    DEFAULT_MARKET_REFRESH_MINUTES, DEFAULT_MAX_ATTEMPTS, DEFAULT_NEW_TOKENS_CHANCE,
    DEFAULT_POST_MAX_LENGTH, DEFAULT_PRICE_TOLERANCE, DEFAULT_TOKENS_FOR_TWEET_COUNT,
    DEFAULT_VERDICT_MAX_CHARS,
};
use crate::ledger::ReconcilePolicy;
use anyhow::{bail, Context, Result};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

impl OracleConfig {
    /// Load settings from the environment (and `.env`, if present).
    ///
    /// Optional:
    /// - `TAROT_MAX_ATTEMPTS`: attempts per generation loop (default: 3)
    /// - `VERDICT_MAX_CHARS`: verdict post budget (default: 260)
    /// - `VERDICT_MAX_ATTEMPTS`: attempts for the verdict pass (default: 3)
    /// - `PRICE_TOLERANCE`: relative error accepted for price claims (default: 0.002)
    /// - `POST_MAX_LENGTH`: published post budget (default: 320)
    /// - `RECONCILE_POLICY`: `latest` or `all-pending` (default: latest)
    /// - `BITCOIN_INFO_REFETCH_INTERVAL`: market snapshot freshness in minutes (default: 5)
    /// - `NEW_TOKENS_CHANCE`, `TOKENS_FOR_TWEET_COUNT`, `MIN_MARKET_CAP`, `MIN_VOLUME`,
    ///   `MIN_AGE`, `MAX_AGE` (hours), `REFETCH_INTERVAL` (minutes): token board
    ///   settings, see [`TokenScanConfig`]
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let max_attempts = load_or("TAROT_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        let verdict_attempts = load_or("VERDICT_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        if max_attempts == 0 || verdict_attempts == 0 {
            bail!("attempt counts must be at least 1");
        }

        let tolerance = load_or("PRICE_TOLERANCE", DEFAULT_PRICE_TOLERANCE)?;
        if !tolerance.is_finite() || tolerance < 0.0 {
            bail!("PRICE_TOLERANCE must be a non-negative number, got {tolerance}");
        }

        let refresh_minutes =
            load_or("BITCOIN_INFO_REFETCH_INTERVAL", DEFAULT_MARKET_REFRESH_MINUTES)?;

        let config = OracleConfig::builder()
            .retry(
                RetryPolicy::builder()
                    .max_attempts(max_attempts)
                    .build()
                    .context("Failed to build retry policy")?,
            )
            .verdict(
                VerdictConfig::builder()
                    .max_chars(load_or("VERDICT_MAX_CHARS", DEFAULT_VERDICT_MAX_CHARS)?)
                    .max_attempts(verdict_attempts)
                    .build()
                    .context("Failed to build verdict configuration")?,
            )
            .ledger(
                LedgerConfig::builder()
                    .tolerance_fraction(tolerance)
                    .policy(load_or("RECONCILE_POLICY", ReconcilePolicy::default())?)
                    .build()
                    .context("Failed to build ledger configuration")?,
            )
            .post(
                PostConfig::builder()
                    .max_length(load_or("POST_MAX_LENGTH", DEFAULT_POST_MAX_LENGTH)?)
                    .build()
                    .context("Failed to build post configuration")?,
            )
            .tokens(load_tokens()?)
            .market_refresh(Duration::from_secs(refresh_minutes * 60))
            .build()
            .context("Failed to build oracle configuration")?;

        debug!(?config, "loaded oracle configuration");

        Ok(config)
    }
}

fn load_tokens() -> Result<TokenScanConfig> {
    let defaults = TokenScanConfig::default();

    let chance = load_or("NEW_TOKENS_CHANCE", DEFAULT_NEW_TOKENS_CHANCE)?;
    if !(0.0..=1.0).contains(&chance) {
        bail!("NEW_TOKENS_CHANCE must be between 0 and 1, got {chance}");
    }

    let min_age = load_or("MIN_AGE", defaults.min_age_hours)?;
    let max_age = load_or("MAX_AGE", defaults.max_age_hours)?;
    if min_age > max_age {
        bail!("MIN_AGE ({min_age}h) is greater than MAX_AGE ({max_age}h)");
    }

    let refetch_minutes = load_or("REFETCH_INTERVAL", DEFAULT_MARKET_REFRESH_MINUTES)?;

    TokenScanConfig::builder()
        .new_tokens_chance(chance)
        .tokens_for_tweet_count(load_or("TOKENS_FOR_TWEET_COUNT", DEFAULT_TOKENS_FOR_TWEET_COUNT)?)
        .min_market_cap(load_or("MIN_MARKET_CAP", defaults.min_market_cap)?)
        .min_volume(load_or("MIN_VOLUME", defaults.min_volume)?)
        .min_age_hours(min_age)
        .max_age_hours(max_age)
        .refresh(Duration::from_secs(refetch_minutes * 60))
        .build()
        .context("Failed to build token board configuration")
}

/// Parse `name` from the environment, falling back to `default` when unset or blank.
pub(crate) fn load_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match dotenvy::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid value for {name}: {raw}")),
        _ => Ok(default),
    }
}
