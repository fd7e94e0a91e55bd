use crate::cli::AgentArgs;
use crate::core::cycle::{CycleReport, CycleSettings, PredictionCycle};
use crate::cli::Flow;
use crate::tools::{CoinGeckoTool, DexScreenerTool, TweetScoutTool};
use crate::utils::logging::init_logging;
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tarot_oracle::{
    CachedSource, HttpTextGenerator, MentionCounter, ModelConfig, OracleConfig, SqliteStore,
    TokenBoard,
};
use tracing::{info, warn};

mod cli;
mod core;
mod tools;
mod utils;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = AgentArgs::parse();
    let _log_guard = init_logging(args.log_dir.as_deref())?;

    let config = OracleConfig::from_env().context("Failed to load oracle configuration")?;

    let model = ModelConfig::builder()
        .api_base(args.api_base.clone())
        .api_key(args.api_key.clone())
        .small_model(args.small_model.clone())
        .large_model(args.large_model.clone())
        .build()
        .context("Failed to build model configuration")?;
    let text = Arc::new(HttpTextGenerator::new(model)?);

    let store = Arc::new(
        SqliteStore::open_at(&args.db_path)
            .with_context(|| format!("Failed to open database {}", args.db_path.display()))?,
    );
    let coingecko = CoinGeckoTool::new()?;
    let market = Arc::new(CachedSource::new(coingecko.clone(), config.market_refresh));
    let tokens = config.tokens.clone();

    let settings = CycleSettings {
        flow: args.flow,
        coin_id: args.coin_id.clone(),
        horizon_minutes: args.horizon_minutes,
        tweet_query: args.tweet_query.clone(),
        assets_dir: args.assets_dir.clone(),
        images_dir: args.images_dir.clone(),
        dry_run: args.dry_run,
    };

    let mut cycle = PredictionCycle::new(settings, config, text, market, store.clone(), store);
    let mentions: Option<Arc<dyn MentionCounter>> = args.tweetscout_api_key.as_ref().map(|key| {
        Arc::new(TweetScoutTool::new(
            key.clone(),
            args.tweet_last_minutes,
            args.max_tweets,
        )) as Arc<dyn MentionCounter>
    });
    if let Some(mentions) = &mentions {
        cycle = cycle.with_mentions(mentions.clone());
    }

    if args.flow == Flow::Reading {
        let mut board = TokenBoard::new(
            Arc::new(coingecko),
            Arc::new(DexScreenerTool::new(tokens.clone())?),
            tokens,
        );
        if let Some(mentions) = mentions {
            board = board.with_mentions(mentions);
        }
        cycle = cycle.with_token_board(board);
    }

    info!(
        flow = %args.flow,
        rounds = args.rounds,
        dry_run = args.dry_run,
        "Starting tarot agent"
    );

    let delay = (args.round_delay > 0).then(|| Duration::from_secs(args.round_delay));
    let mut published = 0usize;

    for round in 1..=args.rounds {
        info!("=== Round {}/{} ===", round, args.rounds);

        match cycle.run().await {
            CycleReport::Published(_) => published += 1,
            CycleReport::Skipped(reason) => warn!(round, "Round skipped: {}", reason),
        }

        if let Some(delay) = delay.filter(|_| round < args.rounds) {
            info!("Waiting {}s before next round", delay.as_secs());
            tokio::time::sleep(delay).await;
        }
    }

    info!(published, rounds = args.rounds, "Agent finished");

    Ok(())
}
