//! One prediction cycle, end to end.
//!
//! Each run:
//! 1. Fetches the market snapshot (and mention count, when configured)
//! 2. Draws a hand and builds the flow's prompt
//! 3. Generates and validates the model output
//! 4. Scores the previous call and records the new one (Bitcoin flow)
//! 5. Renders the spread image (reading flow)
//! 6. Publishes the normalized post, or logs it in dry-run mode

use crate::cli::Flow;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tarot_oracle::{
    clean_post, draw, format_snapshot, split_numbered_lines, truncate, Card, ConstrainedGenerator,
    DiagnosticLog, Hand, MarketDataSource, MarketSnapshot, MentionCounter, OracleConfig,
    PredictionClaim, PredictionLedger, PredictionStore, SpreadLayout, SpreadRenderer,
    TextGenerator, TokenBoard, VerdictEnforcer,
};
use tracing::{debug, error, info, warn};

use super::output::BitcoinCall;
use super::prompt::{build_bitcoin_prompt, build_reading_prompt};

/// Per-run settings taken from the command line.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub flow: Flow,
    pub coin_id: String,
    pub horizon_minutes: u64,
    pub tweet_query: String,
    pub assets_dir: PathBuf,
    /// Where rendered spread images are written.
    pub images_dir: PathBuf,
    pub dry_run: bool,
}

/// A finished post and what it was drawn from.
#[derive(Debug, Clone, Serialize)]
pub struct Publication {
    pub flow: Flow,
    pub text: String,
    pub cards: Vec<Card>,
    /// Rendered spread attached to the post.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
}

#[derive(Debug)]
pub enum CycleReport {
    Published(Publication),
    Skipped(String),
}

pub struct PredictionCycle {
    settings: CycleSettings,
    config: OracleConfig,
    market: Arc<dyn MarketDataSource>,
    mentions: Option<Arc<dyn MentionCounter>>,
    tokens: Option<TokenBoard>,
    generator: ConstrainedGenerator,
    verdict: VerdictEnforcer,
    ledger: PredictionLedger,
    log: Arc<dyn DiagnosticLog>,
    renderer: SpreadRenderer,
}

impl PredictionCycle {
    pub fn new(
        settings: CycleSettings,
        config: OracleConfig,
        text: Arc<dyn TextGenerator>,
        market: Arc<dyn MarketDataSource>,
        store: Arc<dyn PredictionStore>,
        log: Arc<dyn DiagnosticLog>,
    ) -> Self {
        let generator = ConstrainedGenerator::new(text).with_diagnostics(log.clone());

        // The verdict is the post's last line; it must survive post truncation.
        let mut verdict_config = config.verdict.clone();
        verdict_config.max_chars = verdict_config.max_chars.min(config.post.max_length);
        let verdict = VerdictEnforcer::new(generator.clone(), verdict_config);

        let ledger = PredictionLedger::new(store, config.ledger.clone());
        let renderer = SpreadRenderer::new(SpreadLayout::new(&settings.assets_dir));

        Self {
            settings,
            config,
            market,
            mentions: None,
            tokens: None,
            generator,
            verdict,
            ledger,
            log,
            renderer,
        }
    }

    pub fn with_mentions(mut self, mentions: Arc<dyn MentionCounter>) -> Self {
        self.mentions = Some(mentions);
        self
    }

    /// Add a multi-token board to the reading flow's market info.
    pub fn with_token_board(mut self, tokens: TokenBoard) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Run one cycle. Failures end in a log line and a `Skipped` report.
    pub async fn run(&self) -> CycleReport {
        let result = match self.settings.flow {
            Flow::Bitcoin => self.bitcoin_round().await,
            Flow::Reading => self.reading_round().await,
        };

        match result {
            Ok(report) => report,
            Err(err) => {
                error!("Cycle failed: {err:#}");
                CycleReport::Skipped(format!("{err:#}"))
            }
        }
    }

    async fn bitcoin_round(&self) -> Result<CycleReport> {
        let Some(snapshot) = self.market_snapshot().await else {
            return Ok(CycleReport::Skipped("no market data".to_string()));
        };

        let hand = self.draw_hand().await;
        let prompt = build_bitcoin_prompt(
            &hand,
            &format_snapshot(&snapshot),
            self.settings.horizon_minutes,
        );

        let Some(call) = self
            .generator
            .generate_structured(&prompt, &self.config.retry, BitcoinCall::parse)
            .await
        else {
            if let Err(err) = self.ledger.reconcile(snapshot.current_price).await {
                error!(error = %err, "Failed to check last prediction");
            }
            return Ok(CycleReport::Skipped("no usable prediction".to_string()));
        };

        info!(direction = %call.direction, target_price = ?call.target_price, "prediction generated");

        let draft = split_numbered_lines(&call.prediction);
        let verdict = self.verdict.enforce_verdict(&draft).await;

        let claim = PredictionClaim {
            direction: Some(call.direction),
            predicted_price: call.target_price,
        };
        let outcome = self
            .ledger
            .record_and_reconcile(claim, snapshot.current_price, verdict.as_deref())
            .await;
        debug!(?outcome, "ledger updated");

        let Some(verdict) = verdict else {
            return Ok(CycleReport::Skipped("no verdict".to_string()));
        };

        let publication = Publication {
            flow: Flow::Bitcoin,
            text: truncate(&clean_post(&verdict), self.config.post.max_length),
            cards: hand.cards().to_vec(),
            image: None,
        };
        self.publish(publication)
    }

    async fn reading_round(&self) -> Result<CycleReport> {
        let Some(snapshot) = self.market_snapshot().await else {
            return Ok(CycleReport::Skipped("no market data".to_string()));
        };

        let mut market_info = format_snapshot(&snapshot);
        if let Some(tokens) = &self.tokens {
            match tokens.reading().await {
                Ok(board) => {
                    market_info.push_str("\n\n");
                    market_info.push_str(&board);
                }
                Err(err) => warn!("Token board unavailable: {err:#}"),
            }
        }

        let hand = self.draw_hand().await;
        let max_length = self.config.post.max_length;
        let prompt = build_reading_prompt(&hand, &market_info, max_length);

        let Some(reading) = self
            .generator
            .generate_with_retry(&prompt, &self.config.retry)
            .await
        else {
            return Ok(CycleReport::Skipped("no usable reading".to_string()));
        };

        let publication = Publication {
            flow: Flow::Reading,
            text: truncate(&clean_post(&reading), max_length),
            cards: hand.cards().to_vec(),
            image: self.render_spread(&hand),
        };
        self.publish(publication)
    }

    /// Written spread image, or `None` (post goes out without it).
    fn render_spread(&self, hand: &Hand) -> Option<PathBuf> {
        let missing = self.renderer.layout().missing_assets(hand);
        if !missing.is_empty() {
            warn!(?missing, "spread artwork is missing; posting without an image");
            return None;
        }

        match self.renderer.write_png(hand, &self.settings.images_dir) {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(error = %err, "Failed to render spread image");
                None
            }
        }
    }

    /// Market snapshot with mentions joined in. `None` skips the cycle.
    async fn market_snapshot(&self) -> Option<MarketSnapshot> {
        let coin_id = self.settings.coin_id.as_str();

        let (snapshot, mentions) = match &self.mentions {
            Some(counter) => {
                let (snapshot, mentions) = tokio::join!(
                    self.market.snapshot(coin_id),
                    counter.count_mentions(&self.settings.tweet_query)
                );
                (snapshot, Some(mentions))
            }
            None => (self.market.snapshot(coin_id).await, None),
        };

        let mut snapshot = match snapshot {
            Ok(snapshot) => snapshot,
            Err(err) => {
                error!("Failed to get market info for {coin_id}: {err:#}");
                return None;
            }
        };

        match mentions {
            Some(Ok(count)) => snapshot.tweet_mentions = Some(count),
            Some(Err(err)) => warn!("Failed to count tweet mentions: {err:#}"),
            None => {}
        }

        Some(snapshot)
    }

    async fn draw_hand(&self) -> Hand {
        let hand = draw();
        debug!("Drawn cards:\n{}", hand);
        if let Err(err) = self
            .log
            .append(&format!("cardsDescription: {}", hand.describe()))
            .await
        {
            warn!(error = %err, "failed to write diagnostic log entry");
        }
        hand
    }

    fn publish(&self, publication: Publication) -> Result<CycleReport> {
        if self.settings.dry_run {
            info!(flow = %publication.flow, "[dry-run] would post:\n{}", publication.text);
        } else {
            let line =
                serde_json::to_string(&publication).context("Failed to serialize publication")?;
            println!("{line}");
            info!(flow = %publication.flow, chars = publication.text.chars().count(), "post published");
        }

        Ok(CycleReport::Published(publication))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, bail};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tarot_oracle::{
        Correctness, Direction, NewToken, NewTokenSource, SizeClass, SqliteStore,
        TokenScanConfig, TopTokenSource,
    };

    struct FixedMarket {
        price: Mutex<Option<f64>>,
    }

    impl FixedMarket {
        fn at(price: f64) -> Self {
            Self {
                price: Mutex::new(Some(price)),
            }
        }

        fn down() -> Self {
            Self {
                price: Mutex::new(None),
            }
        }

        fn set(&self, price: f64) {
            *self.price.lock().unwrap() = Some(price);
        }
    }

    #[async_trait]
    impl MarketDataSource for FixedMarket {
        async fn snapshot(&self, coin_id: &str) -> Result<MarketSnapshot> {
            let Some(price) = *self.price.lock().unwrap() else {
                bail!("CoinGecko rate limited");
            };
            Ok(serde_json::from_value(serde_json::json!({
                "id": coin_id,
                "symbol": "btc",
                "name": "Bitcoin",
                "current_price": price,
                "market_cap_rank": 1,
            }))?)
        }
    }

    /// Pops queued responses; errors once the queue is empty.
    #[derive(Default)]
    struct QueuedGenerator {
        responses: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl QueuedGenerator {
        fn push(&self, response: &str) {
            self.responses.lock().unwrap().push_back(response.to_string());
        }
    }

    #[async_trait]
    impl TextGenerator for QueuedGenerator {
        async fn generate(&self, prompt: &str, _size: SizeClass) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow!("model unavailable"))
        }
    }

    struct FixedMentions(u64);

    #[async_trait]
    impl MentionCounter for FixedMentions {
        async fn count_mentions(&self, _query: &str) -> Result<u64> {
            Ok(self.0)
        }
    }

    struct FixedTop;

    #[async_trait]
    impl TopTokenSource for FixedTop {
        async fn top_tokens(&self) -> Result<Vec<MarketSnapshot>> {
            bail!("CoinGecko rate limited")
        }
    }

    struct FixedNew;

    #[async_trait]
    impl NewTokenSource for FixedNew {
        async fn new_tokens(&self) -> Result<Vec<NewToken>> {
            Ok(vec![NewToken {
                name: "Dog Wif Hat".to_string(),
                symbol: "wif".to_string(),
                price_usd: 2.5,
                volume_24h: 1_000_000.0,
                market_cap: 2_500_000_000.0,
                price_change_24h: 12.0,
                tweet_mentions: None,
            }])
        }
    }

    fn settings(flow: Flow, assets_dir: PathBuf, images_dir: PathBuf) -> CycleSettings {
        CycleSettings {
            flow,
            coin_id: "bitcoin".to_string(),
            horizon_minutes: 5,
            tweet_query: "$btc".to_string(),
            assets_dir,
            images_dir,
            dry_run: true,
        }
    }

    fn cycle(
        flow: Flow,
        market: Arc<FixedMarket>,
        text: Arc<QueuedGenerator>,
        store: Arc<SqliteStore>,
    ) -> PredictionCycle {
        PredictionCycle::new(
            settings(
                flow,
                PathBuf::from("missing-artwork"),
                PathBuf::from("missing-artwork/generatedImages"),
            ),
            OracleConfig::default(),
            text,
            market,
            store.clone(),
            store,
        )
    }

    const CALL_UP: &str = r#"{"direction": "UP", "prediction": "$btc rises: 1. the sun. 2. the star. 3. the world."}"#;

    #[tokio::test]
    async fn test_bitcoin_round_records_and_reconciles() {
        let market = Arc::new(FixedMarket::at(64_000.0));
        let text = Arc::new(QueuedGenerator::default());
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let cycle = cycle(Flow::Bitcoin, market.clone(), text.clone(), store.clone());

        text.push(CALL_UP);
        text.push("$btc rises:\n1. the sun.\n2. the star.\n3. the world.\nVerdict: BUY before the bell.");
        let report = cycle.run().await;

        let publication = match report {
            CycleReport::Published(publication) => publication,
            other => panic!("expected a publication, got {other:?}"),
        };
        assert!(publication.text.ends_with("verdict: buy before the bell."));
        assert_eq!(publication.cards.len(), 3);

        market.set(64_500.0);
        text.push(CALL_UP);
        text.push("tldr: sell into strength");
        cycle.run().await;

        let rows = store.predictions().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].direction, Some(Direction::Up));
        assert_eq!(rows[0].rightness, Correctness::Correct);
        assert_eq!(rows[0].reconciled_price, Some(64_500.0));
        assert_eq!(rows[1].rightness, Correctness::NotChecked);
        assert_eq!(rows[1].content, "tldr: sell into strength");
    }

    #[tokio::test]
    async fn test_over_budget_verdict_is_regenerated_before_posting() {
        let market = Arc::new(FixedMarket::at(64_000.0));
        let text = Arc::new(QueuedGenerator::default());
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let cycle = cycle(Flow::Bitcoin, market, text.clone(), store.clone());

        let rambling = format!(
            "$btc rises:\n{}\nverdict: buy now.",
            "1. the sun warms thin order books and the bid keeps stacking. ".repeat(6)
        );
        text.push(CALL_UP);
        text.push(&rambling);
        text.push("$btc rises:\n1. the sun.\n2. the star.\nverdict: buy now.");
        let report = cycle.run().await;

        let publication = match report {
            CycleReport::Published(publication) => publication,
            other => panic!("expected a publication, got {other:?}"),
        };
        assert!(publication.text.ends_with("verdict: buy now."));
        assert!(publication.text.chars().count() <= 260);
        assert_eq!(text.calls.load(Ordering::SeqCst), 3);
        assert!(store.predictions().unwrap()[0].content.ends_with("verdict: buy now."));
    }

    #[tokio::test]
    async fn test_verdict_budget_follows_shorter_post_limit() {
        let market = Arc::new(FixedMarket::at(64_000.0));
        let text = Arc::new(QueuedGenerator::default());
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut config = OracleConfig::default();
        config.post.max_length = 40;
        let cycle = PredictionCycle::new(
            settings(Flow::Bitcoin, PathBuf::from("missing-artwork"), PathBuf::from("out")),
            config,
            text.clone(),
            market,
            store.clone(),
            store,
        );

        text.push(CALL_UP);
        text.push("$btc rises with the sun and the star.\nverdict: buy now.");
        text.push("the sun shines.\nverdict: buy now.");
        let report = cycle.run().await;

        let publication = match report {
            CycleReport::Published(publication) => publication,
            other => panic!("expected a publication, got {other:?}"),
        };
        assert_eq!(publication.text, "the sun shines.\nverdict: buy now.");
    }

    #[tokio::test]
    async fn test_failed_generation_still_reconciles() {
        let market = Arc::new(FixedMarket::at(64_000.0));
        let text = Arc::new(QueuedGenerator::default());
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let cycle = cycle(Flow::Bitcoin, market.clone(), text.clone(), store.clone());

        text.push(CALL_UP);
        text.push("verdict: buy");
        cycle.run().await;

        market.set(63_000.0);
        let report = cycle.run().await;

        assert!(matches!(report, CycleReport::Skipped(_)));
        let rows = store.predictions().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rightness, Correctness::Incorrect);
        assert!(!store.logs().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_verdict_records_nothing() {
        let market = Arc::new(FixedMarket::at(64_000.0));
        let text = Arc::new(QueuedGenerator::default());
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let cycle = cycle(Flow::Bitcoin, market, text.clone(), store.clone());

        text.push(CALL_UP);
        for _ in 0..3 {
            text.push("the cards are silent");
        }
        let report = cycle.run().await;

        assert!(matches!(report, CycleReport::Skipped(reason) if reason == "no verdict"));
        assert!(store.predictions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_market_failure_skips_before_generation() {
        let text = Arc::new(QueuedGenerator::default());
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let cycle = cycle(Flow::Bitcoin, Arc::new(FixedMarket::down()), text.clone(), store);

        let report = cycle.run().await;

        assert!(matches!(report, CycleReport::Skipped(reason) if reason == "no market data"));
        assert_eq!(text.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reading_round_without_artwork_posts_text_only() {
        let market = Arc::new(FixedMarket::at(64_000.0));
        let text = Arc::new(QueuedGenerator::default());
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let cycle = cycle(Flow::Reading, market, text.clone(), store)
            .with_mentions(Arc::new(FixedMentions(12)));

        let long_reading = format!("\"the deck speaks.\\n{}\"", "the moon hides much. ".repeat(30));
        text.push(&long_reading);
        let report = cycle.run().await;

        let publication = match report {
            CycleReport::Published(publication) => publication,
            other => panic!("expected a publication, got {other:?}"),
        };
        assert!(publication.text.chars().count() <= 320);
        assert_eq!(publication.text, "the deck speaks.");
        assert_eq!(publication.image, None);
        assert!(text.prompts.lock().unwrap()[0].contains("Tweet Mentions: 12"));
    }

    /// Solid-colour template and artwork for every card in the deck.
    fn write_artwork(dir: &std::path::Path) {
        use image::{Rgba, RgbaImage};
        use strum::VariantArray;
        use tarot_oracle::{MajorArcana, Rank, Suit};

        let layout = SpreadLayout::new(dir);
        RgbaImage::from_pixel(4, 4, Rgba([10, 10, 40, 255]))
            .save(layout.template_path())
            .unwrap();

        let majors = MajorArcana::VARIANTS
            .iter()
            .map(|value| Card::Major { value: *value });
        let minors = Suit::VARIANTS.iter().flat_map(|suit| {
            Rank::VARIANTS.iter().map(move |value| Card::Minor {
                suit: *suit,
                value: *value,
            })
        });
        for card in majors.chain(minors) {
            let path = layout.asset_path(&card);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            RgbaImage::from_pixel(2, 3, Rgba([200, 180, 20, 255]))
                .save(&path)
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_reading_round_attaches_rendered_spread() {
        let assets = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_artwork(assets.path());

        let market = Arc::new(FixedMarket::at(64_000.0));
        let text = Arc::new(QueuedGenerator::default());
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let cycle = PredictionCycle::new(
            settings(
                Flow::Reading,
                assets.path().to_path_buf(),
                out.path().join("generatedImages"),
            ),
            OracleConfig::default(),
            text.clone(),
            market,
            store.clone(),
            store,
        );

        text.push("the star rises over $btc.");
        let report = cycle.run().await;

        let publication = match report {
            CycleReport::Published(publication) => publication,
            other => panic!("expected a publication, got {other:?}"),
        };
        let image = publication.image.expect("spread image attached");
        assert!(image.starts_with(out.path().join("generatedImages")));
        assert!(image.is_file());
    }

    #[tokio::test]
    async fn test_reading_prompt_carries_token_board() {
        let market = Arc::new(FixedMarket::at(64_000.0));
        let text = Arc::new(QueuedGenerator::default());
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let board = TokenBoard::new(
            Arc::new(FixedTop),
            Arc::new(FixedNew),
            TokenScanConfig::default(),
        )
        .with_mentions(Arc::new(FixedMentions(7)));
        let cycle = cycle(Flow::Reading, market, text.clone(), store).with_token_board(board);

        text.push("the wheel turns for $wif.");
        let report = cycle.run().await;

        assert!(matches!(report, CycleReport::Published(_)));
        let prompts = text.prompts.lock().unwrap();
        assert!(prompts[0].contains("Tokens data:"));
        assert!(prompts[0].contains("Dog Wif Hat ($wif)"));
    }
}
