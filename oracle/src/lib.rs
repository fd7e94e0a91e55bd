mod cards;
mod config;
mod error;
mod generation;
mod ledger;
mod market;
mod normalize;
mod providers;
mod verdict;

pub use cards::{
    draw, draw_with,
    layout::{Placement, SpreadLayout},
    render::SpreadRenderer,
    try_draw_with, Card, Hand, MajorArcana, Rank, Suit, HAND_SIZE,
};
pub use config::{
    LedgerConfig, ModelConfig, OracleConfig, PostConfig, RetryPolicy, TokenScanConfig,
    VerdictConfig,
};
pub use error::{OracleError, OracleResult};
pub use generation::{
    check_constraints, retry_with_validation,
    structured::{extract_json, parse_payload, StructuredPayload},
    ConstrainedGenerator, GenerationAttempt, GenerationOutcome,
};
pub use ledger::{
    judge_direction, judge_price, Correctness, DiagnosticLog, Direction, LedgerOutcome,
    NewPrediction, PredictionClaim, PredictionLedger, PredictionRecord, PredictionStore,
    ReconcilePolicy, Reconciliation, SqliteStore,
};
pub use market::{
    format_snapshot, group_thousands,
    tokens::{
        format_board, format_new_token, mention_query, select_movers, BoardChoice, NewToken,
        NewTokenSource, TokenBoard, TokenEntry, TopTokenSource,
    },
    CachedSource, MarketDataSource, MarketSnapshot, MentionCounter,
};
pub use normalize::{clean_post, split_numbered_lines, truncate, ELLIPSIS};
pub use providers::{message::ChatMessage, HttpTextGenerator, SizeClass, TextGenerator};
pub use verdict::VerdictEnforcer;
