//! External data fetchers feeding the prediction cycle.

pub mod coingecko;
pub mod dexscreener;
pub mod tweetscout;

pub use coingecko::CoinGeckoTool;
pub use dexscreener::DexScreenerTool;
pub use tweetscout::TweetScoutTool;
