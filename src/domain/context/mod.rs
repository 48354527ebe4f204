//! C2 market-context providers. Every provider here does its own I/O
//! (network fetch or in-memory ring buffer) behind a 2-15 minute TTL and
//! must degrade to a neutral fragment on failure rather than propagate an
//! error — the compositor treats "no data" the same as "no opinion".

pub mod btc_leader;
pub mod funding_rate;
pub mod kimchi_premium;
pub mod market_mode;
pub mod sentiment;
pub mod whale_flow;

pub use btc_leader::{BtcLeaderClassification, BtcLeaderTracker};
pub use market_mode::{MarketMode, MarketModeProfile, compute_market_mode};
pub use sentiment::{SentimentInputs, SentimentSnapshot, merge_sentiment};

/// Uniform output of every C2 provider (spec §4.2): a bounded nudge toward
/// buying or selling plus the human-readable reason behind it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextFragment {
    pub buy_boost: f64,
    pub sell_boost: f64,
    pub reason: &'static str,
}

impl ContextFragment {
    pub const fn neutral() -> Self {
        ContextFragment { buy_boost: 0.0, sell_boost: 0.0, reason: "no_data" }
    }
}

impl Default for ContextFragment {
    fn default() -> Self {
        Self::neutral()
    }
}
