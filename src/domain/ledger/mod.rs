//! C7 types: the durable, per-tenant journal and derived ledgers. The
//! actual file I/O (atomic rewrite, JSONL append) lives in
//! `infrastructure::persistence`; this module only defines the shapes.

pub mod blacklist;
pub mod journal;
pub mod learned_params;
pub mod protected_coins;

pub use blacklist::Blacklist;
pub use journal::{fifo_match, TradeJournalEntry, TradePair, TradeSide};
pub use learned_params::{LearnedParamDefaults, LearnedParams, LearnedParamsRecord};
pub use protected_coins::ProtectedCoins;
