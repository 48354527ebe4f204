use rust_decimal::Decimal;
use thiserror::Error;

/// Errors from order placement and execution (C6). Exchange I/O failures
/// are logged and swallowed by the caller per spec; these variants cover
/// the cases that do reach the trading loop.
#[derive(Debug, Error)]
pub enum TradingError {
    #[error("insufficient balance: need {need} KRW, available {available} KRW")]
    InsufficientBalance { need: Decimal, available: Decimal },

    #[error("no open position for {symbol}")]
    PositionNotFound { symbol: String },

    #[error("order execution failed for {symbol}: {reason}")]
    ExecutionFailed { symbol: String, reason: String },

    #[error("sell attempts exhausted for {symbol} after {attempts} tries")]
    SellAttemptsExhausted { symbol: String, attempts: u32 },
}

/// A precedence-ordered rejection from the risk governor's `can_open`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RiskViolation {
    #[error("daily loss limit reached: {realized} KRW <= {limit} KRW")]
    DailyLossLimit { realized: Decimal, limit: Decimal },

    #[error("recovery cooldown active: within {pct:.0}% of daily loss limit")]
    RecoveryCooldown { pct: f64 },

    #[error("max daily loss percent breached: {pct:.2}%")]
    MaxDailyLossPct { pct: f64 },

    #[error("hourly trade cap reached: {count} buys in the last hour")]
    HourlyTradeCap { count: u32 },

    #[error("max open positions reached: {open}/{max}")]
    MaxOpenPositions { open: u32, max: u32 },

    #[error("{symbol} already holds a position")]
    AlreadyHeld { symbol: String },

    #[error("{symbol} sold within cooldown window")]
    SellCooldown { symbol: String },

    #[error("requested amount exceeds max position pct: {requested} KRW > {cap} KRW")]
    ExceedsMaxPositionPct { requested: Decimal, cap: Decimal },
}

/// Errors surfaced while reading or writing a tenant's on-disk ledger (C7).
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed json in {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("atomic rename failed for {path}: {source}")]
    AtomicWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the offline learning pass (C8).
#[derive(Debug, Error)]
pub enum LearningError {
    #[error("insufficient trade pairs: {pairs} < 30")]
    InsufficientData { pairs: usize },

    #[error("journal replay failed: {reason}")]
    ReplayFailed { reason: String },
}
