//! The orchestration layer: everything that drives the pure domain types
//! through real time, real I/O and real concurrency. Nothing in here
//! computes a trading decision itself — it calls into `domain` for that
//! and only owns sequencing, persistence timing, and task lifecycle.

pub mod context;
pub mod executor;
pub mod learning;
pub mod strategy;
pub mod supervisor;
pub mod sync;
pub mod symbols;
pub mod trading_loop;

/// Wall-clock milliseconds since the epoch. The one place the
/// application layer touches real time, so every pure function below it
/// stays a plain `fn(..., now_ms: i64, ...)`.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
