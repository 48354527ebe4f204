//! Per-tenant runtime context (spec §9 "singletons... replaced by an
//! explicit per-tenant context"). One [`TenantContext`] is built per
//! tenant by the supervisor (C10) and threaded into the trading loop
//! (C5), the executor (C6) and the dashboard façade (C11); nothing here
//! is global.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tokio::sync::broadcast;

use crate::domain::context::btc_leader::BtcLeaderTracker;
use crate::domain::context::market_mode::MarketMode;
use crate::domain::ledger::{Blacklist, LearnedParamsRecord, ProtectedCoins};
use crate::domain::market::regime::Regime;
use crate::domain::position::Position;
use crate::domain::ports::{ExchangeClient, NotificationSink};
use crate::domain::risk::RiskState;
use crate::domain::signal::{ComboStore, LossPatternRule, Signal};
use crate::domain::tenant::TenantConfig;
use crate::infrastructure::persistence::TenantStore;

use super::strategy::StrategyParams;

/// One broadcastable log line, mirroring the teacher's singleton-logger
/// hook generalized per spec §9 into a per-tenant broadcast channel: the
/// dashboard subscribes, the logger never references it back.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub ts_ms: i64,
    pub level: &'static str,
    pub message: String,
}

/// A completed (or synthetic) trade broadcast to the dashboard's WS feed
/// and any notification sink, alongside [`crate::domain::ports::TradeNotification`].
#[derive(Debug, Clone)]
pub struct TradeEvent {
    pub ts_ms: i64,
    pub symbol: String,
    pub side: &'static str,
    pub price: Decimal,
    pub quantity: Decimal,
    pub pnl_pct: Option<f64>,
    pub pnl_amount: Option<Decimal>,
    pub reason: String,
}

const LOG_RING_CAPACITY: usize = 200;
const PNL_MINUTE_WINDOW_MS: i64 = 48 * 3_600_000;

/// Everything the trading loop mutates on its own single-writer thread
/// each scan. Guarded by a single `parking_lot::RwLock` so the dashboard
/// can take an instant read-lock snapshot without ever blocking behind an
/// exchange call (those never happen while this lock is held).
pub struct TenantState {
    pub positions: HashMap<String, Position>,
    pub watched_symbols: Vec<String>,
    pub protected_coins: ProtectedCoins,
    pub buy_blacklist: Blacklist,
    pub risk_state: RiskState,
    pub combo_store: ComboStore,
    pub loss_rules: Vec<LossPatternRule>,
    pub learned: LearnedParamsRecord,
    pub scan_count: u64,
    pub last_symbol_refresh_ms: i64,
    pub btc_leader: BtcLeaderTracker,
    pub last_signals: HashMap<String, Signal>,
    pub today_sells: u32,
    pub today_wins: u32,
    pub last_loss_ts: Option<i64>,
    pub consecutive_losses: u32,
    pub pnl_minutes: VecDeque<(i64, f64)>,
    pub first_boot_seen: bool,
    pub log_ring: VecDeque<LogEvent>,
    pub market_mode: MarketMode,
    pub regime: Option<Regime>,
    pub running: bool,
    pub scalp_mode: bool,
}

impl TenantState {
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            positions: HashMap::new(),
            watched_symbols: Vec::new(),
            protected_coins: ProtectedCoins::default(),
            buy_blacklist: Blacklist::default(),
            risk_state: RiskState::new(initial_balance),
            combo_store: ComboStore::default(),
            loss_rules: Vec::new(),
            learned: LearnedParamsRecord::default(),
            scan_count: 0,
            last_symbol_refresh_ms: 0,
            btc_leader: BtcLeaderTracker::new(),
            last_signals: HashMap::new(),
            today_sells: 0,
            today_wins: 0,
            last_loss_ts: None,
            consecutive_losses: 0,
            pnl_minutes: VecDeque::new(),
            first_boot_seen: false,
            log_ring: VecDeque::new(),
            market_mode: MarketMode::Scalping,
            regime: None,
            running: true,
            scalp_mode: false,
        }
    }

    pub fn push_log(&mut self, ts_ms: i64, level: &'static str, message: impl Into<String>) {
        if self.log_ring.len() >= LOG_RING_CAPACITY {
            self.log_ring.pop_front();
        }
        self.log_ring.push_back(LogEvent { ts_ms, level, message: message.into() });
    }

    pub fn push_pnl_minute(&mut self, ts_ms: i64, cumulative_pnl: f64) {
        self.pnl_minutes.push_back((ts_ms, cumulative_pnl));
        while let Some(&(front_ts, _)) = self.pnl_minutes.front() {
            if ts_ms - front_ts > PNL_MINUTE_WINDOW_MS {
                self.pnl_minutes.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn record_win_loss(&mut self, pnl_amount: Decimal, now_ms: i64) {
        self.today_sells += 1;
        if pnl_amount.is_sign_positive() && !pnl_amount.is_zero() {
            self.today_wins += 1;
            self.consecutive_losses = 0;
        } else if pnl_amount.is_sign_negative() {
            self.consecutive_losses += 1;
            self.last_loss_ts = Some(now_ms);
        }
    }
}

/// The full per-tenant runtime. Cheap to clone (it's all `Arc`s), so the
/// loop task, the dashboard router and the registration handler can each
/// hold their own handle.
pub struct TenantContext {
    pub config: TenantConfig,
    pub exchange: Arc<dyn ExchangeClient>,
    pub notifier: Arc<dyn NotificationSink>,
    pub store: Arc<TenantStore>,
    pub state: RwLock<TenantState>,
    pub strategy: RwLock<StrategyParams>,
    pub running: Arc<AtomicBool>,
    pub order_seq: AtomicU64,
    pub trade_events: broadcast::Sender<TradeEvent>,
    /// Shared HTTP client for the one permitted external read (C2's
    /// Fear&Greed fetch). Reused across scans rather than rebuilt, the
    /// way the teacher's own API clients are pooled per tenant.
    pub http_client: reqwest::Client,
}

impl TenantContext {
    pub fn new(config: TenantConfig, exchange: Arc<dyn ExchangeClient>, notifier: Arc<dyn NotificationSink>, store: Arc<TenantStore>, initial_balance: Decimal) -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self {
            config,
            exchange,
            notifier,
            store,
            state: RwLock::new(TenantState::new(initial_balance)),
            strategy: RwLock::new(StrategyParams::default()),
            running: Arc::new(AtomicBool::new(true)),
            order_seq: AtomicU64::new(0),
            trade_events: tx,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn next_order_seq(&self) -> u64 {
        self.order_seq.fetch_add(1, Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn log(&self, level: &'static str, now_ms: i64, message: impl Into<String>) {
        let message = message.into();
        match level {
            "ERROR" => tracing::error!(tenant = %self.config.id, "{}", message),
            "WARN" => tracing::warn!(tenant = %self.config.id, "{}", message),
            _ => tracing::info!(tenant = %self.config.id, "{}", message),
        }
        self.state.write().push_log(now_ms, level, message);
    }

    /// Rewrites `positions.json`, `combo-stats.json` and `pnl-minutes.json`
    /// from the current in-memory state. Called after every position or
    /// combo-tracker mutation (spec §4.7 "rewritten atomically on every
    /// mutation") rather than only at startup/shutdown.
    pub fn persist_mutable_state(&self) {
        use crate::infrastructure::persistence::{PnlMinuteSeries, PositionsSnapshot};

        let (snapshot, combo_store, pnl_minutes) = {
            let state = self.state.read();
            let snapshot = PositionsSnapshot { positions: state.positions.clone(), daily_pnl: state.risk_state.daily_realized_pnl };
            let pnl_minutes = PnlMinuteSeries { samples: state.pnl_minutes.iter().copied().collect() };
            (snapshot, state.combo_store.clone(), pnl_minutes)
        };

        if let Err(e) = self.store.write_positions(&snapshot) {
            tracing::error!(tenant = %self.config.id, error = %e, "failed to persist positions snapshot");
        }
        if let Err(e) = self.store.write_combo_stats(&combo_store) {
            tracing::error!(tenant = %self.config.id, error = %e, "failed to persist combo stats");
        }
        if let Err(e) = self.store.write_pnl_minutes(&pnl_minutes) {
            tracing::error!(tenant = %self.config.id, error = %e, "failed to persist pnl minutes");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_ring_caps_at_capacity() {
        let mut state = TenantState::new(Decimal::ZERO);
        for i in 0..(LOG_RING_CAPACITY + 50) {
            state.push_log(i as i64, "INFO", "x");
        }
        assert_eq!(state.log_ring.len(), LOG_RING_CAPACITY);
    }

    #[test]
    fn pnl_minute_window_prunes_old_samples() {
        let mut state = TenantState::new(Decimal::ZERO);
        state.push_pnl_minute(0, 0.0);
        state.push_pnl_minute(PNL_MINUTE_WINDOW_MS + 60_000, 10.0);
        assert_eq!(state.pnl_minutes.len(), 1);
    }
}
