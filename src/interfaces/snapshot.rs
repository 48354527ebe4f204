//! Builds the dashboard's `GET /api/status` payload (spec §6 "Status
//! snapshot fields") from one tenant's live state. Read-only: a snapshot
//! is an immutable value built once per request, never a handle back
//! into `TenantState` — the dashboard never blocks the scan loop's
//! writer (spec §5 "dashboard polls a read-only view").

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::application::context::TenantContext;
use crate::domain::ledger::{fifo_match, LossPatternRule, TradeJournalEntry};
use crate::domain::market::regime::Regime;
use crate::domain::position::Position;

#[derive(Debug, Clone, Serialize)]
pub struct SymbolView {
    pub price: Option<Decimal>,
    pub change_pct: Option<f64>,
    pub action: Option<&'static str>,
    pub buy_score: Option<f64>,
    pub sell_score: Option<f64>,
    pub reasons: Option<String>,
    pub regime: Option<Regime>,
    pub has_position: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsView {
    pub today_trades: u32,
    pub today_wins: u32,
    pub today_win_rate: f64,
    pub total_trades: usize,
    pub total_wins: usize,
    pub win_rate: f64,
    pub realized_pnl_pct_sum: f64,
    pub unrealized_pnl_pct: f64,
    pub best_pct: f64,
    pub worst_pct: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BalanceView {
    pub free: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub scan_count: u64,
    pub position_count: usize,
    pub max_positions: u32,
    pub daily_pnl: Decimal,
    pub positions: Vec<Position>,
    pub symbols: Vec<String>,
    pub symbol_data: HashMap<String, SymbolView>,
    pub pnl_history: Vec<(i64, f64)>,
    pub stats: StatsView,
    pub today_trades: u32,
    pub recent_trades: Vec<TradeJournalEntry>,
    pub learning: serde_json::Value,
    pub regime: Option<Regime>,
    pub drawdown_pct: f64,
    pub sentiment: serde_json::Value,
    pub combo: serde_json::Value,
    pub backtest: serde_json::Value,
    pub kimchi: serde_json::Value,
    pub balance: Option<BalanceView>,
    pub btc_leader: serde_json::Value,
    pub loss_patterns: Vec<LossPatternRule>,
    pub paper_mode: bool,
    pub adaptive_filter: serde_json::Value,
    pub consecutive_losses: u32,
    pub market_mode: String,
    pub btc_dominance: Option<f64>,
    pub timestamp: i64,
}

/// Assembles the full snapshot. Fetches a fresh ticker for every watched
/// symbol rather than consulting a cache — for the in-memory paper
/// exchange this is effectively free, and the real-exchange client is an
/// out-of-scope collaborator expected to hold its own short-TTL cache
/// (spec §5 "rate limiting").
pub async fn build_snapshot(ctx: &Arc<TenantContext>) -> StatusSnapshot {
    let now = crate::application::now_ms();

    let (watched, positions, risk_state, max_positions, consecutive_losses, market_mode, regime, pnl_history, today_sells, today_wins, last_signals, loss_rules, learned, log_ring) = {
        let state = ctx.state.read();
        let strategy = ctx.strategy.read();
        (
            state.watched_symbols.clone(),
            state.positions.clone(),
            state.risk_state.clone(),
            crate::domain::risk::dynamic_max_positions(&strategy.risk, state.consecutive_losses, state.scalp_mode),
            state.consecutive_losses,
            state.market_mode,
            state.regime,
            state.pnl_minutes.iter().map(|(ts, v)| (*ts, *v)).collect::<Vec<_>>(),
            state.today_sells,
            state.today_wins,
            state.last_signals.clone(),
            state.loss_rules.clone(),
            state.learned.clone(),
            state.log_ring.iter().rev().take(30).cloned().collect::<Vec<_>>(),
        )
    };
    let _ = log_ring; // surfaced via the dedicated /api/logs route, not the snapshot

    let tickers = ctx.exchange.get_all_tickers(&watched).await;
    let balance = ctx.exchange.get_balance().await.map(|b| BalanceView { free: b.free, total: b.total });

    let symbol_data: HashMap<String, SymbolView> = watched
        .iter()
        .map(|symbol| {
            let ticker = tickers.get(symbol);
            let signal = last_signals.get(symbol);
            let view = SymbolView {
                price: ticker.map(|t| t.price),
                change_pct: ticker.map(|t| t.change_pct),
                action: signal.map(|s| match s.action {
                    crate::domain::signal::SignalAction::Buy => "buy",
                    crate::domain::signal::SignalAction::Sell => "sell",
                    crate::domain::signal::SignalAction::Hold => "hold",
                }),
                buy_score: signal.map(|s| s.buy_score),
                sell_score: signal.map(|s| s.sell_score),
                reasons: signal.map(|s| s.reasons.label()),
                regime: signal.and_then(|s| s.regime),
                has_position: positions.contains_key(symbol),
            };
            (symbol.clone(), view)
        })
        .collect();

    let journal = ctx.store.read_journal();
    let pairs = fifo_match(&journal);
    let total_trades = pairs.len();
    let total_wins = pairs.iter().filter(|p| p.pnl_pct > 0.0).count();
    let realized_pnl_pct_sum: f64 = pairs.iter().map(|p| p.pnl_pct).sum();
    let best_pct = pairs.iter().map(|p| p.pnl_pct).fold(f64::MIN, f64::max);
    let worst_pct = pairs.iter().map(|p| p.pnl_pct).fold(f64::MAX, f64::min);

    let unrealized_pnl_pct = if positions.is_empty() {
        0.0
    } else {
        let sum: f64 = positions
            .values()
            .filter_map(|p| tickers.get(&p.symbol).map(|t| p.pnl_pct(t.price)))
            .sum();
        sum / positions.len() as f64
    };

    let stats = StatsView {
        today_trades: today_sells,
        today_wins,
        today_win_rate: if today_sells == 0 { 0.0 } else { today_wins as f64 / today_sells as f64 },
        total_trades,
        total_wins,
        win_rate: if total_trades == 0 { 0.0 } else { total_wins as f64 / total_trades as f64 },
        realized_pnl_pct_sum,
        unrealized_pnl_pct,
        best_pct: if total_trades == 0 { 0.0 } else { best_pct },
        worst_pct: if total_trades == 0 { 0.0 } else { worst_pct },
    };

    let mut recent_trades: Vec<TradeJournalEntry> = journal;
    recent_trades.reverse();
    recent_trades.truncate(50);

    // Peak-to-current drawdown over the realized P&L series, as a
    // percentage of the tenant's starting balance.
    let mut peak = 0.0f64;
    let mut drawdown_pct = 0.0f64;
    for (_, cumulative) in &pnl_history {
        peak = peak.max(*cumulative);
        let initial = risk_state.initial_balance.to_f64().unwrap_or(1.0).max(1.0);
        let dd = (peak - cumulative) / initial * 100.0;
        if dd > drawdown_pct {
            drawdown_pct = dd;
        }
    }

    StatusSnapshot {
        running: ctx.is_running(),
        scan_count: { ctx.state.read().scan_count },
        position_count: positions.len(),
        max_positions,
        daily_pnl: risk_state.daily_realized_pnl,
        positions: positions.values().cloned().collect(),
        symbols: watched,
        symbol_data,
        pnl_history,
        stats,
        today_trades: today_sells,
        recent_trades,
        learning: serde_json::json!({
            "confidence": learned.confidence,
            "updated_ts": learned.updated_ts,
            "params": learned.params,
            "preferred_hours": learned.preferred_hours,
            "avoid_hours": learned.avoid_hours,
        }),
        regime,
        drawdown_pct,
        sentiment: serde_json::json!({}),
        combo: serde_json::json!({ "min_buy_score": 2.0 }),
        backtest: serde_json::json!(null),
        kimchi: serde_json::json!(null),
        balance,
        btc_leader: serde_json::json!(null),
        loss_patterns: loss_rules,
        paper_mode: ctx.config.paper_trade,
        adaptive_filter: serde_json::json!({ "consecutive_losses": consecutive_losses }),
        consecutive_losses,
        market_mode: format!("{market_mode:?}"),
        btc_dominance: None,
        timestamp: now,
    }
}
