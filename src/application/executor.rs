//! C6: the order executor. Every order leaves this module as a
//! 3s-poll/30s-timeout limit order that falls back to a market order
//! (spec §4.6), and every fill is journaled *before* the in-memory
//! position or risk state is mutated — a crash between those two steps
//! recovers by replaying the journal rather than silently losing the
//! trade (spec §9 ordering fix).

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{error, warn};

use crate::domain::errors::TradingError;
use crate::domain::ledger::{TradeJournalEntry, TradeSide};
use crate::domain::market::regime::Regime;
use crate::domain::ports::{Fill, TradeNotification};
use crate::domain::position::Position;
use crate::domain::signal::ReasonSet;
use crate::infrastructure::metrics::Metrics;

use super::context::{TenantContext, TradeEvent};
use super::now_ms;

const LIMIT_POLL_INTERVAL: Duration = Duration::from_secs(3);
const LIMIT_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_SELL_ATTEMPTS: u32 = 10;

async fn place_buy(ctx: &TenantContext, symbol: &str, krw_amount: Decimal, target_price: Decimal) -> Option<Fill> {
    let deadline = tokio::time::Instant::now() + LIMIT_TIMEOUT;
    loop {
        if let Some(fill) = ctx.exchange.limit_buy(symbol, krw_amount, target_price).await {
            return Some(fill);
        }
        if tokio::time::Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(LIMIT_POLL_INTERVAL).await;
    }
    ctx.exchange.buy(symbol, krw_amount).await
}

async fn place_sell(ctx: &TenantContext, symbol: &str, quantity: Decimal, target_price: Decimal) -> Option<Fill> {
    let deadline = tokio::time::Instant::now() + LIMIT_TIMEOUT;
    loop {
        if let Some(fill) = ctx.exchange.limit_sell(symbol, quantity, target_price).await {
            return Some(fill);
        }
        if tokio::time::Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(LIMIT_POLL_INTERVAL).await;
    }
    ctx.exchange.sell(symbol, quantity).await
}

fn journal(ctx: &TenantContext, entry: &TradeJournalEntry) {
    if let Err(e) = ctx.store.append_trade(entry) {
        error!(tenant = %ctx.config.id, symbol = %entry.symbol, error = %e, "failed to append journal entry");
    }
}

/// Opens a new position (spec §4.6 "buy path"). `reasons`/`buy_score`
/// come straight from the compositor's [`Signal`](crate::domain::signal::Signal)
/// that approved this buy, so the combo-tracker can credit the right
/// reason set when the position eventually closes.
pub async fn execute_buy(
    ctx: &Arc<TenantContext>,
    symbol: &str,
    krw_amount: Decimal,
    reason: String,
    reasons: ReasonSet,
    buy_score: f64,
    regime: Option<Regime>,
) -> Result<(), TradingError> {
    let ticker = ctx
        .exchange
        .get_ticker(symbol)
        .await
        .ok_or_else(|| TradingError::ExecutionFailed { symbol: symbol.to_string(), reason: "no ticker data".into() })?;

    let Some(fill) = place_buy(ctx, symbol, krw_amount, ticker.price).await else {
        return Err(TradingError::ExecutionFailed { symbol: symbol.to_string(), reason: "buy order never filled".into() });
    };

    let now = now_ms();
    let order_seq = ctx.next_order_seq();
    let entry = TradeJournalEntry {
        ts_ms: now,
        side: TradeSide::Buy,
        symbol: symbol.to_string(),
        price: fill.price,
        quantity: fill.quantity,
        amount: fill.amount,
        pnl_amount: None,
        pnl_pct: None,
        reason: reason.clone(),
        order_seq,
    };
    journal(ctx, &entry);

    let params = ctx.strategy.read().position;
    let mut position = Position::new(symbol, fill.price, fill.quantity, now, &params, reason.clone());
    position.buy_regime = regime.map(|r| format!("{r:?}"));
    position.buy_reason_bits = reasons.bits();
    position.buy_score = buy_score;

    let open_count = {
        let mut state = ctx.state.write();
        state.positions.insert(symbol.to_string(), position);
        state.risk_state.record_buy(now);
        state.positions.len() as i64
    };
    ctx.persist_mutable_state();
    Metrics::global().record_trade(&ctx.config.id, "BUY", &reason);
    Metrics::global().set_open_positions(&ctx.config.id, open_count);

    let _ = ctx.trade_events.send(TradeEvent {
        ts_ms: now,
        symbol: symbol.to_string(),
        side: "BUY",
        price: fill.price,
        quantity: fill.quantity,
        pnl_pct: None,
        pnl_amount: None,
        reason: reason.clone(),
    });
    ctx.notifier
        .notify_trade(&TradeNotification { symbol: symbol.to_string(), side: "BUY", price: fill.price, quantity: fill.quantity, pnl_pct: None, reason })
        .await;
    Ok(())
}

fn pnl_for(position: &Position, fill: &Fill) -> (Decimal, f64) {
    let cost_basis = position.entry_price * fill.quantity;
    let pnl_amount = fill.amount - cost_basis;
    let pnl_pct = position.pnl_pct(fill.price);
    (pnl_amount, pnl_pct)
}

fn record_exit_bookkeeping(ctx: &TenantContext, symbol: &str, pnl_amount: Decimal, pnl_pct: f64, buy_reason_bits: u8, buy_score: f64, now: i64) {
    let mut state = ctx.state.write();
    state.risk_state.record_sell(symbol, now, pnl_amount);
    state.record_win_loss(pnl_amount, now);
    state.combo_store.record_combo_result(ReasonSet::from_bits(buy_reason_bits), pnl_pct, buy_score);
    state.push_pnl_minute(now, state.risk_state.daily_realized_pnl.to_f64().unwrap_or(0.0));
}

/// Fully closes a position (spec §4.4 actions `Sell`/force-removed).
/// `force` skips the exchange call's failure path straight to a
/// `FORCE_REMOVE` journal row once `sell_attempts` is exhausted — the
/// position is dropped from the book either way so the loop never spins
/// forever on an exchange that keeps rejecting the order.
pub async fn execute_sell(ctx: &Arc<TenantContext>, symbol: &str, reason: &'static str, force: bool) -> Result<(), TradingError> {
    let (mut quantity, buy_reason_bits, buy_score) = {
        let state = ctx.state.read();
        let pos = state.positions.get(symbol).ok_or_else(|| TradingError::PositionNotFound { symbol: symbol.to_string() })?;
        (pos.quantity, pos.buy_reason_bits, pos.buy_score)
    };

    // Sell sizing guard (spec §4.6): the exchange is the source of truth
    // for what's actually sellable. A position whose recorded quantity
    // has drifted far from the real balance (manual withdrawal, a
    // partial fill never reconciled) should not place an order against
    // quantity that isn't there.
    if let Some(holding) = ctx.exchange.get_detailed_holdings().await.get(symbol) {
        if holding.quantity < quantity * Decimal::new(1, 1) {
            return remove_insufficient_balance(ctx, symbol, buy_reason_bits, buy_score).await;
        }
        if holding.quantity < quantity {
            quantity = holding.quantity;
        }
    }

    let ticker = ctx.exchange.get_ticker(symbol).await;
    let fill = match ticker {
        Some(t) => place_sell(ctx, symbol, quantity, t.price).await,
        None => None,
    };

    let Some(fill) = fill else {
        let attempts = {
            let mut state = ctx.state.write();
            if let Some(pos) = state.positions.get_mut(symbol) {
                pos.sell_attempts += 1;
                pos.sell_attempts
            } else {
                return Err(TradingError::PositionNotFound { symbol: symbol.to_string() });
            }
        };
        if force || attempts >= MAX_SELL_ATTEMPTS {
            return force_remove(ctx, symbol, buy_reason_bits, buy_score).await;
        }
        warn!(tenant = %ctx.config.id, symbol, attempts, "sell order failed, will retry next scan");
        return Err(TradingError::ExecutionFailed { symbol: symbol.to_string(), reason: "sell order did not fill".into() });
    };

    let position = { ctx.state.read().positions.get(symbol).cloned() };
    let Some(position) = position else {
        return Err(TradingError::PositionNotFound { symbol: symbol.to_string() });
    };
    let (pnl_amount, pnl_pct) = pnl_for(&position, &fill);
    let now = now_ms();
    let order_seq = ctx.next_order_seq();
    let entry = TradeJournalEntry {
        ts_ms: now,
        side: TradeSide::Sell,
        symbol: symbol.to_string(),
        price: fill.price,
        quantity: fill.quantity,
        amount: fill.amount,
        pnl_amount: Some(pnl_amount),
        pnl_pct: Some(pnl_pct),
        reason: reason.to_string(),
        order_seq,
    };
    journal(ctx, &entry);

    let open_count = {
        let mut state = ctx.state.write();
        state.positions.remove(symbol);
        state.positions.len() as i64
    };
    record_exit_bookkeeping(ctx, symbol, pnl_amount, pnl_pct, buy_reason_bits, buy_score, now);
    ctx.persist_mutable_state();
    Metrics::global().record_trade(&ctx.config.id, "SELL", reason);
    Metrics::global().set_open_positions(&ctx.config.id, open_count);

    let _ = ctx.trade_events.send(TradeEvent {
        ts_ms: now,
        symbol: symbol.to_string(),
        side: "SELL",
        price: fill.price,
        quantity: fill.quantity,
        pnl_pct: Some(pnl_pct),
        pnl_amount: Some(pnl_amount),
        reason: reason.to_string(),
    });
    ctx.notifier
        .notify_trade(&TradeNotification {
            symbol: symbol.to_string(),
            side: "SELL",
            price: fill.price,
            quantity: fill.quantity,
            pnl_pct: Some(pnl_pct),
            reason: reason.to_string(),
        })
        .await;
    Ok(())
}

/// Sells a fraction of an open position (spec §4.4 `PartialSell`). The
/// position stays open; only `quantity`/`total_cost` shrink.
pub async fn execute_partial_sell(ctx: &Arc<TenantContext>, symbol: &str, fraction: f64, reason: &'static str) -> Result<(), TradingError> {
    let total_quantity = {
        let state = ctx.state.read();
        state.positions.get(symbol).ok_or_else(|| TradingError::PositionNotFound { symbol: symbol.to_string() })?.quantity
    };
    let sell_qty = (total_quantity * Decimal::try_from(fraction).unwrap_or_default()).round_dp(8);
    if sell_qty <= Decimal::ZERO {
        return Ok(());
    }

    let ticker = ctx
        .exchange
        .get_ticker(symbol)
        .await
        .ok_or_else(|| TradingError::ExecutionFailed { symbol: symbol.to_string(), reason: "no ticker data".into() })?;
    let Some(fill) = place_sell(ctx, symbol, sell_qty, ticker.price).await else {
        return Err(TradingError::ExecutionFailed { symbol: symbol.to_string(), reason: "partial sell did not fill".into() });
    };

    let now = now_ms();
    let order_seq = ctx.next_order_seq();

    let (pnl_amount, pnl_pct, buy_reason_bits, buy_score) = {
        let state = ctx.state.read();
        let pos = state.positions.get(symbol).ok_or_else(|| TradingError::PositionNotFound { symbol: symbol.to_string() })?;
        let (pnl_amount, pnl_pct) = pnl_for(pos, &fill);
        (pnl_amount, pnl_pct, pos.buy_reason_bits, pos.buy_score)
    };

    let entry = TradeJournalEntry {
        ts_ms: now,
        side: TradeSide::PartialSell,
        symbol: symbol.to_string(),
        price: fill.price,
        quantity: fill.quantity,
        amount: fill.amount,
        pnl_amount: Some(pnl_amount),
        pnl_pct: Some(pnl_pct),
        reason: reason.to_string(),
        order_seq,
    };
    journal(ctx, &entry);

    {
        let mut state = ctx.state.write();
        if let Some(pos) = state.positions.get_mut(symbol) {
            pos.quantity -= fill.quantity;
            pos.total_cost = pos.entry_price * pos.quantity;
        }
    }
    record_exit_bookkeeping(ctx, symbol, pnl_amount, pnl_pct, buy_reason_bits, buy_score, now);
    ctx.persist_mutable_state();
    Metrics::global().record_trade(&ctx.config.id, "PARTIAL_SELL", reason);

    let _ = ctx.trade_events.send(TradeEvent {
        ts_ms: now,
        symbol: symbol.to_string(),
        side: "PARTIAL_SELL",
        price: fill.price,
        quantity: fill.quantity,
        pnl_pct: Some(pnl_pct),
        pnl_amount: Some(pnl_amount),
        reason: reason.to_string(),
    });
    Ok(())
}

/// Adds to an open position (spec §4.4 DCA). Recomputes the weighted
/// average entry via [`Position::apply_dca`] and resets exit-tracking
/// flags, exactly as a fresh fill would.
pub async fn execute_dca(ctx: &Arc<TenantContext>, symbol: &str, krw_amount: Decimal) -> Result<(), TradingError> {
    let ticker = ctx
        .exchange
        .get_ticker(symbol)
        .await
        .ok_or_else(|| TradingError::ExecutionFailed { symbol: symbol.to_string(), reason: "no ticker data".into() })?;
    let Some(fill) = place_buy(ctx, symbol, krw_amount, ticker.price).await else {
        return Err(TradingError::ExecutionFailed { symbol: symbol.to_string(), reason: "dca buy did not fill".into() });
    };

    let now = now_ms();
    let order_seq = ctx.next_order_seq();
    let entry = TradeJournalEntry {
        ts_ms: now,
        side: TradeSide::Dca,
        symbol: symbol.to_string(),
        price: fill.price,
        quantity: fill.quantity,
        amount: fill.amount,
        pnl_amount: None,
        pnl_pct: None,
        reason: "dca".to_string(),
        order_seq,
    };
    journal(ctx, &entry);

    let params = ctx.strategy.read().position;
    {
        let mut state = ctx.state.write();
        if let Some(pos) = state.positions.get_mut(symbol) {
            pos.apply_dca(fill.price, fill.quantity, now, &params);
        }
        state.risk_state.record_buy(now);
    }
    ctx.persist_mutable_state();
    Metrics::global().record_trade(&ctx.config.id, "DCA", "dca");
    Ok(())
}

/// Drops a position from the book without a confirmed exchange fill,
/// after `sell_attempts` (or a forced hard-timeout sell) exhausts retry
/// budget (spec §4.6). Recorded as `pnl_amount: None` — the position's
/// true realized P&L is unknowable without a fill, so the learning pass
/// and risk state must not pretend otherwise.
/// Drops a position whose exchange balance has fallen under 10% of what
/// was recorded, without attempting an order the exchange can't fill
/// (spec §4.6 sell-sizing guard).
async fn remove_insufficient_balance(ctx: &Arc<TenantContext>, symbol: &str, buy_reason_bits: u8, buy_score: f64) -> Result<(), TradingError> {
    let quantity = {
        let state = ctx.state.read();
        state.positions.get(symbol).ok_or_else(|| TradingError::PositionNotFound { symbol: symbol.to_string() })?.quantity
    };
    let now = now_ms();
    let order_seq = ctx.next_order_seq();
    let entry = TradeJournalEntry {
        ts_ms: now,
        side: TradeSide::ForceRemove,
        symbol: symbol.to_string(),
        price: Decimal::ZERO,
        quantity,
        amount: Decimal::ZERO,
        pnl_amount: None,
        pnl_pct: None,
        reason: "잔고 부족".to_string(),
        order_seq,
    };
    journal(ctx, &entry);
    let open_count = {
        let mut state = ctx.state.write();
        state.positions.remove(symbol);
        state.combo_store.record_combo_result(ReasonSet::from_bits(buy_reason_bits), 0.0, buy_score);
        state.positions.len() as i64
    };
    ctx.persist_mutable_state();
    Metrics::global().record_trade(&ctx.config.id, "FORCE_REMOVE", "insufficient_balance");
    Metrics::global().set_open_positions(&ctx.config.id, open_count);
    warn!(tenant = %ctx.config.id, symbol, "removed position: exchange balance fell under the sell-sizing guard");
    Err(TradingError::ExecutionFailed { symbol: symbol.to_string(), reason: "held balance insufficient".into() })
}

async fn force_remove(ctx: &Arc<TenantContext>, symbol: &str, buy_reason_bits: u8, buy_score: f64) -> Result<(), TradingError> {
    let quantity = {
        let state = ctx.state.read();
        state.positions.get(symbol).ok_or_else(|| TradingError::PositionNotFound { symbol: symbol.to_string() })?.quantity
    };
    let now = now_ms();
    let order_seq = ctx.next_order_seq();
    let entry = TradeJournalEntry {
        ts_ms: now,
        side: TradeSide::ForceRemove,
        symbol: symbol.to_string(),
        price: Decimal::ZERO,
        quantity,
        amount: Decimal::ZERO,
        pnl_amount: None,
        pnl_pct: None,
        reason: "sell_attempts_exhausted".to_string(),
        order_seq,
    };
    journal(ctx, &entry);
    let open_count = {
        let mut state = ctx.state.write();
        state.positions.remove(symbol);
        state.combo_store.record_combo_result(ReasonSet::from_bits(buy_reason_bits), 0.0, buy_score);
        state.positions.len() as i64
    };
    ctx.persist_mutable_state();
    Metrics::global().record_trade(&ctx.config.id, "FORCE_REMOVE", "sell_attempts_exhausted");
    Metrics::global().set_open_positions(&ctx.config.id, open_count);
    warn!(tenant = %ctx.config.id, symbol, "force-removed position after exhausting sell attempts");
    Err(TradingError::SellAttemptsExhausted { symbol: symbol.to_string(), attempts: MAX_SELL_ATTEMPTS })
}
