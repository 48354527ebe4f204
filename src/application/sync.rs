//! Position-sync reconciler, run every 5th scan (spec §4.5): reconciles
//! the in-memory position book against what the exchange actually
//! holds. Catches manual sells made outside the bot and adopts
//! untracked holdings above a dust threshold so they come under
//! management instead of sitting invisible to the risk governor.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::domain::ledger::{TradeJournalEntry, TradeSide};
use crate::domain::ports::Holding;
use crate::domain::position::Position;

use super::context::TenantContext;
use super::now_ms;

/// A recorded position whose on-exchange quantity has dropped below this
/// fraction of what the bot last knew about is treated as sold outside
/// the bot, not as a rounding artifact.
const EXTERNAL_SELL_THRESHOLD: Decimal = Decimal::from_parts(1, 0, 0, false, 1); // 0.1

/// Holdings worth less than this many KRW are too small to bother
/// adopting into management.
const DUST_THRESHOLD_KRW: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

/// One pass of the reconciler. Mutates `ctx.state` in place; returns the
/// symbols it either marked externally-sold or newly adopted, purely for
/// logging at the call site.
pub async fn reconcile(ctx: &Arc<TenantContext>, last_prices: &std::collections::HashMap<String, Decimal>) -> (Vec<String>, Vec<String>) {
    let exchange_holdings = ctx.exchange.get_detailed_holdings().await;
    let mut externally_sold = Vec::new();
    let mut adopted = Vec::new();

    let tracked_symbols: Vec<String> = { ctx.state.read().positions.keys().cloned().collect() };

    for symbol in tracked_symbols {
        let recorded_qty = { ctx.state.read().positions.get(&symbol).map(|p| p.quantity) };
        let Some(recorded_qty) = recorded_qty else { continue };
        let on_exchange = exchange_holdings.get(&symbol).map(|h| h.quantity).unwrap_or(Decimal::ZERO);
        if recorded_qty > Decimal::ZERO && on_exchange < recorded_qty * EXTERNAL_SELL_THRESHOLD {
            mark_externally_sold(ctx, &symbol, last_prices.get(&symbol).copied());
            externally_sold.push(symbol);
        }
    }

    let protected = { ctx.state.read().protected_coins.clone() };
    for (symbol, holding) in exchange_holdings.iter() {
        let already_tracked = { ctx.state.read().positions.contains_key(symbol) };
        if already_tracked || protected.contains(symbol) {
            continue;
        }
        let value = holding.quantity * holding.avg_buy_price;
        if value < DUST_THRESHOLD_KRW {
            continue;
        }
        adopt_holding(ctx, symbol, holding);
        adopted.push(symbol.clone());
    }

    (externally_sold, adopted)
}

fn mark_externally_sold(ctx: &Arc<TenantContext>, symbol: &str, last_price: Option<Decimal>) {
    let now = now_ms();
    let (quantity, buy_reason_bits, buy_score) = {
        let state = ctx.state.read();
        match state.positions.get(symbol) {
            Some(pos) => (pos.quantity, pos.buy_reason_bits, pos.buy_score),
            None => return,
        }
    };
    let price = last_price.unwrap_or(Decimal::ZERO);
    let order_seq = ctx.next_order_seq();
    let entry = TradeJournalEntry {
        ts_ms: now,
        side: TradeSide::Sell,
        symbol: symbol.to_string(),
        price,
        quantity,
        amount: price * quantity,
        pnl_amount: None,
        pnl_pct: None,
        reason: "수동 매도".to_string(),
        order_seq,
    };
    if let Err(e) = ctx.store.append_trade(&entry) {
        tracing::error!(tenant = %ctx.config.id, symbol, error = %e, "failed to journal external sell");
    }
    {
        let mut state = ctx.state.write();
        state.positions.remove(symbol);
        state.risk_state.record_sell(symbol, now, Decimal::ZERO);
        use crate::domain::signal::ReasonSet;
        state.combo_store.record_combo_result(ReasonSet::from_bits(buy_reason_bits), 0.0, buy_score);
    }
    ctx.persist_mutable_state();
    ctx.log("WARN", now, format!("{symbol} sold outside the bot, position closed without a recorded fill price"));
}

fn adopt_holding(ctx: &Arc<TenantContext>, symbol: &str, holding: &Holding) {
    let now = now_ms();
    let params = ctx.strategy.read().position;
    let position = Position::new(symbol, holding.avg_buy_price, holding.quantity, now, &params, "adopted");
    {
        let mut state = ctx.state.write();
        state.positions.insert(symbol.to_string(), position);
        if !state.watched_symbols.iter().any(|s| s == symbol) {
            state.watched_symbols.push(symbol.to_string());
        }
    }
    ctx.persist_mutable_state();
    ctx.log("INFO", now, format!("adopted untracked holding {symbol} into management"));
}
