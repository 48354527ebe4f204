//! C5: the per-tenant scan loop (spec §4.5). Cooperative and
//! single-threaded per tenant — one scan runs to completion before the
//! next starts, and one symbol's exchange failure never aborts the scan
//! for the rest of the watch-list.

use std::sync::Arc;
use std::time::Duration;

use chrono::Timelike;
use rust_decimal::Decimal;

use crate::domain::context::market_mode::{compute_market_mode, MarketMode, MarketModeInput};
use crate::domain::context::sentiment::{merge_sentiment, SentimentInputs};
use crate::domain::context::{btc_leader::BtcLeaderClassification, funding_rate, kimchi_premium, whale_flow, ContextFragment};
use crate::domain::market::multi_timeframe::read_timeframe;
use crate::domain::market::regime::{classify_regime, Regime};
use crate::domain::market::{bundle as bundle_mod, Timeframe};
use crate::domain::position::dca::plan_dca;
use crate::domain::position::state_machine::{tick, PositionAction};
use crate::domain::risk::{can_open, evaluate_adaptive_filter, AdaptiveAdjustment, AdaptiveFilterInput, GovernorInput};
use crate::domain::signal::{compose, CompositorInput, SignalAction};
use crate::infrastructure::metrics::Metrics;

use super::context::TenantContext;
use super::executor;
use super::now_ms;
use super::strategy::StrategyParams;
use super::symbols;
use super::sync;

const PRIMARY_CANDLE_COUNT: usize = 200;
const MTF_CANDLE_COUNT: usize = 60;
const BTC_SYMBOL: &str = "BTC/KRW";

/// Drives one tenant's scan loop until `ctx.running` clears, then
/// best-effort-liquidates every open position (spec §4.9 shutdown).
pub async fn run(ctx: Arc<TenantContext>) {
    load_startup_state(&ctx);

    while ctx.is_running() {
        one_scan(&ctx).await;
        tokio::time::sleep(Duration::from_secs(ctx.config.scan_interval_secs.max(1))).await;
    }

    liquidate_all(&ctx).await;
}

/// Replays the journal and rehydrates durable state before the first
/// scan (spec §4.7 "On startup"). Blocking I/O, run once before the loop
/// starts ticking.
fn load_startup_state(ctx: &Arc<TenantContext>) {
    let positions = ctx.store.read_positions();
    let combo_store = ctx.store.read_combo_stats();
    let loss_rules = ctx.store.read_loss_patterns();
    let learned = ctx.store.read_learned_params();
    let protected_coins = ctx.store.read_protected_coins();
    let buy_blacklist = ctx.store.read_blacklist();
    let pnl_minutes = ctx.store.read_pnl_minutes();

    let today = chrono::Utc::now().date_naive();
    let pairs = crate::domain::ledger::fifo_match(&ctx.store.read_journal());
    let today_pairs: Vec<_> = pairs
        .iter()
        .filter(|p| chrono::DateTime::from_timestamp_millis(p.sell_ts_ms).map(|dt| dt.date_naive() == today).unwrap_or(false))
        .collect();
    let today_sells = today_pairs.len() as u32;
    let today_wins = today_pairs.iter().filter(|p| p.pnl_pct > 0.0).count() as u32;
    let daily_realized_pnl_pct_sum: f64 = today_pairs.iter().map(|p| p.pnl_pct).sum();
    let _ = daily_realized_pnl_pct_sum;

    let defaults = crate::domain::ledger::LearnedParamDefaults::default();
    let base_position = crate::domain::position::PositionParams::default();
    let base_risk = crate::domain::risk::RiskConfig::default();
    let base_compositor = crate::domain::signal::CompositorParams::default();
    let strategy = StrategyParams::reload(base_position, base_risk, base_compositor, &defaults, &learned);

    let mut state = ctx.state.write();
    state.positions = positions.positions;
    state.risk_state.daily_realized_pnl = positions.daily_pnl;
    state.combo_store = combo_store;
    state.loss_rules = loss_rules;
    state.learned = learned;
    state.protected_coins = protected_coins;
    state.buy_blacklist = buy_blacklist;
    state.pnl_minutes = pnl_minutes.samples.into();
    state.today_sells = today_sells;
    state.today_wins = today_wins;
    state.watched_symbols = state.positions.keys().cloned().collect();
    drop(state);

    *ctx.strategy.write() = strategy;
}

async fn one_scan(ctx: &Arc<TenantContext>) {
    let now = now_ms();
    let scan_count = {
        let mut state = ctx.state.write();
        state.scan_count += 1;
        state.scan_count
    };

    maybe_refresh_symbols(ctx, now).await;

    if scan_count % 5 == 0 {
        let watched = { ctx.state.read().watched_symbols.clone() };
        let mut last_prices = std::collections::HashMap::new();
        for symbol in &watched {
            if let Some(ticker) = ctx.exchange.get_ticker(symbol).await {
                last_prices.insert(symbol.clone(), ticker.price);
            }
        }
        let (sold, adopted) = sync::reconcile(ctx, &last_prices).await;
        for symbol in sold {
            ctx.log("WARN", now, format!("sync: {symbol} marked externally sold"));
        }
        for symbol in adopted {
            ctx.log("INFO", now, format!("sync: adopted untracked holding {symbol}"));
        }
    }

    let fear_greed = crate::infrastructure::sentiment_client::fetch_fear_greed(&ctx.http_client).await;
    let (regime, btc_fragment) = market_wide_context(ctx, now).await;

    let mode_input = MarketModeInput {
        fear_greed,
        regime,
        btc_momentum_pct: Some(btc_momentum_from_fragment(&btc_fragment)),
        btc_dominance_trend_pct: None,
    };
    let market_mode = compute_market_mode(&mode_input);

    let adaptive = {
        let state = ctx.state.read();
        evaluate_adaptive_filter(&AdaptiveFilterInput {
            now_ms: now,
            consecutive_losses: state.consecutive_losses,
            last_loss_ts: state.last_loss_ts,
            fear_greed,
            today_sells: state.today_sells,
            today_wins: state.today_wins,
        })
    };

    {
        let mut state = ctx.state.write();
        state.regime = regime;
        state.market_mode = market_mode;
        state.scalp_mode = matches!(market_mode, MarketMode::Scalping);
    }

    let watched = { ctx.state.read().watched_symbols.clone() };
    let strategy = *ctx.strategy.read();
    let hour = chrono::DateTime::from_timestamp_millis(now).map(|dt| dt.hour()).unwrap_or(12);
    let sentiment = merge_sentiment(&SentimentInputs { fear_greed, ..Default::default() });

    for symbol in &watched {
        scan_symbol(ctx, symbol, now, hour, market_mode, &adaptive, &strategy, sentiment.fragment, btc_fragment).await;
    }

    if scan_count % 10 == 0 {
        emit_status_log(ctx, now, market_mode);
    }
}

async fn maybe_refresh_symbols(ctx: &Arc<TenantContext>, now: i64) {
    let (should_refresh, held) = {
        let state = ctx.state.read();
        (now - state.last_symbol_refresh_ms > symbols::SYMBOL_REFRESH_INTERVAL_MS, state.positions.keys().cloned().collect::<Vec<_>>())
    };
    if !should_refresh {
        return;
    }
    let universe: Vec<String> = vec![]; // exchange reports its own tradable universe
    let previous = { ctx.state.read().watched_symbols.clone() };
    let refreshed = symbols::refresh_from_exchange(ctx.exchange.as_ref(), &universe, &held, symbols::DEFAULT_WATCHLIST_SIZE, &previous).await;
    let mut state = ctx.state.write();
    state.watched_symbols = refreshed;
    state.last_symbol_refresh_ms = now;
}

/// Computes this scan's market-wide regime and BTC-leader fragment from
/// BTC/KRW's own candle series and ticker. Shared across every symbol's
/// compositor call rather than recomputed per-symbol.
async fn market_wide_context(ctx: &Arc<TenantContext>, now: i64) -> (Option<Regime>, ContextFragment) {
    let regime = match ctx.exchange.get_candles(BTC_SYMBOL, Timeframe::M5, PRIMARY_CANDLE_COUNT).await {
        Some(candles) => classify_regime(&candles).map(|c| c.regime),
        None => None,
    };

    let btc_fragment = match ctx.exchange.get_ticker(BTC_SYMBOL).await {
        Some(ticker) => {
            let price = rust_decimal::prelude::ToPrimitive::to_f64(&ticker.price).unwrap_or(0.0);
            let mut state = ctx.state.write();
            state.btc_leader.record(now, price);
            let (_, fragment) = state.btc_leader.classify(now);
            fragment
        }
        None => ContextFragment::neutral(),
    };

    (regime, btc_fragment)
}

/// Approximates a signed momentum percentage from the BTC-leader
/// fragment's boost, since the tracker reports a classification and a
/// bounded fragment rather than a raw percent change.
fn btc_momentum_from_fragment(fragment: &ContextFragment) -> f64 {
    if fragment.buy_boost > 0.0 {
        fragment.buy_boost
    } else if fragment.sell_boost > 0.0 {
        -fragment.sell_boost
    } else {
        0.0
    }
}

#[allow(clippy::too_many_arguments)]
async fn scan_symbol(
    ctx: &Arc<TenantContext>,
    symbol: &str,
    now: i64,
    hour: u32,
    market_mode: MarketMode,
    adaptive: &AdaptiveAdjustment,
    strategy: &StrategyParams,
    sentiment_fragment: ContextFragment,
    btc_fragment: ContextFragment,
) {
    let Some(candles) = ctx.exchange.get_candles(symbol, Timeframe::M5, PRIMARY_CANDLE_COUNT).await else {
        return;
    };
    if candles.len() < 2 {
        return;
    }

    let mut mtf_readings = Vec::new();
    if let Some(r) = read_timeframe(Timeframe::M5, &candles) {
        mtf_readings.push(r);
    }
    if let Some(h1) = ctx.exchange.get_candles(symbol, Timeframe::H1, MTF_CANDLE_COUNT).await {
        if let Some(r) = read_timeframe(Timeframe::H1, &h1) {
            mtf_readings.push(r);
        }
    }
    if let Some(h4) = ctx.exchange.get_candles(symbol, Timeframe::H4, MTF_CANDLE_COUNT).await {
        if let Some(r) = read_timeframe(Timeframe::H4, &h4) {
            mtf_readings.push(r);
        }
    }

    let bundle = bundle_mod::bundle(&candles, &mtf_readings);
    let last_candle_bullish = candles.last().map(|c| c.close >= c.open);

    let has_position = { ctx.state.read().positions.contains_key(symbol) };

    if has_position {
        let Some(ticker) = ctx.exchange.get_ticker(symbol).await else {
            return;
        };
        let action = {
            let mut state = ctx.state.write();
            match state.positions.get_mut(symbol) {
                Some(pos) => tick(pos, ticker.price, now, bundle.rsi, &strategy.position),
                None => PositionAction::Hold,
            }
        };

        match action {
            PositionAction::Sell { reason, force } => {
                if let Err(e) = executor::execute_sell(ctx, symbol, reason, force).await {
                    ctx.log("WARN", now, format!("{symbol} sell failed: {e}"));
                    Metrics::global().record_scan_error(&ctx.config.id);
                }
                return;
            }
            PositionAction::PartialSell { fraction, reason } => {
                if let Err(e) = executor::execute_partial_sell(ctx, symbol, fraction, reason).await {
                    ctx.log("WARN", now, format!("{symbol} partial sell failed: {e}"));
                    Metrics::global().record_scan_error(&ctx.config.id);
                }
            }
            PositionAction::Hold => {}
        }

        if strategy_allows_dca(strategy, market_mode) {
            let dca_plan = {
                let state = ctx.state.read();
                state.positions.get(symbol).and_then(|pos| plan_dca(pos, ticker.price, now, bundle.rsi, &strategy.position))
            };
            if let Some(plan) = dca_plan {
                if let Err(e) = executor::execute_dca(ctx, symbol, plan.krw_amount).await {
                    ctx.log("WARN", now, format!("{symbol} dca failed: {e}"));
                    Metrics::global().record_scan_error(&ctx.config.id);
                }
            }
        }
    }

    let mode_profile = market_mode.profile();
    let input = CompositorInput {
        bundle: &bundle,
        last_candle_bullish,
        orderbook: None,
        sentiment: sentiment_fragment,
        btc_leader: if symbol == BTC_SYMBOL { ContextFragment::neutral() } else { btc_fragment },
        funding_rate: funding_rate::evaluate(None),
        whale_flow: whale_flow::evaluate(None),
        kimchi_premium: kimchi_premium::evaluate(None),
        mode_buy_threshold_mult: mode_profile.buy_threshold_mult,
        adaptive_min_score_bump: adaptive.min_score_bump,
        hour,
        symbol,
        params: strategy.compositor,
    };

    let signal = {
        let state = ctx.state.read();
        compose(&input, &state.combo_store, &state.loss_rules)
    };

    {
        let mut state = ctx.state.write();
        state.last_signals.insert(symbol.to_string(), signal.clone());
    }

    let has_position = { ctx.state.read().positions.contains_key(symbol) };

    match signal.action {
        SignalAction::Buy if !has_position => {
            if adaptive.is_in_hard_cooldown(now) {
                return;
            }
            try_execute_buy(ctx, symbol, now, &signal, market_mode, adaptive, strategy).await;
        }
        SignalAction::Sell if has_position => {
            if let Err(e) = executor::execute_sell(ctx, symbol, "compositor_sell", false).await {
                ctx.log("WARN", now, format!("{symbol} compositor sell failed: {e}"));
                Metrics::global().record_scan_error(&ctx.config.id);
            }
        }
        _ => {}
    }
}

fn strategy_allows_dca(strategy: &StrategyParams, market_mode: MarketMode) -> bool {
    let _ = strategy;
    market_mode.profile().dca_enabled
}

async fn try_execute_buy(
    ctx: &Arc<TenantContext>,
    symbol: &str,
    now: i64,
    signal: &crate::domain::signal::Signal,
    market_mode: MarketMode,
    adaptive: &AdaptiveAdjustment,
    strategy: &StrategyParams,
) {
    let Some(balance) = ctx.exchange.get_balance().await else {
        return;
    };
    let mode_profile = market_mode.profile();
    let regime_mult = signal.regime.map(|r| r.multipliers().position_size_mult).unwrap_or(1.0);
    let size_mult = mode_profile.position_size_mult * adaptive.position_size_mult * regime_mult;
    let requested_amount = strategy.position_size(balance.free, size_mult);
    if requested_amount <= Decimal::ZERO {
        return;
    }

    let (open_positions, has_position) = {
        let state = ctx.state.read();
        (state.positions.len() as u32, state.positions.contains_key(symbol))
    };
    let scalp_eligible = matches!(market_mode, MarketMode::Scalping);

    let governor_input = GovernorInput {
        symbol,
        requested_amount,
        balance: balance.free,
        scalp_eligible,
        open_positions,
        has_position,
        now_ms: now,
    };
    let decision = {
        let state = ctx.state.read();
        can_open(&strategy.risk, &state.risk_state, &governor_input)
    };
    if !decision.allowed {
        return;
    }

    let is_blacklisted = { ctx.state.read().buy_blacklist.contains(symbol) };
    if is_blacklisted {
        return;
    }

    let amount = decision.max_amount.unwrap_or(requested_amount).min(requested_amount);
    if let Err(e) = executor::execute_buy(ctx, symbol, amount, signal.reasons.label(), signal.reasons, signal.buy_score, signal.regime).await {
        ctx.log("WARN", now, format!("{symbol} buy failed: {e}"));
        Metrics::global().record_scan_error(&ctx.config.id);
    }
}

fn emit_status_log(ctx: &Arc<TenantContext>, now: i64, market_mode: MarketMode) {
    let (open, daily_pnl) = {
        let state = ctx.state.read();
        (state.positions.len(), state.risk_state.daily_realized_pnl)
    };
    ctx.log("INFO", now, format!("scan status: {open} open positions, daily_pnl={daily_pnl}, mode={market_mode:?}"));
}

/// Shutdown liquidation (spec §4.9): best-effort market-sell every open
/// position. A symbol the exchange won't fill is logged and left for the
/// next boot's journal replay to reconcile.
async fn liquidate_all(ctx: &Arc<TenantContext>) {
    let symbols: Vec<String> = { ctx.state.read().positions.keys().cloned().collect() };
    for symbol in symbols {
        if let Err(e) = executor::execute_sell(ctx, &symbol, "shutdown_liquidation", true).await {
            ctx.log("ERROR", now_ms(), format!("shutdown liquidation of {symbol} failed: {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn btc_momentum_sign_follows_dominant_boost() {
        let buy = ContextFragment { buy_boost: 1.2, sell_boost: 0.0, reason: "btc_leader_bullish" };
        assert!(btc_momentum_from_fragment(&buy) > 0.0);
        let sell = ContextFragment { buy_boost: 0.0, sell_boost: 0.8, reason: "btc_leader_bearish" };
        assert!(btc_momentum_from_fragment(&sell) < 0.0);
        assert_eq!(btc_momentum_from_fragment(&ContextFragment::neutral()), 0.0);
    }
}
