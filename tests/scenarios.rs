//! End-to-end scenarios exercising the full stack (application + domain +
//! infrastructure) the way a single tenant's scan loop would, without
//! actually running the loop's own sleep/poll cadence. Each scenario
//! drives the same public entry points (`executor::*`, `sync::reconcile`,
//! the risk governor) the trading loop calls, against an in-memory
//! [`PaperExchange`] and a throwaway ledger directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use kimchi_engine::application::context::TenantContext;
use kimchi_engine::application::{executor, sync};
use kimchi_engine::domain::ports::{Holding, Ticker};
use kimchi_engine::domain::position::{can_dca, plan_dca, tick, PositionAction, PositionParams};
use kimchi_engine::domain::risk::{can_open, GovernorInput, RiskConfig};
use kimchi_engine::domain::risk::state::RiskState;
use kimchi_engine::domain::signal::ReasonSet;
use kimchi_engine::domain::tenant::TenantConfig;
use kimchi_engine::infrastructure::notify::TracingNotifier;
use kimchi_engine::infrastructure::paper_exchange::PaperExchange;
use kimchi_engine::infrastructure::persistence::TenantStore;

struct TempDir(PathBuf);

impl TempDir {
    fn new(label: &str) -> Self {
        let mut p = std::env::temp_dir();
        p.push(format!("kimchi-engine-scenario-{label}-{}-{}", std::process::id(), rand::random::<u64>()));
        std::fs::create_dir_all(&p).unwrap();
        Self(p)
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn tenant_config(id: &str) -> TenantConfig {
    TenantConfig {
        id: id.to_string(),
        nickname: id.to_string(),
        access_key: String::new(),
        secret_key: String::new(),
        dashboard_port: 3737,
        paper_trade: true,
        paper_balance: dec!(1_000_000),
        notify_token: None,
        scan_interval_secs: 30,
        dashboard_token: "test-token".to_string(),
    }
}

fn ticker(price: Decimal) -> Ticker {
    Ticker { price, volume: dec!(100), change_pct: 0.0, high: price, low: price }
}

fn build_ctx(label: &str, balance: Decimal) -> (Arc<TenantContext>, Arc<PaperExchange>, TempDir) {
    let dir = TempDir::new(label);
    let store = Arc::new(TenantStore::new(dir.path()).unwrap());
    let exchange = Arc::new(PaperExchange::new(balance));
    let notifier = Arc::new(TracingNotifier::new(label.to_string()));
    let ctx = Arc::new(TenantContext::new(tenant_config(label), exchange.clone(), notifier, store, balance));
    (ctx, exchange, dir)
}

/// Scenario 1: a position bought via the executor, pushed past its
/// take-profit price by the next tick, closes with a positive realized
/// P&L and an empty book.
#[tokio::test]
async fn basic_take_profit_closes_position_with_gain() {
    let (ctx, exchange, _dir) = build_ctx("basic-tp", dec!(1_000_000));
    exchange.feed_ticker("BTC/KRW", ticker(dec!(100_000)));

    executor::execute_buy(&ctx, "BTC/KRW", dec!(100_000), "rsi_oversold".to_string(), ReasonSet::RSI, 2.0, None)
        .await
        .expect("buy should fill against the fed ticker");
    assert!(ctx.state.read().positions.contains_key("BTC/KRW"));

    // Both partial exits (default thresholds 3%/5%) have to fire and clear
    // before step 7's take-profit check is even reached.
    let params = ctx.strategy.read().position;
    let opened_at = ctx.state.read().positions["BTC/KRW"].opened_at_ms;
    let steps = [(opened_at + 60_000, dec!(103_500)), (opened_at + 120_000, dec!(105_500)), (opened_at + 180_000, dec!(106_000))];
    let mut last_action = PositionAction::Hold;
    for (ts, price) in steps {
        last_action = {
            let mut state = ctx.state.write();
            let pos = state.positions.get_mut("BTC/KRW").unwrap();
            tick(pos, price, ts, None, &params)
        };
    }
    assert_eq!(last_action, PositionAction::Sell { reason: "take_profit", force: false });

    exchange.feed_ticker("BTC/KRW", ticker(dec!(106_000)));
    executor::execute_sell(&ctx, "BTC/KRW", "take_profit", false).await.expect("sell should fill");

    assert!(!ctx.state.read().positions.contains_key("BTC/KRW"));
    assert!(ctx.state.read().risk_state.daily_realized_pnl > Decimal::ZERO);
    assert_eq!(ctx.store.read_journal().len(), 2);
}

/// Scenario 2: repeated, spaced stop touches without a recovery confirm
/// the whipsaw stop and reject the position rather than holding forever.
#[tokio::test]
async fn whipsaw_confirmed_stop_rejects_the_position() {
    let (ctx, exchange, _dir) = build_ctx("whipsaw", dec!(1_000_000));
    exchange.feed_ticker("BTC/KRW", ticker(dec!(100_000)));
    executor::execute_buy(&ctx, "BTC/KRW", dec!(100_000), "rsi_oversold".to_string(), ReasonSet::RSI, 2.0, None).await.unwrap();

    let params = ctx.strategy.read().position;
    {
        let mut state = ctx.state.write();
        let pos = state.positions.get_mut("BTC/KRW").unwrap();
        pos.stop_loss = dec!(97_500);
    }

    let opened_at = ctx.state.read().positions["BTC/KRW"].opened_at_ms;
    let touches = [(opened_at, dec!(97_400)), (opened_at + 70_000, dec!(97_300)), (opened_at + 310_000, dec!(97_200))];
    let mut last_action = PositionAction::Hold;
    for (ts, price) in touches {
        last_action = {
            let mut state = ctx.state.write();
            let pos = state.positions.get_mut("BTC/KRW").unwrap();
            tick(pos, price, ts, None, &params)
        };
    }
    assert_eq!(last_action, PositionAction::Sell { reason: "whipsaw_confirmed_stop", force: false });
}

/// Scenario 3: a position deep enough underwater to qualify for DCA gets
/// averaged down, then recovers to take-profit on the new, lower entry.
#[tokio::test]
async fn dca_then_exit_recomputes_entry_before_closing() {
    let (ctx, exchange, _dir) = build_ctx("dca-exit", dec!(2_000_000));
    exchange.feed_ticker("BTC/KRW", ticker(dec!(100_000)));
    executor::execute_buy(&ctx, "BTC/KRW", dec!(100_000), "rsi_oversold".to_string(), ReasonSet::RSI, 2.0, None).await.unwrap();

    let params = ctx.strategy.read().position;
    let opened_at = ctx.state.read().positions["BTC/KRW"].opened_at_ms;
    let dca_ts = opened_at + (params.dca_min_hold_min * 60_000 + 1_000);

    exchange.feed_ticker("BTC/KRW", ticker(dec!(97_000)));
    let allowed = {
        let state = ctx.state.read();
        let pos = &state.positions["BTC/KRW"];
        can_dca(pos, dec!(97_000), dca_ts, Some(30.0), &params)
    };
    assert!(allowed, "a -3% position past the minimum hold should qualify for DCA");

    let plan = {
        let state = ctx.state.read();
        let pos = &state.positions["BTC/KRW"];
        plan_dca(pos, dec!(97_000), dca_ts, Some(30.0), &params)
    };
    let plan = plan.expect("dca plan should size against the existing position");
    executor::execute_dca(&ctx, "BTC/KRW", plan.krw_amount).await.unwrap();

    let entry_after_dca = ctx.state.read().positions["BTC/KRW"].entry_price;
    assert!(entry_after_dca < dec!(100_000));
    assert_eq!(ctx.state.read().positions["BTC/KRW"].dca_count, 1);

    let exit_price = entry_after_dca * dec!(1.06);
    exchange.feed_ticker("BTC/KRW", ticker(exit_price));
    let action = {
        let mut state = ctx.state.write();
        let pos = state.positions.get_mut("BTC/KRW").unwrap();
        tick(pos, exit_price, dca_ts + 60_000, None, &params)
    };
    assert_eq!(action, PositionAction::Sell { reason: "take_profit", force: false });
    executor::execute_sell(&ctx, "BTC/KRW", "take_profit", false).await.unwrap();
    assert!(!ctx.state.read().positions.contains_key("BTC/KRW"));
}

/// Scenario 4: once today's realized loss breaches the configured daily
/// cap, the governor blocks every further buy regardless of size.
#[test]
fn daily_loss_limit_blocks_new_buys() {
    let config = RiskConfig::default();
    let mut state = RiskState::new(dec!(1_000_000));
    state.record_sell("BTC/KRW", 0, config.daily_loss_limit_krw - dec!(1));

    let input = GovernorInput {
        symbol: "ETH/KRW",
        requested_amount: dec!(10_000),
        balance: dec!(500_000),
        scalp_eligible: false,
        open_positions: 0,
        has_position: false,
        now_ms: 1,
    };
    let decision = can_open(&config, &state, &input);
    assert!(!decision.allowed);
}

/// Scenario 5: a symbol whose on-exchange balance disappears outside the
/// bot is marked sold (not silently dropped) and removed from the book.
#[tokio::test]
async fn external_sell_sync_closes_untracked_disappearance() {
    let (ctx, exchange, _dir) = build_ctx("ext-sell", dec!(1_000_000));
    exchange.feed_ticker("BTC/KRW", ticker(dec!(100_000)));
    executor::execute_buy(&ctx, "BTC/KRW", dec!(100_000), "rsi_oversold".to_string(), ReasonSet::RSI, 2.0, None).await.unwrap();
    assert!(ctx.state.read().positions.contains_key("BTC/KRW"));

    // The position was manually sold on the exchange: nothing left to hold.
    let mut last_prices = std::collections::HashMap::new();
    last_prices.insert("BTC/KRW".to_string(), dec!(100_000));
    let (sold, adopted) = sync::reconcile(&ctx, &last_prices).await;

    assert_eq!(sold, vec!["BTC/KRW".to_string()]);
    assert!(adopted.is_empty());
    assert!(!ctx.state.read().positions.contains_key("BTC/KRW"));
}

/// Scenario 6: an untracked holding above the dust threshold is adopted
/// into management, but a protected coin never is.
#[tokio::test]
async fn adoption_skips_protected_coins() {
    let (ctx, exchange, _dir) = build_ctx("adopt", dec!(1_000_000));
    exchange.seed_holding("ETH/KRW", Holding { quantity: dec!(1), avg_buy_price: dec!(3_000_000) });
    exchange.seed_holding("XRP/KRW", Holding { quantity: dec!(10), avg_buy_price: dec!(500) });
    ctx.state.write().protected_coins.add("XRP/KRW");

    let (sold, adopted) = sync::reconcile(&ctx, &std::collections::HashMap::new()).await;
    assert!(sold.is_empty());
    assert_eq!(adopted, vec!["ETH/KRW".to_string()]);
    assert!(ctx.state.read().positions.contains_key("ETH/KRW"));
    assert!(!ctx.state.read().positions.contains_key("XRP/KRW"));
}
