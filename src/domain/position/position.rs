use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-symbol, per-tenant tunables the state machine reads each tick.
/// Defaults live in tenant config; the learning pass (C8) overwrites a
/// subset of these via `learned-params.json`, each clamped to
/// `default ± 50%`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionParams {
    pub breakeven_trigger_pct: f64,
    pub trailing_activate_pct: f64,
    pub trailing_distance_pct: f64,
    pub partial_exit_1_pct: f64,
    pub partial_exit_1_fraction: f64,
    pub partial_exit_2_pct: f64,
    pub partial_exit_2_fraction: f64,
    pub hard_drop_pct: f64,
    pub confirm_interval_ms: i64,
    pub confirm_count: u32,
    pub confirm_duration_ms: i64,
    pub rsi_oversold_protection: f64,
    pub take_profit_pct: f64,
    pub max_hold_secs: i64,
    pub hard_max_hold_hours: i64,
    pub dca_trigger_pct: f64,
    pub dca_max_count: u32,
    pub dca_min_hold_min: i64,
    pub dca_rsi_max: f64,
    pub dca_min_interval_ms: i64,
}

impl Default for PositionParams {
    fn default() -> Self {
        Self {
            breakeven_trigger_pct: 1.0,
            trailing_activate_pct: 2.0,
            trailing_distance_pct: 1.5,
            partial_exit_1_pct: 3.0,
            partial_exit_1_fraction: 0.3,
            partial_exit_2_pct: 5.0,
            partial_exit_2_fraction: 0.3,
            hard_drop_pct: -5.0,
            confirm_interval_ms: 60_000,
            confirm_count: 3,
            confirm_duration_ms: 300_000,
            rsi_oversold_protection: 25.0,
            take_profit_pct: 5.0,
            max_hold_secs: 4 * 3600,
            hard_max_hold_hours: 12,
            dca_trigger_pct: -3.0,
            dca_max_count: 2,
            dca_min_hold_min: 30,
            dca_rsi_max: 35.0,
            dca_min_interval_ms: 30 * 60_000,
        }
    }
}

/// Whipsaw-confirmed-stop bookkeeping, reset in full whenever the price
/// recovers above the stop between touches.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WhipsawState {
    pub first_stop_hit_ts: Option<i64>,
    pub last_stop_hit_ts: Option<i64>,
    pub stop_hit_count: u32,
}

impl WhipsawState {
    pub fn reset(&mut self) {
        *self = WhipsawState::default();
    }
}

/// An open long exposure on a single symbol for one tenant. Mutated only by
/// its own loop's scan tick or the shutdown liquidator — never both at
/// once (spec §5 ordering guarantee).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub total_cost: Decimal,
    pub opened_at_ms: i64,
    pub highest_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub breakeven_set: bool,
    pub trailing_active: bool,
    pub partial_sells: u32,
    pub dca_count: u32,
    pub last_dca_ts: Option<i64>,
    pub whipsaw: WhipsawState,
    pub max_hold_until_ms: i64,
    pub sell_attempts: u32,
    pub buy_reason: String,
    pub buy_regime: Option<String>,
    /// The `ReasonSet` bits behind `buy_reason`, carried alongside the
    /// label so the combo-tracker can credit or blame the exact
    /// contributing signal family at sell time without re-parsing text.
    #[serde(default)]
    pub buy_reason_bits: u8,
    #[serde(default)]
    pub buy_score: f64,
}

impl Position {
    pub fn new(
        symbol: impl Into<String>,
        entry_price: Decimal,
        quantity: Decimal,
        opened_at_ms: i64,
        params: &PositionParams,
        buy_reason: impl Into<String>,
    ) -> Self {
        let stop_loss = entry_price * (Decimal::ONE + Decimal::try_from(params.hard_drop_pct / 100.0).unwrap_or_default());
        let take_profit = entry_price * (Decimal::ONE + Decimal::try_from(params.take_profit_pct / 100.0).unwrap_or_default());
        Self {
            symbol: symbol.into(),
            entry_price,
            quantity,
            total_cost: entry_price * quantity,
            opened_at_ms,
            highest_price: entry_price,
            stop_loss,
            take_profit,
            breakeven_set: false,
            trailing_active: false,
            partial_sells: 0,
            dca_count: 0,
            last_dca_ts: None,
            whipsaw: WhipsawState::default(),
            max_hold_until_ms: opened_at_ms + params.max_hold_secs * 1000,
            sell_attempts: 0,
            buy_reason: buy_reason.into(),
            buy_regime: None,
            buy_reason_bits: 0,
            buy_score: 0.0,
        }
    }

    pub fn pnl_pct(&self, price: Decimal) -> f64 {
        if self.entry_price.is_zero() {
            return 0.0;
        }
        ((price - self.entry_price) / self.entry_price * Decimal::ONE_HUNDRED)
            .to_f64()
            .unwrap_or(0.0)
    }

    pub fn hold_ms(&self, now_ms: i64) -> i64 {
        (now_ms - self.opened_at_ms).max(0)
    }

    /// Recomputes `entry_price` as the weighted average after a DCA fill,
    /// then resets every exit-tracking flag per spec §4.4's "On DCA fill"
    /// clause.
    pub fn apply_dca(&mut self, fill_price: Decimal, fill_qty: Decimal, now_ms: i64, params: &PositionParams) {
        self.total_cost += fill_price * fill_qty;
        self.quantity += fill_qty;
        self.entry_price = self.total_cost / self.quantity;
        self.highest_price = self.entry_price;
        self.stop_loss = self.entry_price * (Decimal::ONE + Decimal::try_from(params.hard_drop_pct / 100.0).unwrap_or_default());
        self.take_profit = self.entry_price * (Decimal::ONE + Decimal::try_from(params.take_profit_pct / 100.0).unwrap_or_default());
        self.breakeven_set = false;
        self.trailing_active = false;
        self.whipsaw.reset();
        self.dca_count += 1;
        self.last_dca_ts = Some(now_ms);
    }
}
