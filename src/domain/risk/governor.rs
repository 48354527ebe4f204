use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::domain::errors::RiskViolation;

use super::state::RiskState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskConfig {
    pub daily_loss_limit_krw: Decimal,
    pub recovery_cooldown_ms: i64,
    pub max_daily_loss_pct: f64,
    pub hourly_max_trades: u32,
    pub base_max_positions: u32,
    pub scalp_extra_slot: u32,
    pub sell_cooldown_ms: i64,
    pub max_position_pct: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            daily_loss_limit_krw: Decimal::new(-100_000, 0),
            recovery_cooldown_ms: 15 * 60_000,
            max_daily_loss_pct: 5.0,
            hourly_max_trades: 10,
            base_max_positions: 5,
            scalp_extra_slot: 1,
            sell_cooldown_ms: 10 * 60_000,
            max_position_pct: 20.0,
        }
    }
}

/// Live facts the governor needs for one `can_open` decision. A plain
/// struct rather than the full risk-manager object, mirroring the
/// teacher's `ValidationContext` idiom of passing a read-only snapshot
/// into a pure check.
pub struct GovernorInput<'a> {
    pub symbol: &'a str,
    pub requested_amount: Decimal,
    pub balance: Decimal,
    pub scalp_eligible: bool,
    pub open_positions: u32,
    pub has_position: bool,
    pub now_ms: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanOpenResult {
    pub allowed: bool,
    pub reason: Option<RiskViolation>,
    pub max_amount: Option<Decimal>,
}

impl CanOpenResult {
    fn reject(reason: RiskViolation) -> Self {
        Self { allowed: false, reason: Some(reason), max_amount: None }
    }

    fn approve(max_amount: Decimal) -> Self {
        Self { allowed: true, reason: None, max_amount: Some(max_amount) }
    }
}

/// Dynamic max open positions: base reduced by 1/2/3 at 2/3/5 consecutive
/// losses, plus one scalp-mode slot when the caller is scalp-eligible.
pub fn dynamic_max_positions(config: &RiskConfig, consecutive_losses: u32, scalp_eligible: bool) -> u32 {
    let reduction = match consecutive_losses {
        0..=1 => 0,
        2 => 1,
        3..=4 => 2,
        _ => 3,
    };
    let base = config.base_max_positions.saturating_sub(reduction);
    if scalp_eligible {
        base + config.scalp_extra_slot
    } else {
        base
    }
}

/// Evaluates the 8 precedence-ordered risk rules from spec §4.4.
/// Deterministic given identical inputs; never allows more than
/// `dynamic_max_positions` open positions at once.
pub fn can_open(config: &RiskConfig, state: &RiskState, input: &GovernorInput<'_>) -> CanOpenResult {
    // 1. Daily realized P&L at or below the configured KRW loss limit.
    if state.daily_realized_pnl <= config.daily_loss_limit_krw {
        return CanOpenResult::reject(RiskViolation::DailyLossLimit {
            realized: state.daily_realized_pnl,
            limit: config.daily_loss_limit_krw,
        });
    }

    // 2. Within 80% of the limit and a recent buy: recovery cooldown.
    let limit_abs = config.daily_loss_limit_krw.abs();
    let loss_abs = (-state.daily_realized_pnl).max(Decimal::ZERO);
    if limit_abs > Decimal::ZERO && loss_abs >= limit_abs * Decimal::new(80, 2) {
        if let Some(last_buy) = state.last_buy_ts {
            if input.now_ms - last_buy < config.recovery_cooldown_ms {
                let pct = (loss_abs / limit_abs * Decimal::ONE_HUNDRED).to_f64().unwrap_or(80.0);
                return CanOpenResult::reject(RiskViolation::RecoveryCooldown { pct });
            }
        }
    }

    // 3. Daily P&L at or below initial_balance * -max_daily_loss_pct.
    let pct_floor = state.initial_balance * Decimal::try_from(-config.max_daily_loss_pct / 100.0).unwrap_or_default();
    if state.daily_realized_pnl <= pct_floor {
        return CanOpenResult::reject(RiskViolation::MaxDailyLossPct { pct: config.max_daily_loss_pct });
    }

    // 4. Hourly buy cap.
    let mut state_clone_buys = state.buy_timestamps_last_hour.clone();
    while let Some(&front) = state_clone_buys.front() {
        if input.now_ms - front > 3_600_000 {
            state_clone_buys.pop_front();
        } else {
            break;
        }
    }
    let hourly_count = state_clone_buys.len() as u32;
    if hourly_count >= config.hourly_max_trades {
        return CanOpenResult::reject(RiskViolation::HourlyTradeCap { count: hourly_count });
    }

    // 5. Dynamic max open positions.
    let max_positions = dynamic_max_positions(config, state.consecutive_losses, input.scalp_eligible);
    if input.open_positions >= max_positions {
        return CanOpenResult::reject(RiskViolation::MaxOpenPositions { open: input.open_positions, max: max_positions });
    }

    // 6. Symbol already held.
    if input.has_position {
        return CanOpenResult::reject(RiskViolation::AlreadyHeld { symbol: input.symbol.to_string() });
    }

    // 7. Recent sell cooldown on this symbol.
    if let Some(&last_sell) = state.last_sell_ts.get(input.symbol) {
        if input.now_ms - last_sell < config.sell_cooldown_ms {
            return CanOpenResult::reject(RiskViolation::SellCooldown { symbol: input.symbol.to_string() });
        }
    }

    // 8. Requested amount within max_position_pct of balance.
    let cap = input.balance * Decimal::try_from(config.max_position_pct / 100.0).unwrap_or_default();
    if input.requested_amount > cap {
        return CanOpenResult::reject(RiskViolation::ExceedsMaxPositionPct { requested: input.requested_amount, cap });
    }

    CanOpenResult::approve(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn input(symbol: &str) -> GovernorInput<'_> {
        GovernorInput {
            symbol,
            requested_amount: dec!(50_000),
            balance: dec!(1_000_000),
            scalp_eligible: false,
            open_positions: 0,
            has_position: false,
            now_ms: 10_000_000,
        }
    }

    #[test]
    fn daily_loss_limit_blocks_first() {
        let config = RiskConfig::default();
        let mut state = RiskState::new(dec!(1_000_000));
        state.daily_realized_pnl = dec!(-150_000);
        let result = can_open(&config, &state, &input("BTC/KRW"));
        assert!(!result.allowed);
        assert!(matches!(result.reason, Some(RiskViolation::DailyLossLimit { .. })));
    }

    #[test]
    fn approves_within_all_bounds() {
        let config = RiskConfig::default();
        let state = RiskState::new(dec!(1_000_000));
        let result = can_open(&config, &state, &input("BTC/KRW"));
        assert!(result.allowed);
    }

    #[test]
    fn already_held_symbol_rejected() {
        let config = RiskConfig::default();
        let state = RiskState::new(dec!(1_000_000));
        let mut i = input("BTC/KRW");
        i.has_position = true;
        let result = can_open(&config, &state, &i);
        assert!(matches!(result.reason, Some(RiskViolation::AlreadyHeld { .. })));
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let config = RiskConfig::default();
        let state = RiskState::new(dec!(1_000_000));
        let i = input("BTC/KRW");
        assert_eq!(can_open(&config, &state, &i), can_open(&config, &state, &i));
    }

    #[test]
    fn dynamic_max_shrinks_with_consecutive_losses() {
        let config = RiskConfig::default();
        assert_eq!(dynamic_max_positions(&config, 0, false), 5);
        assert_eq!(dynamic_max_positions(&config, 2, false), 4);
        assert_eq!(dynamic_max_positions(&config, 3, false), 3);
        assert_eq!(dynamic_max_positions(&config, 5, false), 2);
        assert_eq!(dynamic_max_positions(&config, 5, true), 3);
    }

    #[test]
    fn never_exceeds_dynamic_max_open_positions() {
        let config = RiskConfig::default();
        let state = RiskState::new(dec!(1_000_000));
        let max = dynamic_max_positions(&config, state.consecutive_losses, false);
        let mut i = input("BTC/KRW");
        i.open_positions = max;
        let result = can_open(&config, &state, &i);
        assert!(!result.allowed);
    }
}
