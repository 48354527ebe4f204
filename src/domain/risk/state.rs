use std::collections::{HashMap, VecDeque};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-tenant rolling risk bookkeeping the governor consults on every
/// `can_open` call. Reconstructed at startup by replaying today's trades
/// from the journal (spec §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskState {
    pub daily_realized_pnl: Decimal,
    pub daily_reference_date: chrono::NaiveDate,
    pub initial_balance: Decimal,
    pub consecutive_losses: u32,
    pub last_buy_ts: Option<i64>,
    pub last_sell_ts: HashMap<String, i64>,
    #[serde(skip)]
    pub buy_timestamps_last_hour: VecDeque<i64>,
}

impl RiskState {
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            daily_realized_pnl: Decimal::ZERO,
            daily_reference_date: chrono::Utc::now().date_naive(),
            initial_balance,
            consecutive_losses: 0,
            last_buy_ts: None,
            last_sell_ts: HashMap::new(),
            buy_timestamps_last_hour: VecDeque::new(),
        }
    }

    pub fn record_buy(&mut self, now_ms: i64) {
        self.last_buy_ts = Some(now_ms);
        self.buy_timestamps_last_hour.push_back(now_ms);
        self.prune_hourly_window(now_ms);
    }

    pub fn record_sell(&mut self, symbol: &str, now_ms: i64, pnl_amount: Decimal) {
        self.last_sell_ts.insert(symbol.to_string(), now_ms);
        self.daily_realized_pnl += pnl_amount;
        if pnl_amount.is_sign_negative() && !pnl_amount.is_zero() {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }
    }

    pub fn hourly_buy_count(&mut self, now_ms: i64) -> u32 {
        self.prune_hourly_window(now_ms);
        self.buy_timestamps_last_hour.len() as u32
    }

    fn prune_hourly_window(&mut self, now_ms: i64) {
        while let Some(&front) = self.buy_timestamps_last_hour.front() {
            if now_ms - front > 3_600_000 {
                self.buy_timestamps_last_hour.pop_front();
            } else {
                break;
            }
        }
    }

    /// Resets daily counters when the wall-clock date rolls over.
    pub fn roll_day_if_needed(&mut self, today: chrono::NaiveDate) {
        if today != self.daily_reference_date {
            self.daily_reference_date = today;
            self.daily_realized_pnl = Decimal::ZERO;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn hourly_window_prunes_old_buys() {
        let mut state = RiskState::new(dec!(1_000_000));
        state.record_buy(0);
        state.record_buy(10_000);
        assert_eq!(state.hourly_buy_count(20_000), 2);
        assert_eq!(state.hourly_buy_count(3_700_000), 0);
    }

    #[test]
    fn consecutive_losses_reset_on_win() {
        let mut state = RiskState::new(dec!(1_000_000));
        state.record_sell("BTC/KRW", 0, dec!(-100));
        state.record_sell("BTC/KRW", 1000, dec!(-50));
        assert_eq!(state.consecutive_losses, 2);
        state.record_sell("BTC/KRW", 2000, dec!(200));
        assert_eq!(state.consecutive_losses, 0);
    }
}
