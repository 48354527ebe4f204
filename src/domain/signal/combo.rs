use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::reason::ReasonSet;

/// Running stats for one reason-set combination, updated online by every
/// SELL (spec §4.8 step 8 — "combo-tracker runs online, not batch").
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComboStats {
    pub trades: u32,
    pub wins: u32,
    pub total_pnl_pct: f64,
    pub total_buy_score: f64,
}

impl ComboStats {
    pub fn win_rate(&self) -> f64 {
        if self.trades == 0 {
            0.5
        } else {
            self.wins as f64 / self.trades as f64
        }
    }

    pub fn avg_pnl_pct(&self) -> f64 {
        if self.trades == 0 {
            0.0
        } else {
            self.total_pnl_pct / self.trades as f64
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComboStore {
    entries: HashMap<u8, ComboStats>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComboQueryResult {
    pub adjustment: f64,
    pub block: bool,
}

impl ComboStore {
    /// Queries the candidate reason set the compositor is about to emit.
    /// Blocks outright when the combo has a dismal track record over a
    /// meaningful sample; otherwise nudges `buy_score` by up to ±1.0.
    pub fn query(&self, reasons: ReasonSet) -> ComboQueryResult {
        let Some(stats) = self.entries.get(&reasons.bits()) else {
            return ComboQueryResult { adjustment: 0.0, block: false };
        };
        if stats.trades >= 5 && stats.win_rate() < 0.2 {
            return ComboQueryResult { adjustment: -1.0, block: true };
        }
        let adjustment = ((stats.win_rate() - 0.5) * 2.0).clamp(-1.0, 1.0);
        ComboQueryResult { adjustment, block: false }
    }

    /// Called from every SELL with the reason set the original BUY
    /// carried.
    pub fn record_combo_result(&mut self, buy_reasons: ReasonSet, pnl_pct: f64, buy_score: f64) {
        let entry = self.entries.entry(buy_reasons.bits()).or_default();
        entry.trades += 1;
        if pnl_pct > 0.0 {
            entry.wins += 1;
        }
        entry.total_pnl_pct += pnl_pct;
        entry.total_buy_score += buy_score;
    }

    /// Every tracked reason-set and its accumulated stats, read by the
    /// learning pass when it tunes the compositor's buy threshold against
    /// which combos have actually paid off.
    pub fn entries(&self) -> impl Iterator<Item = (ReasonSet, ComboStats)> + '_ {
        self.entries.iter().map(|(&bits, &stats)| (ReasonSet::from_bits(bits), stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_combo_is_neutral() {
        let store = ComboStore::default();
        let result = store.query(ReasonSet::RSI);
        assert_eq!(result.adjustment, 0.0);
        assert!(!result.block);
    }

    #[test]
    fn dismal_combo_blocks_after_enough_trades() {
        let mut store = ComboStore::default();
        let reasons = ReasonSet::RSI.union(ReasonSet::BB);
        for _ in 0..6 {
            store.record_combo_result(reasons, -2.0, 2.5);
        }
        let result = store.query(reasons);
        assert!(result.block);
    }

    #[test]
    fn strong_combo_gets_positive_adjustment() {
        let mut store = ComboStore::default();
        let reasons = ReasonSet::MACD;
        for _ in 0..8 {
            store.record_combo_result(reasons, 3.0, 2.5);
        }
        let result = store.query(reasons);
        assert!(result.adjustment > 0.0);
        assert!(!result.block);
    }
}
