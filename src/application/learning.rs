//! C8: the offline learning pass. Reads the closed-trade history out of a
//! tenant's own journal and the combo-tracker it's been feeding online,
//! grid-searches the seven learnable strategy keys in parallel, and
//! derives a blacklist plus loss-pattern rules from whatever buckets the
//! history actually supports. Pure computation over already-loaded data;
//! the caller (the `learn` binary) owns reading the journal and writing
//! the three resulting files back out.

use std::collections::HashMap;

use chrono::{Datelike, Timelike};
use rayon::prelude::*;

use crate::domain::ledger::{Blacklist, LearnedParamDefaults, LearnedParams, LearnedParamsRecord, TradeJournalEntry, TradePair};
use crate::domain::ledger::fifo_match;
use crate::domain::signal::{ComboStore, LossPatternAction, LossPatternRule};

/// Below this many FIFO-matched round trips there isn't enough signal to
/// trust a grid search; the pass returns confidence 0 and leaves every
/// downstream file untouched (spec §4.8 step 2).
const MIN_PAIRS_FOR_LEARNING: usize = 30;

/// Candidates per learnable key, evenly spaced across `default ± 50%` —
/// the same half-range [`LearnedParams::clamped`] enforces, so nothing
/// the grid search picks ever needs clamping in practice.
const GRID_POINTS: usize = 11;

/// A bucket (hour, weekday, or symbol) needs at least this many trades
/// before its win rate is trusted for a blacklist or loss-pattern entry.
const MIN_BUCKET_TRADES: usize = 5;
const MIN_BLACKLIST_TRADES: usize = 3;

const BLOCK_LOSSRATE: f64 = 0.6;
const WARN_LOSSRATE: f64 = 0.5;
const BLACKLIST_WINRATE: f64 = 0.25;

pub struct LearningOutcome {
    pub record: LearnedParamsRecord,
    pub loss_rules: Vec<LossPatternRule>,
    pub blacklist: Blacklist,
}

/// Runs the full C8 pass. `now_ms` stamps `updated_ts`; the caller
/// supplies it rather than this module reading the clock itself, keeping
/// the grid search and bucketing deterministic and unit-testable.
pub fn run_learning_pass(journal: &[TradeJournalEntry], combo_store: &ComboStore, defaults: &LearnedParamDefaults, now_ms: i64) -> LearningOutcome {
    let pairs = fifo_match(journal);

    if pairs.len() < MIN_PAIRS_FOR_LEARNING {
        return LearningOutcome {
            record: LearnedParamsRecord { confidence: 0.0, updated_ts: now_ms, ..Default::default() },
            loss_rules: Vec::new(),
            blacklist: Blacklist::default(),
        };
    }

    let by_hour = bucket_by_hour(&pairs);
    let by_weekday = bucket_by_weekday(&pairs);
    let by_symbol = bucket_by_symbol(&pairs);

    let raw = grid_search(&pairs, combo_store, defaults);
    let params = LearnedParams::clamped(&raw, defaults);

    let consistency = bucket_consistency(&by_hour, &pairs);
    let confidence = 0.6 * (pairs.len() as f64 / 200.0).min(1.0) + 0.4 * consistency;

    let preferred_hours = by_hour
        .iter()
        .filter(|(_, trades)| trades.len() >= MIN_BUCKET_TRADES)
        .filter(|(_, trades)| win_rate(trades) >= 0.6)
        .map(|(hour, _)| *hour)
        .collect();
    let avoid_hours = by_hour
        .iter()
        .filter(|(_, trades)| trades.len() >= MIN_BUCKET_TRADES)
        .filter(|(_, trades)| win_rate(trades) < 0.4)
        .map(|(hour, _)| *hour)
        .collect();

    let symbol_scores = by_symbol
        .iter()
        .map(|(symbol, trades)| (symbol.clone(), avg_pnl_pct(trades)))
        .collect();

    let mut blacklist = Blacklist::default();
    let mut record_blacklist = Vec::new();
    for (symbol, trades) in &by_symbol {
        if trades.len() >= MIN_BLACKLIST_TRADES && win_rate(trades) < BLACKLIST_WINRATE {
            blacklist.add(symbol.clone());
            record_blacklist.push(symbol.clone());
        }
    }

    let loss_rules = build_loss_rules(&pairs, &by_hour, &by_symbol, &params);

    let record = LearnedParamsRecord {
        params: Some(params),
        confidence,
        blacklist: record_blacklist,
        preferred_hours,
        avoid_hours,
        symbol_scores,
        updated_ts: now_ms,
    };

    let _ = by_weekday; // reserved for a future day-of-week loss rule; bucketed now so the pass doesn't need another journal scan later

    LearningOutcome { record, loss_rules, blacklist }
}

fn hour_of(pair: &TradePair) -> u32 {
    chrono::DateTime::from_timestamp_millis(pair.sell_ts_ms).map(|dt| dt.hour()).unwrap_or(12)
}

fn weekday_of(pair: &TradePair) -> u32 {
    chrono::DateTime::from_timestamp_millis(pair.sell_ts_ms).map(|dt| dt.weekday().num_days_from_monday()).unwrap_or(0)
}

fn bucket_by_hour(pairs: &[TradePair]) -> HashMap<u32, Vec<&TradePair>> {
    let mut out: HashMap<u32, Vec<&TradePair>> = HashMap::new();
    for p in pairs {
        out.entry(hour_of(p)).or_default().push(p);
    }
    out
}

fn bucket_by_weekday(pairs: &[TradePair]) -> HashMap<u32, Vec<&TradePair>> {
    let mut out: HashMap<u32, Vec<&TradePair>> = HashMap::new();
    for p in pairs {
        out.entry(weekday_of(p)).or_default().push(p);
    }
    out
}

fn bucket_by_symbol(pairs: &[TradePair]) -> HashMap<String, Vec<&TradePair>> {
    let mut out: HashMap<String, Vec<&TradePair>> = HashMap::new();
    for p in pairs {
        out.entry(p.symbol.clone()).or_default().push(p);
    }
    out
}

fn win_rate(trades: &[&TradePair]) -> f64 {
    if trades.is_empty() {
        return 0.5;
    }
    trades.iter().filter(|t| t.pnl_pct > 0.0).count() as f64 / trades.len() as f64
}

fn avg_pnl_pct(trades: &[&TradePair]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.pnl_pct).sum::<f64>() / trades.len() as f64
}

/// Buckets "agree with the overall trend" when their average P&L carries
/// the same sign as the book-wide average; the fraction that do is a
/// cheap, bounded [0, 1] stand-in for a proper variance-based confidence
/// term, and it only looks at buckets with enough trades to mean anything.
fn bucket_consistency(by_hour: &HashMap<u32, Vec<&TradePair>>, all_pairs: &[TradePair]) -> f64 {
    let overall_sign = avg_pnl_pct(&all_pairs.iter().collect::<Vec<_>>()).signum();
    let eligible: Vec<&Vec<&TradePair>> = by_hour.values().filter(|v| v.len() >= MIN_BUCKET_TRADES).collect();
    if eligible.is_empty() {
        return 0.5;
    }
    let agreeing = eligible.iter().filter(|v| avg_pnl_pct(v).signum() == overall_sign).count();
    agreeing as f64 / eligible.len() as f64
}

fn grid_around(default: f64, points: usize) -> Vec<f64> {
    let spread = default.abs() * 0.5;
    let lo = default - spread;
    let hi = default + spread;
    if points <= 1 {
        return vec![default];
    }
    (0..points).map(|i| lo + (hi - lo) * i as f64 / (points - 1) as f64).collect()
}

fn best_candidate(grid: &[f64], objective: impl Fn(f64) -> f64 + Sync, fallback: f64) -> f64 {
    grid.par_iter()
        .copied()
        .map(|c| (c, objective(c)))
        .filter(|(_, score)| score.is_finite())
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .map(|(c, _)| c)
        .unwrap_or(fallback)
}

/// Grid-searches the seven learnable keys independently (spec §4.8 step
/// 4). Each key's objective only uses data the journal or combo-tracker
/// actually carries — no per-trade RSI/BB reading survives into the
/// journal, so the RSI keys are tuned off the win rate of RSI-tagged
/// trades rather than a true RSI distribution.
fn grid_search(pairs: &[TradePair], combo_store: &ComboStore, defaults: &LearnedParamDefaults) -> LearnedParamDefaults {
    let take_profit_grid = grid_around(defaults.take_profit_pct, GRID_POINTS);
    let take_profit_pct = best_candidate(
        &take_profit_grid,
        |candidate| pairs.iter().map(|p| p.pnl_pct.min(candidate)).sum::<f64>() / pairs.len() as f64,
        defaults.take_profit_pct,
    );

    let stop_loss_grid = grid_around(defaults.stop_loss_pct, GRID_POINTS);
    let stop_loss_pct = best_candidate(
        &stop_loss_grid,
        |candidate| pairs.iter().map(|p| p.pnl_pct.max(candidate)).sum::<f64>() / pairs.len() as f64,
        defaults.stop_loss_pct,
    );

    let hold_grid = grid_around(defaults.max_hold_hours, GRID_POINTS);
    let max_hold_hours = best_candidate(
        &hold_grid,
        |candidate| {
            let within: Vec<&TradePair> = pairs.iter().filter(|p| p.hold_ms as f64 / 3_600_000.0 <= candidate).collect();
            if within.is_empty() {
                return f64::NEG_INFINITY;
            }
            let coverage = (within.len() as f64 / pairs.len() as f64).sqrt();
            avg_pnl_pct(&within) * coverage
        },
        defaults.max_hold_hours,
    );

    let rsi_tagged: Vec<&TradePair> = pairs.iter().filter(|p| p.buy_reason.contains("rsi")).collect();
    let rsi_win_rate = if rsi_tagged.is_empty() { 0.5 } else { win_rate(&rsi_tagged) };
    let rsi_oversold_target = (defaults.rsi_oversold + (rsi_win_rate - 0.5) * 20.0).clamp(defaults.rsi_oversold - defaults.rsi_oversold.abs() * 0.5, defaults.rsi_oversold + defaults.rsi_oversold.abs() * 0.5);
    let rsi_overbought_target = (defaults.rsi_overbought - (rsi_win_rate - 0.5) * 20.0).clamp(defaults.rsi_overbought - defaults.rsi_overbought.abs() * 0.5, defaults.rsi_overbought + defaults.rsi_overbought.abs() * 0.5);

    let rsi_oversold_grid = grid_around(defaults.rsi_oversold, GRID_POINTS);
    let rsi_oversold = best_candidate(&rsi_oversold_grid, |candidate| -(candidate - rsi_oversold_target).abs(), defaults.rsi_oversold);

    let rsi_overbought_grid = grid_around(defaults.rsi_overbought, GRID_POINTS);
    let rsi_overbought = best_candidate(&rsi_overbought_grid, |candidate| -(candidate - rsi_overbought_target).abs(), defaults.rsi_overbought);

    let overall_win_rate = win_rate(&pairs.iter().collect::<Vec<_>>());
    let avg_win = {
        let wins: Vec<f64> = pairs.iter().filter(|p| p.pnl_pct > 0.0).map(|p| p.pnl_pct).collect();
        if wins.is_empty() { 0.0 } else { wins.iter().sum::<f64>() / wins.len() as f64 }
    };
    let avg_loss_abs = {
        let losses: Vec<f64> = pairs.iter().filter(|p| p.pnl_pct <= 0.0).map(|p| p.pnl_pct.abs()).collect();
        if losses.is_empty() { 0.0 } else { losses.iter().sum::<f64>() / losses.len() as f64 }
    };
    let edge = overall_win_rate * avg_win - (1.0 - overall_win_rate) * avg_loss_abs;
    let position_target = defaults.base_position_pct * (1.0 + edge / 10.0).clamp(0.5, 1.5);
    let position_grid = grid_around(defaults.base_position_pct, GRID_POINTS);
    let base_position_pct = best_candidate(&position_grid, |candidate| -(candidate - position_target).abs(), defaults.base_position_pct);

    let combo_entries: Vec<(f64, f64, u32)> = combo_store
        .entries()
        .filter(|(_, stats)| stats.trades >= 3)
        .map(|(_, stats)| (stats.total_buy_score / stats.trades as f64, stats.win_rate(), stats.trades))
        .collect();
    let buy_threshold_grid = grid_around(defaults.buy_threshold, GRID_POINTS);
    let buy_threshold = best_candidate(
        &buy_threshold_grid,
        |candidate| {
            combo_entries
                .iter()
                .filter(|(avg_score, _, _)| *avg_score >= candidate)
                .map(|(_, win_rate, trades)| (win_rate - 0.5) * *trades as f64)
                .sum::<f64>()
        },
        defaults.buy_threshold,
    );

    LearnedParamDefaults {
        rsi_oversold,
        rsi_overbought,
        stop_loss_pct,
        take_profit_pct,
        max_hold_hours,
        base_position_pct,
        buy_threshold,
    }
}

/// Derives loss-pattern rules from whichever buckets the journal actually
/// supports (spec §4.8 step 7). Regime- and BB-position-keyed rules need
/// per-trade context the journal never recorded, so only hour, symbol and
/// an RSI-tagged global rule are emitted here.
fn build_loss_rules(pairs: &[TradePair], by_hour: &HashMap<u32, Vec<&TradePair>>, by_symbol: &HashMap<String, Vec<&TradePair>>, params: &LearnedParams) -> Vec<LossPatternRule> {
    let mut rules = Vec::new();

    for (hour, trades) in by_hour {
        if trades.len() < MIN_BUCKET_TRADES {
            continue;
        }
        let lossrate = 1.0 - win_rate(trades);
        if let Some(action) = classify_lossrate(lossrate) {
            rules.push(LossPatternRule {
                rsi_below: None,
                bb_position_above: None,
                hour: Some(*hour),
                regime: None,
                symbol: None,
                action,
                lossrate,
                trades: trades.len() as u32,
            });
        }
    }

    for (symbol, trades) in by_symbol {
        if trades.len() < MIN_BUCKET_TRADES {
            continue;
        }
        let lossrate = 1.0 - win_rate(trades);
        if let Some(action) = classify_lossrate(lossrate) {
            rules.push(LossPatternRule {
                rsi_below: None,
                bb_position_above: None,
                hour: None,
                regime: None,
                symbol: Some(symbol.clone()),
                action,
                lossrate,
                trades: trades.len() as u32,
            });
        }
    }

    let rsi_tagged: Vec<&TradePair> = pairs.iter().filter(|p| p.buy_reason.contains("rsi")).collect();
    if rsi_tagged.len() >= MIN_BUCKET_TRADES {
        let lossrate = 1.0 - win_rate(&rsi_tagged);
        if let Some(action) = classify_lossrate(lossrate) {
            rules.push(LossPatternRule {
                rsi_below: Some(params.rsi_oversold),
                bb_position_above: None,
                hour: None,
                regime: None,
                symbol: None,
                action,
                lossrate,
                trades: rsi_tagged.len() as u32,
            });
        }
    }

    rules
}

fn classify_lossrate(lossrate: f64) -> Option<LossPatternAction> {
    if lossrate >= BLOCK_LOSSRATE {
        Some(LossPatternAction::Block)
    } else if lossrate >= WARN_LOSSRATE {
        Some(LossPatternAction::Warn)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::{TradeSide, TradeJournalEntry};
    use rust_decimal_macros::dec;

    fn entry(ts_ms: i64, side: TradeSide, symbol: &str, price: rust_decimal::Decimal, qty: rust_decimal::Decimal, pnl_pct: Option<f64>, reason: &str, seq: u64) -> TradeJournalEntry {
        TradeJournalEntry {
            ts_ms,
            side,
            symbol: symbol.to_string(),
            price,
            quantity: qty,
            amount: price * qty,
            pnl_amount: None,
            pnl_pct,
            reason: reason.to_string(),
            order_seq: seq,
        }
    }

    fn synthetic_journal(n: usize, win_ratio: f64) -> Vec<TradeJournalEntry> {
        let mut out = Vec::new();
        for i in 0..n {
            let is_win = (i as f64) < (n as f64 * win_ratio);
            let sell_price = if is_win { dec!(105) } else { dec!(95) };
            out.push(entry(i as i64 * 2, TradeSide::Buy, "BTC/KRW", dec!(100), dec!(1), None, "rsi", i as u64 * 2));
            out.push(entry(i as i64 * 2 + 1, TradeSide::Sell, "BTC/KRW", sell_price, dec!(1), Some(if is_win { 5.0 } else { -5.0 }), "take_profit", i as u64 * 2 + 1));
        }
        out
    }

    #[test]
    fn below_minimum_pairs_yields_zero_confidence() {
        let journal = synthetic_journal(5, 0.8);
        let outcome = run_learning_pass(&journal, &ComboStore::default(), &LearnedParamDefaults::default(), 0);
        assert_eq!(outcome.record.confidence, 0.0);
        assert!(outcome.record.params.is_none());
    }

    #[test]
    fn enough_pairs_produces_nonzero_confidence_and_clamped_params() {
        let journal = synthetic_journal(60, 0.7);
        let defaults = LearnedParamDefaults::default();
        let outcome = run_learning_pass(&journal, &ComboStore::default(), &defaults, 0);
        assert!(outcome.record.confidence > 0.0);
        let params = outcome.record.params.expect("grid search should produce params above the pair threshold");
        assert!(params.take_profit_pct <= defaults.take_profit_pct * 1.5 + 1e-9);
        assert!(params.take_profit_pct >= defaults.take_profit_pct * 0.5 - 1e-9);
    }

    #[test]
    fn symbol_with_poor_winrate_is_blacklisted() {
        let journal = synthetic_journal(40, 0.1);
        let defaults = LearnedParamDefaults::default();
        let outcome = run_learning_pass(&journal, &ComboStore::default(), &defaults, 0);
        assert!(outcome.blacklist.contains("BTC/KRW"));
    }

    #[test]
    fn healthy_symbol_is_not_blacklisted() {
        let journal = synthetic_journal(40, 0.9);
        let defaults = LearnedParamDefaults::default();
        let outcome = run_learning_pass(&journal, &ComboStore::default(), &defaults, 0);
        assert!(!outcome.blacklist.contains("BTC/KRW"));
    }
}
