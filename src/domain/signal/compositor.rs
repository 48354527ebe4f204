use crate::domain::context::ContextFragment;
use crate::domain::market::orderbook::OrderbookSignal;
use crate::domain::market::regime::Regime;
use crate::domain::market::{
    macd::{Divergence, Trend},
    patterns::PatternHit,
    IndicatorBundle,
};

use super::combo::ComboStore;
use super::loss_pattern::{self, LossPatternContext, LossPatternRule};
use super::reason::ReasonSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

/// The compositor's sole output (spec §4.3). Pure data — the compositor
/// never places an order or mutates a store, it only reads them.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub action: SignalAction,
    pub buy_score: f64,
    pub sell_score: f64,
    pub reasons: ReasonSet,
    pub regime: Option<Regime>,
    pub effective_buy_threshold: f64,
    pub effective_sell_threshold: f64,
    pub combo_adjustment: f64,
    pub loss_pattern_warning: bool,
    pub hold_reason: Option<&'static str>,
}

/// Tunable thresholds and per-source scoring knobs. Defaults match the
/// values named in spec §4.3/§4.8; a tenant's learned params override
/// `rsi_oversold`/`rsi_overbought`/`buy_threshold` at the call site.
#[derive(Debug, Clone, Copy)]
pub struct CompositorParams {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub volume_threshold: f64,
    pub base_buy_threshold: f64,
    pub base_sell_threshold: f64,
}

impl Default for CompositorParams {
    fn default() -> Self {
        CompositorParams {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            volume_threshold: 1.5,
            base_buy_threshold: 2.0,
            base_sell_threshold: 3.0,
        }
    }
}

/// Everything the compositor needs beyond the C1 indicator bundle: C2
/// context fragments, order-book read, regime/mode multipliers, and the
/// adaptive-filter's min-score bump for this scan.
pub struct CompositorInput<'a> {
    pub bundle: &'a IndicatorBundle,
    pub last_candle_bullish: Option<bool>,
    pub orderbook: Option<OrderbookSignal>,
    pub sentiment: ContextFragment,
    pub btc_leader: ContextFragment,
    pub funding_rate: ContextFragment,
    pub whale_flow: ContextFragment,
    pub kimchi_premium: ContextFragment,
    pub mode_buy_threshold_mult: f64,
    pub adaptive_min_score_bump: f64,
    pub hour: u32,
    pub symbol: &'a str,
    pub params: CompositorParams,
}

fn score_patterns(hits: &[PatternHit], per_hit_weight: f64, reason_bit: ReasonSet, buy_score: &mut f64, sell_score: &mut f64, reasons: &mut ReasonSet) {
    let mut buy_total = 0.0;
    let mut sell_total = 0.0;
    for hit in hits {
        let contribution = hit.strength * per_hit_weight;
        if hit.bullish {
            buy_total += contribution;
        } else {
            sell_total += contribution;
        }
    }
    if buy_total > 0.0 {
        *buy_score += buy_total.min(3.0);
        reasons.insert(reason_bit);
    }
    if sell_total > 0.0 {
        *sell_score += sell_total.min(3.0);
        reasons.insert(reason_bit);
    }
}

/// Scores a candidate signal, applies the combo-tracker and loss-pattern
/// gates, and emits BUY/SELL/HOLD. Pure: `combo_store`/`loss_rules` are
/// read-only here, never mutated.
pub fn compose(input: &CompositorInput<'_>, combo_store: &ComboStore, loss_rules: &[LossPatternRule]) -> Signal {
    let mut buy_score = 0.0_f64;
    let mut sell_score = 0.0_f64;
    let mut reasons = ReasonSet::empty();
    let bundle = input.bundle;

    if let Some(rsi) = bundle.rsi {
        if rsi <= input.params.rsi_oversold {
            buy_score += 2.0;
            reasons.insert(ReasonSet::RSI);
        } else if rsi >= input.params.rsi_overbought {
            sell_score += 2.0;
            reasons.insert(ReasonSet::RSI);
        }
    }

    if let Some(bb) = bundle.bollinger {
        if bb.position <= 0.3 {
            buy_score += 1.0;
            reasons.insert(ReasonSet::BB);
            if bb.position <= 0.05 {
                buy_score += 1.0;
            }
        } else if bb.position >= 0.7 {
            sell_score += 1.0;
            reasons.insert(ReasonSet::BB);
            if bb.position >= 0.95 {
                sell_score += 1.0;
            }
        }
    }

    if let (Some(ratio), Some(bullish)) = (bundle.volume_ratio, input.last_candle_bullish) {
        if ratio >= input.params.volume_threshold {
            if bullish {
                buy_score += 1.0;
            } else {
                sell_score += 1.0;
            }
            reasons.insert(ReasonSet::VOL);
        }
    }

    if let Some(m) = &bundle.macd {
        let mut macd_buy = 0.0_f64;
        let mut macd_sell = 0.0_f64;
        if m.bullish_cross {
            macd_buy += 1.0;
        }
        if m.bearish_cross {
            macd_sell += 1.0;
        }
        match m.trend {
            Trend::Up => macd_buy += 0.3,
            Trend::Down => macd_sell += 0.3,
        }
        match m.divergence {
            Divergence::Bullish => macd_buy += 1.5,
            Divergence::Bearish => macd_sell += 1.5,
            Divergence::None => {}
        }
        macd_buy = macd_buy.min(1.5);
        macd_sell = macd_sell.min(1.5);
        if macd_buy > 0.0 {
            buy_score += macd_buy;
            reasons.insert(ReasonSet::MACD);
        }
        if macd_sell > 0.0 {
            sell_score += macd_sell;
            reasons.insert(ReasonSet::MACD);
        }
    }

    score_patterns(&bundle.candlestick_patterns, 0.5, ReasonSet::PAT, &mut buy_score, &mut sell_score, &mut reasons);
    score_patterns(&bundle.chart_patterns, 0.7, ReasonSet::CHART, &mut buy_score, &mut sell_score, &mut reasons);

    if bundle.mtf_boost > 0.0 {
        buy_score += bundle.mtf_boost;
        reasons.insert(ReasonSet::MTF);
    } else if bundle.mtf_boost < 0.0 {
        sell_score += bundle.mtf_boost.abs();
        reasons.insert(ReasonSet::MTF);
    }

    if let Some(ob) = &input.orderbook {
        buy_score += ob.fragment.buy_boost;
        sell_score += ob.fragment.sell_boost;
    }

    buy_score += input.sentiment.buy_boost;
    sell_score += input.sentiment.sell_boost;
    if input.sentiment.buy_boost > 0.0 || input.sentiment.sell_boost > 0.0 {
        reasons.insert(ReasonSet::SENT);
    }

    for fragment in [&input.btc_leader, &input.funding_rate, &input.whale_flow, &input.kimchi_premium] {
        buy_score += fragment.buy_boost;
        sell_score += fragment.sell_boost;
    }

    let regime = bundle.regime.map(|r| r.regime);
    let regime_mult = regime.map(|r| r.multipliers().buy_threshold_mult).unwrap_or(1.0);
    let effective_buy_threshold = (input.params.base_buy_threshold * regime_mult * input.mode_buy_threshold_mult + input.adaptive_min_score_bump).max(0.0);
    let effective_sell_threshold = input.params.base_sell_threshold;

    let combo_result = combo_store.query(reasons);
    buy_score += combo_result.adjustment;
    if combo_result.block {
        return Signal {
            action: SignalAction::Hold,
            buy_score,
            sell_score,
            reasons,
            regime,
            effective_buy_threshold,
            effective_sell_threshold,
            combo_adjustment: combo_result.adjustment,
            loss_pattern_warning: false,
            hold_reason: Some("combo_blocked"),
        };
    }

    let loss_ctx = LossPatternContext {
        rsi: bundle.rsi,
        bb_position: bundle.bollinger.map(|b| b.position),
        hour: input.hour,
        regime,
        symbol: input.symbol,
    };
    let loss_verdict = loss_pattern::check(loss_rules, &loss_ctx);
    if matches!(loss_verdict, Some(loss_pattern::LossPatternAction::Block)) {
        return Signal {
            action: SignalAction::Hold,
            buy_score,
            sell_score,
            reasons,
            regime,
            effective_buy_threshold,
            effective_sell_threshold,
            combo_adjustment: combo_result.adjustment,
            loss_pattern_warning: false,
            hold_reason: Some("loss_pattern_blocked"),
        };
    }
    let loss_pattern_warning = matches!(loss_verdict, Some(loss_pattern::LossPatternAction::Warn));

    let action = if buy_score >= effective_buy_threshold {
        SignalAction::Buy
    } else if sell_score >= effective_sell_threshold {
        SignalAction::Sell
    } else {
        SignalAction::Hold
    };

    Signal {
        action,
        buy_score,
        sell_score,
        reasons,
        regime,
        effective_buy_threshold,
        effective_sell_threshold,
        combo_adjustment: combo_result.adjustment,
        loss_pattern_warning,
        hold_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::bollinger::Bollinger;

    fn empty_bundle() -> IndicatorBundle {
        IndicatorBundle {
            rsi: None,
            macd: None,
            bollinger: None,
            squeeze: None,
            atr: None,
            stoch_rsi: None,
            ichimoku: None,
            vwap: None,
            volume_ratio: None,
            regime: None,
            candlestick_patterns: vec![],
            chart_patterns: vec![],
            breakout: None,
            mtf_boost: 0.0,
        }
    }

    fn base_input(bundle: &IndicatorBundle) -> CompositorInput<'_> {
        CompositorInput {
            bundle,
            last_candle_bullish: None,
            orderbook: None,
            sentiment: ContextFragment::neutral(),
            btc_leader: ContextFragment::neutral(),
            funding_rate: ContextFragment::neutral(),
            whale_flow: ContextFragment::neutral(),
            kimchi_premium: ContextFragment::neutral(),
            mode_buy_threshold_mult: 1.0,
            adaptive_min_score_bump: 0.0,
            hour: 12,
            symbol: "BTC/KRW",
            params: CompositorParams::default(),
        }
    }

    #[test]
    fn no_signal_is_hold() {
        let bundle = empty_bundle();
        let input = base_input(&bundle);
        let signal = compose(&input, &ComboStore::default(), &[]);
        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(signal.hold_reason, None);
    }

    #[test]
    fn oversold_rsi_alone_triggers_buy_at_default_threshold() {
        let mut bundle = empty_bundle();
        bundle.rsi = Some(20.0);
        let input = base_input(&bundle);
        let signal = compose(&input, &ComboStore::default(), &[]);
        assert_eq!(signal.action, SignalAction::Buy);
        assert!(signal.reasons.contains(ReasonSet::RSI));
    }

    #[test]
    fn overbought_rsi_alone_triggers_sell_when_below_default_sell_threshold_is_not_met() {
        let mut bundle = empty_bundle();
        bundle.rsi = Some(80.0);
        let input = base_input(&bundle);
        let signal = compose(&input, &ComboStore::default(), &[]);
        // RSI alone contributes 2.0, under the 3.0 sell threshold.
        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(signal.sell_score, 2.0);
    }

    #[test]
    fn combo_block_short_circuits_to_hold() {
        let mut bundle = empty_bundle();
        bundle.rsi = Some(20.0);
        let input = base_input(&bundle);
        let mut store = ComboStore::default();
        for _ in 0..6 {
            store.record_combo_result(ReasonSet::RSI, -2.0, 2.0);
        }
        let signal = compose(&input, &store, &[]);
        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(signal.hold_reason, Some("combo_blocked"));
    }

    #[test]
    fn bb_lower_touch_below_five_pct_adds_full_two_points() {
        let mut bundle = empty_bundle();
        bundle.bollinger = Some(Bollinger { upper: 110.0, middle: 100.0, lower: 90.0, bandwidth_pct: 20.0, position: 0.02 });
        let input = base_input(&bundle);
        let signal = compose(&input, &ComboStore::default(), &[]);
        assert_eq!(signal.buy_score, 2.0);
    }

    #[test]
    fn loss_pattern_block_short_circuits() {
        use super::super::loss_pattern::{LossPatternAction, LossPatternRule};
        let mut bundle = empty_bundle();
        bundle.rsi = Some(20.0);
        let input = base_input(&bundle);
        let rules = vec![LossPatternRule {
            rsi_below: Some(25.0),
            bb_position_above: None,
            hour: None,
            regime: None,
            symbol: None,
            action: LossPatternAction::Block,
            lossrate: 0.65,
            trades: 8,
        }];
        let signal = compose(&input, &ComboStore::default(), &rules);
        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(signal.hold_reason, Some("loss_pattern_blocked"));
    }
}
