use serde::{Deserialize, Serialize};

use super::atr::atr_change_pct;
use super::bollinger::bollinger;
use super::candle::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Regime {
    Trending,
    Ranging,
    Volatile,
}

/// Multiplicative adjustments the rest of the system applies on top of its
/// own base parameters, keyed by regime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeMultipliers {
    pub buy_threshold_mult: f64,
    pub stop_loss_mult: f64,
    pub take_profit_mult: f64,
    pub position_size_mult: f64,
}

impl Regime {
    pub fn multipliers(&self) -> RegimeMultipliers {
        match self {
            Regime::Trending => RegimeMultipliers {
                buy_threshold_mult: 0.9,
                stop_loss_mult: 1.2,
                take_profit_mult: 1.4,
                position_size_mult: 1.1,
            },
            Regime::Ranging => RegimeMultipliers {
                buy_threshold_mult: 1.0,
                stop_loss_mult: 0.9,
                take_profit_mult: 0.9,
                position_size_mult: 1.0,
            },
            Regime::Volatile => RegimeMultipliers {
                buy_threshold_mult: 1.3,
                stop_loss_mult: 1.5,
                take_profit_mult: 1.2,
                position_size_mult: 0.6,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeClassification {
    pub regime: Regime,
    pub confidence: f64,
    pub adx: f64,
}

/// Wilder's ADX over `period` bars; plain float, never `None` once enough
/// bars exist, since it is a unitless oscillator rather than money.
fn adx(candles: &[Candle], period: usize) -> Option<f64> {
    if candles.len() < period * 2 {
        return None;
    }
    let mut plus_dm = Vec::new();
    let mut minus_dm = Vec::new();
    let mut tr = Vec::new();

    for w in candles.windows(2) {
        let up_move = w[1].high - w[0].high;
        let down_move = w[0].low - w[1].low;
        plus_dm.push(if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 });
        minus_dm.push(if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 });
        tr.push(w[1].true_range(w[0].close));
    }

    let smooth = |series: &[f64], period: usize| -> Vec<f64> {
        let mut out = Vec::new();
        let mut sum: f64 = series[..period].iter().sum();
        out.push(sum);
        for v in &series[period..] {
            sum = sum - (sum / period as f64) + v;
            out.push(sum);
        }
        out
    };

    let atr_s = smooth(&tr, period);
    let plus_s = smooth(&plus_dm, period);
    let minus_s = smooth(&minus_dm, period);

    let mut dx_series = Vec::new();
    for i in 0..atr_s.len() {
        if atr_s[i] == 0.0 {
            dx_series.push(0.0);
            continue;
        }
        let plus_di = plus_s[i] / atr_s[i] * 100.0;
        let minus_di = minus_s[i] / atr_s[i] * 100.0;
        let sum = plus_di + minus_di;
        let dx = if sum == 0.0 { 0.0 } else { (plus_di - minus_di).abs() / sum * 100.0 };
        dx_series.push(dx);
    }

    if dx_series.len() < period {
        return None;
    }
    Some(dx_series[dx_series.len() - period..].iter().sum::<f64>() / period as f64)
}

fn sma_slope_pct(candles: &[Candle], period: usize) -> Option<f64> {
    if candles.len() < period + 1 {
        return None;
    }
    let sma_now = candles[candles.len() - period..].iter().map(|c| c.close).sum::<f64>() / period as f64;
    let sma_prev = candles[candles.len() - period - 1..candles.len() - 1]
        .iter()
        .map(|c| c.close)
        .sum::<f64>()
        / period as f64;
    if sma_prev == 0.0 {
        return None;
    }
    Some((sma_now - sma_prev) / sma_prev * 100.0)
}

/// Classifies market regime over the last 30+ closes per spec §4.1:
/// `atr_change>50% OR atr_pct>3% -> volatile`; else `ADX>25 AND
/// |sma_slope|>0.3% -> trending`; else `ADX<20 AND bb_width<3% ->
/// ranging`; else whichever of trending/ranging is nearer by ADX.
pub fn classify_regime(candles: &[Candle]) -> Option<RegimeClassification> {
    if candles.len() < 30 {
        return None;
    }
    let adx_value = adx(candles, 14).unwrap_or(20.0);
    let atr_pct = super::atr::atr(candles, 14).map(|a| a.pct_of_close).unwrap_or(0.0);
    let atr_change = atr_change_pct(candles, 14, 5).unwrap_or(0.0);
    let slope = sma_slope_pct(candles, 20).unwrap_or(0.0);
    let bb_width = bollinger(candles, 20, 2.0).map(|b| b.bandwidth_pct).unwrap_or(5.0);

    if atr_change.abs() > 50.0 || atr_pct > 3.0 {
        return Some(RegimeClassification {
            regime: Regime::Volatile,
            confidence: (atr_pct / 3.0).min(1.0).max(0.5),
            adx: adx_value,
        });
    }

    if adx_value > 25.0 && slope.abs() > 0.3 {
        return Some(RegimeClassification {
            regime: Regime::Trending,
            confidence: ((adx_value - 25.0) / 25.0).min(1.0).max(0.5),
            adx: adx_value,
        });
    }

    if adx_value < 20.0 && bb_width < 3.0 {
        return Some(RegimeClassification {
            regime: Regime::Ranging,
            confidence: ((20.0 - adx_value) / 20.0).min(1.0).max(0.5),
            adx: adx_value,
        });
    }

    // Nearest by ADX: trending threshold is 25, ranging threshold is 20.
    let regime = if (adx_value - 25.0).abs() <= (adx_value - 20.0).abs() {
        Regime::Trending
    } else {
        Regime::Ranging
    };
    Some(RegimeClassification { regime, confidence: 0.4, adx: adx_value })
}
