use super::candle::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Atr {
    pub value: f64,
    pub pct_of_close: f64,
}

/// Wilder EMA of true range. Also used by the position state machine to
/// derive dynamic SL/TP multipliers, clamped by the caller to configured
/// bounds.
pub fn atr(candles: &[Candle], period: usize) -> Option<Atr> {
    if candles.len() < period + 1 {
        return None;
    }
    let trs: Vec<f64> = candles
        .windows(2)
        .map(|w| w[1].true_range(w[0].close))
        .collect();

    let mut value = trs[..period].iter().sum::<f64>() / period as f64;
    for tr in &trs[period..] {
        value = (value * (period as f64 - 1.0) + tr) / period as f64;
    }

    let last_close = candles.last()?.close;
    let pct_of_close = if last_close != 0.0 { value / last_close * 100.0 } else { 0.0 };

    Some(Atr { value, pct_of_close })
}

/// Percent change of ATR between the last value and the value `bars` ago.
/// Used by the regime classifier's `atr_change>50%` volatile-regime rule.
pub fn atr_change_pct(candles: &[Candle], period: usize, bars_ago: usize) -> Option<f64> {
    if candles.len() < period + 1 + bars_ago {
        return None;
    }
    let current = atr(candles, period)?.value;
    let past = atr(&candles[..candles.len() - bars_ago], period)?.value;
    if past == 0.0 {
        return None;
    }
    Some((current - past) / past * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_short_is_none() {
        let candles: Vec<Candle> = (0..5)
            .map(|i| Candle::new(i, 100.0, 101.0, 99.0, 100.0, 1.0))
            .collect();
        assert_eq!(atr(&candles, 14), None);
    }

    #[test]
    fn constant_range_gives_stable_atr() {
        let candles: Vec<Candle> = (0..30)
            .map(|i| Candle::new(i, 100.0, 102.0, 98.0, 100.0, 1.0))
            .collect();
        let a = atr(&candles, 14).unwrap();
        assert!((a.value - 4.0).abs() < 0.5);
    }
}
