use super::atr::atr;
use super::candle::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakoutSignal {
    pub breakout_up: bool,
    pub breakout_down: bool,
    pub range_high: f64,
    pub range_low: f64,
    /// How far beyond the prior range the close travelled, in ATRs.
    pub magnitude_atr: f64,
}

/// Detects a close breaking out of the prior `lookback`-candle high/low
/// range by more than `atr_mult` ATRs, the Donchian-channel idiom the
/// regime/momentum modules share.
pub fn breakout(candles: &[Candle], lookback: usize, atr_mult: f64) -> Option<BreakoutSignal> {
    if candles.len() < lookback + 15 {
        return None;
    }
    let prior = &candles[candles.len() - lookback - 1..candles.len() - 1];
    let range_high = prior.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let range_low = prior.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);

    let last = candles.last()?;
    let a = atr(candles, 14)?;
    if a.value <= 0.0 {
        return None;
    }

    let above = (last.close - range_high) / a.value;
    let below = (range_low - last.close) / a.value;

    let breakout_up = above > atr_mult;
    let breakout_down = below > atr_mult;
    let magnitude_atr = if breakout_up {
        above
    } else if breakout_down {
        below
    } else {
        0.0
    };

    Some(BreakoutSignal { breakout_up, breakout_down, range_high, range_low, magnitude_atr })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_short_is_none() {
        let candles: Vec<Candle> = (0..10).map(|i| Candle::new(i, 100.0, 101.0, 99.0, 100.0, 1.0)).collect();
        assert_eq!(breakout(&candles, 20, 1.0), None);
    }

    #[test]
    fn sharp_rally_triggers_breakout_up() {
        let mut candles: Vec<Candle> = (0..40).map(|i| Candle::new(i, 100.0, 101.0, 99.0, 100.0, 1.0)).collect();
        candles.push(Candle::new(40, 100.0, 115.0, 100.0, 114.0, 1.0));
        let sig = breakout(&candles, 20, 1.0).unwrap();
        assert!(sig.breakout_up);
        assert!(!sig.breakout_down);
    }

    #[test]
    fn quiet_range_has_no_breakout() {
        let candles: Vec<Candle> = (0..40).map(|i| Candle::new(i, 100.0, 100.3, 99.7, 100.0, 1.0)).collect();
        let sig = breakout(&candles, 20, 1.0).unwrap();
        assert!(!sig.breakout_up && !sig.breakout_down);
    }
}
