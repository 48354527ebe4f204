use super::candle::Candle;

/// Wilder-smoothed RSI. Returns `None` when `candles.len() < period + 1`
/// (need `period` closed deltas).
pub fn rsi(candles: &[Candle], period: usize) -> Option<f64> {
    if candles.len() < period + 1 {
        return None;
    }

    let deltas: Vec<f64> = candles
        .windows(2)
        .map(|w| w[1].close - w[0].close)
        .collect();

    let (mut avg_gain, mut avg_loss) = {
        let seed = &deltas[..period];
        let gain_sum: f64 = seed.iter().filter(|d| **d > 0.0).sum();
        let loss_sum: f64 = seed.iter().filter(|d| **d < 0.0).map(|d| -d).sum();
        (gain_sum / period as f64, loss_sum / period as f64)
    };

    for delta in &deltas[period..] {
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle_at(close: f64) -> Candle {
        Candle::new(0, close, close, close, close, 1.0)
    }

    #[test]
    fn too_short_returns_none() {
        let candles: Vec<Candle> = (0..5).map(|i| candle_at(100.0 + i as f64)).collect();
        assert_eq!(rsi(&candles, 14), None);
    }

    #[test]
    fn monotonic_rise_gives_high_rsi() {
        let candles: Vec<Candle> = (0..30).map(|i| candle_at(100.0 + i as f64)).collect();
        let r = rsi(&candles, 14).unwrap();
        assert!(r > 90.0, "expected overbought RSI, got {r}");
    }

    #[test]
    fn monotonic_fall_gives_low_rsi() {
        let candles: Vec<Candle> = (0..30).map(|i| candle_at(200.0 - i as f64)).collect();
        let r = rsi(&candles, 14).unwrap();
        assert!(r < 10.0, "expected oversold RSI, got {r}");
    }

    #[test]
    fn bounded_zero_to_hundred() {
        let candles: Vec<Candle> = (0..50)
            .map(|i| candle_at(100.0 + (i as f64 * 0.37).sin() * 10.0))
            .collect();
        let r = rsi(&candles, 14).unwrap();
        assert!((0.0..=100.0).contains(&r));
    }
}
