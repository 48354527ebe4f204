use super::candle::Candle;
use super::rsi::rsi;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StochRsi {
    pub k: f64,
    pub d: f64,
}

/// Stochastic oscillator applied to the RSI series itself rather than to
/// price, smoothed with a 3-period `%K`/`%D` moving average.
pub fn stoch_rsi(candles: &[Candle], rsi_period: usize, stoch_period: usize, smooth: usize) -> Option<StochRsi> {
    let needed = rsi_period + stoch_period + smooth;
    if candles.len() < needed {
        return None;
    }

    let mut rsi_series = Vec::with_capacity(candles.len());
    for end in rsi_period + 1..=candles.len() {
        rsi_series.push(rsi(&candles[..end], rsi_period)?);
    }
    if rsi_series.len() < stoch_period + smooth {
        return None;
    }

    let mut k_series = Vec::new();
    for i in stoch_period - 1..rsi_series.len() {
        let window = &rsi_series[i + 1 - stoch_period..=i];
        let lo = window.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let cur = rsi_series[i];
        let k = if hi > lo { (cur - lo) / (hi - lo) * 100.0 } else { 50.0 };
        k_series.push(k);
    }
    if k_series.len() < smooth {
        return None;
    }

    let k = k_series[k_series.len() - smooth..].iter().sum::<f64>() / smooth as f64;
    let d_window = &k_series[k_series.len().saturating_sub(smooth * 2).max(smooth)..];
    let d = d_window.iter().sum::<f64>() / d_window.len() as f64;

    Some(StochRsi { k, d })
}
