use super::candle::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bollinger {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub bandwidth_pct: f64,
    /// 0.0 = at the lower band, 1.0 = at the upper band.
    pub position: f64,
}

pub fn bollinger(candles: &[Candle], period: usize, k: f64) -> Option<Bollinger> {
    if candles.len() < period {
        return None;
    }
    let window = &candles[candles.len() - period..];
    let mean = window.iter().map(|c| c.close).sum::<f64>() / period as f64;
    let variance = window.iter().map(|c| (c.close - mean).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    let upper = mean + k * std_dev;
    let lower = mean - k * std_dev;
    let bandwidth_pct = if mean != 0.0 { (upper - lower) / mean * 100.0 } else { 0.0 };

    let last_close = candles.last()?.close;
    let span = upper - lower;
    let position = if span > 0.0 {
        ((last_close - lower) / span).clamp(0.0, 1.0)
    } else {
        0.5
    };

    Some(Bollinger {
        upper,
        middle: mean,
        lower,
        bandwidth_pct,
        position,
    })
}

/// BB squeeze: bandwidth compressed relative to its own recent history,
/// signalling an imminent volatility expansion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SqueezeSignal {
    pub squeezing: bool,
    pub bandwidth_pct: f64,
    pub bandwidth_percentile: f64,
}

pub fn bb_squeeze(candles: &[Candle], period: usize, k: f64, lookback: usize) -> Option<SqueezeSignal> {
    if candles.len() < period + lookback {
        return None;
    }
    let mut widths = Vec::with_capacity(lookback);
    for i in 0..lookback {
        let end = candles.len() - i;
        let window = &candles[end - period..end];
        let bb = bollinger(window, period, k)?;
        widths.push(bb.bandwidth_pct);
    }
    let current = widths[0];
    let below = widths.iter().filter(|w| **w >= current).count();
    let percentile = below as f64 / widths.len() as f64 * 100.0;
    Some(SqueezeSignal {
        squeezing: percentile <= 20.0,
        bandwidth_pct: current,
        bandwidth_percentile: percentile,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(n: usize, price: f64) -> Vec<Candle> {
        (0..n).map(|i| Candle::new(i as i64, price, price, price, price, 1.0)).collect()
    }

    #[test]
    fn too_short_is_none() {
        assert_eq!(bollinger(&flat(5, 100.0), 20, 2.0), None);
    }

    #[test]
    fn flat_series_has_zero_width() {
        let bb = bollinger(&flat(20, 100.0), 20, 2.0).unwrap();
        assert_eq!(bb.upper, bb.lower);
        assert_eq!(bb.bandwidth_pct, 0.0);
    }

    #[test]
    fn position_clamped_in_unit_range() {
        let mut candles = flat(19, 100.0);
        candles.push(Candle::new(19, 200.0, 200.0, 200.0, 200.0, 1.0));
        let bb = bollinger(&candles, 20, 2.0).unwrap();
        assert!(bb.position <= 1.0);
    }
}
