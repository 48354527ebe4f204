use super::candle::Candle;

#[derive(Debug, Clone, PartialEq)]
pub struct PatternHit {
    pub name: &'static str,
    /// 0.0-1.0 strength; the compositor applies `strength * 0.5` per
    /// candlestick pattern and `strength * 0.7` per chart pattern.
    pub strength: f64,
    pub bullish: bool,
}

/// Scans the last few candles for a handful of classic candlestick
/// patterns. Returns every match (a candle can be both e.g. a hammer and
/// part of a larger engulfing move).
pub fn candlestick_patterns(candles: &[Candle]) -> Vec<PatternHit> {
    let mut hits = Vec::new();
    if candles.len() < 2 {
        return hits;
    }
    let last = candles[candles.len() - 1];
    let prev = candles[candles.len() - 2];

    if let Some(hit) = hammer(&last) {
        hits.push(hit);
    }
    if let Some(hit) = engulfing(&prev, &last) {
        hits.push(hit);
    }
    if let Some(hit) = doji(&last) {
        hits.push(hit);
    }
    hits
}

fn body(c: &Candle) -> f64 {
    (c.close - c.open).abs()
}

fn range(c: &Candle) -> f64 {
    (c.high - c.low).max(f64::EPSILON)
}

fn hammer(c: &Candle) -> Option<PatternHit> {
    let lower_wick = c.open.min(c.close) - c.low;
    let upper_wick = c.high - c.open.max(c.close);
    let b = body(c);
    if lower_wick >= b * 2.0 && upper_wick <= b * 0.5 && b / range(c) < 0.4 {
        let strength = (lower_wick / range(c)).min(1.0);
        Some(PatternHit { name: "hammer", strength, bullish: c.close >= c.open })
    } else {
        None
    }
}

fn engulfing(prev: &Candle, last: &Candle) -> Option<PatternHit> {
    let prev_bull = prev.close >= prev.open;
    let last_bull = last.close >= last.open;
    if prev_bull == last_bull {
        return None;
    }
    let engulfs = last.open.min(last.close) <= prev.open.min(prev.close)
        && last.open.max(last.close) >= prev.open.max(prev.close);
    if !engulfs {
        return None;
    }
    let strength = (body(last) / (body(prev) + f64::EPSILON)).min(2.0) / 2.0;
    Some(PatternHit { name: "engulfing", strength, bullish: last_bull })
}

fn doji(c: &Candle) -> Option<PatternHit> {
    if body(c) / range(c) < 0.1 {
        Some(PatternHit { name: "doji", strength: 0.3, bullish: c.close >= c.open })
    } else {
        None
    }
}

/// Coarse chart-level patterns over a longer lookback: double top/bottom
/// detected via two comparable local extrema straddling a retracement.
pub fn chart_patterns(candles: &[Candle], lookback: usize) -> Vec<PatternHit> {
    let mut hits = Vec::new();
    if candles.len() < lookback || lookback < 10 {
        return hits;
    }
    let window = &candles[candles.len() - lookback..];
    let mut lows: Vec<(usize, f64)> = Vec::new();
    let mut highs: Vec<(usize, f64)> = Vec::new();
    for i in 2..window.len() - 2 {
        let c = window[i].low;
        if c < window[i - 1].low && c < window[i - 2].low && c < window[i + 1].low && c < window[i + 2].low {
            lows.push((i, c));
        }
        let h = window[i].high;
        if h > window[i - 1].high && h > window[i - 2].high && h > window[i + 1].high && h > window[i + 2].high {
            highs.push((i, h));
        }
    }

    if lows.len() >= 2 {
        let (a, b) = (lows[lows.len() - 2], lows[lows.len() - 1]);
        let spread = (a.1 - b.1).abs() / a.1.max(f64::EPSILON);
        if spread < 0.02 {
            hits.push(PatternHit { name: "double_bottom", strength: (1.0 - spread * 25.0).clamp(0.2, 1.0), bullish: true });
        }
    }
    if highs.len() >= 2 {
        let (a, b) = (highs[highs.len() - 2], highs[highs.len() - 1]);
        let spread = (a.1 - b.1).abs() / a.1.max(f64::EPSILON);
        if spread < 0.02 {
            hits.push(PatternHit { name: "double_top", strength: (1.0 - spread * 25.0).clamp(0.2, 1.0), bullish: false });
        }
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_series_has_no_patterns() {
        assert!(candlestick_patterns(&[]).is_empty());
    }

    #[test]
    fn bullish_hammer_detected() {
        // long lower wick, small body near the top of range, closes up.
        let candles = vec![
            Candle::new(0, 100.0, 101.0, 99.0, 100.0, 1.0),
            Candle::new(1, 100.0, 100.5, 90.0, 100.3, 1.0),
        ];
        let hits = candlestick_patterns(&candles);
        assert!(hits.iter().any(|h| h.name == "hammer" && h.bullish));
    }
}
