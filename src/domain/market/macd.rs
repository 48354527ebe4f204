use super::candle::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Divergence {
    None,
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
    pub bullish_cross: bool,
    pub bearish_cross: bool,
    pub trend: Trend,
    pub divergence: Divergence,
}

fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = values[0];
    out.push(prev);
    for v in &values[1..] {
        prev = alpha * v + (1.0 - alpha) * prev;
        out.push(prev);
    }
    out
}

/// Classic MACD(fast, slow, signal) with bullish/bearish swing divergence
/// over the most recent 20 closes. A swing low/high is a local extremum
/// confirmed by 2 bars on each side.
pub fn macd(candles: &[Candle], fast: usize, slow: usize, signal_period: usize) -> Option<Macd> {
    if candles.len() < slow + signal_period {
        return None;
    }
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let ema_fast = ema_series(&closes, fast);
    let ema_slow = ema_series(&closes, slow);
    let macd_line: Vec<f64> = ema_fast.iter().zip(ema_slow.iter()).map(|(f, s)| f - s).collect();
    let signal_line = ema_series(&macd_line, signal_period);

    let hist: Vec<f64> = macd_line.iter().zip(signal_line.iter()).map(|(m, s)| m - s).collect();

    let last = *hist.last()?;
    let prev = hist[hist.len() - 2];
    let bullish_cross = prev <= 0.0 && last > 0.0;
    let bearish_cross = prev >= 0.0 && last < 0.0;

    let trend = if *macd_line.last()? > *signal_line.last()? {
        Trend::Up
    } else {
        Trend::Down
    };

    let divergence = detect_divergence(&closes, &macd_line);

    Some(Macd {
        macd: *macd_line.last()?,
        signal: *signal_line.last()?,
        histogram: last,
        bullish_cross,
        bearish_cross,
        trend,
        divergence,
    })
}

struct Swing {
    index: usize,
    price: f64,
}

fn find_swing_lows(closes: &[f64], window: &std::ops::Range<usize>) -> Vec<Swing> {
    let mut out = Vec::new();
    for i in window.clone() {
        if i < 2 || i + 2 >= closes.len() {
            continue;
        }
        let is_low = closes[i] < closes[i - 1]
            && closes[i] < closes[i - 2]
            && closes[i] < closes[i + 1]
            && closes[i] < closes[i + 2];
        if is_low {
            out.push(Swing { index: i, price: closes[i] });
        }
    }
    out
}

fn find_swing_highs(closes: &[f64], window: &std::ops::Range<usize>) -> Vec<Swing> {
    let mut out = Vec::new();
    for i in window.clone() {
        if i < 2 || i + 2 >= closes.len() {
            continue;
        }
        let is_high = closes[i] > closes[i - 1]
            && closes[i] > closes[i - 2]
            && closes[i] > closes[i + 1]
            && closes[i] > closes[i + 2];
        if is_high {
            out.push(Swing { index: i, price: closes[i] });
        }
    }
    out
}

fn detect_divergence(closes: &[f64], macd_line: &[f64]) -> Divergence {
    let lookback = 20.min(closes.len());
    let start = closes.len() - lookback;
    let window = start..closes.len();

    let lows = find_swing_lows(closes, &window);
    if lows.len() >= 2 {
        let (a, b) = (&lows[lows.len() - 2], &lows[lows.len() - 1]);
        if b.price < a.price && macd_line[b.index] > macd_line[a.index] {
            return Divergence::Bullish;
        }
    }

    let highs = find_swing_highs(closes, &window);
    if highs.len() >= 2 {
        let (a, b) = (&highs[highs.len() - 2], &highs[highs.len() - 1]);
        if b.price > a.price && macd_line[b.index] < macd_line[a.index] {
            return Divergence::Bearish;
        }
    }

    Divergence::None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(prices: &[f64]) -> Vec<Candle> {
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| Candle::new(i as i64, *p, *p, *p, *p, 1.0))
            .collect()
    }

    #[test]
    fn too_short_is_none() {
        let c = series(&[100.0; 10]);
        assert_eq!(macd(&c, 12, 26, 9), None);
    }

    #[test]
    fn uptrend_reports_up() {
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 0.5).collect();
        let c = series(&prices);
        let m = macd(&c, 12, 26, 9).unwrap();
        assert_eq!(m.trend, Trend::Up);
    }
}
