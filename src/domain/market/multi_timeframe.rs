use super::candle::{Candle, Timeframe};
use super::macd::{macd, Trend};
use super::rsi::rsi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TfTrend {
    Up,
    Down,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeframeReading {
    pub timeframe: Timeframe,
    pub trend: TfTrend,
    pub strength: f64,
}

fn sma(candles: &[Candle], period: usize) -> Option<f64> {
    if candles.len() < period {
        return None;
    }
    Some(candles[candles.len() - period..].iter().map(|c| c.close).sum::<f64>() / period as f64)
}

/// Per-timeframe trend read from RSI + MACD + SMA slope + BB position,
/// each contributing up to 1/3 of `strength`.
pub fn read_timeframe(timeframe: Timeframe, candles: &[Candle]) -> Option<TimeframeReading> {
    if candles.len() < 30 {
        return None;
    }
    let mut bullish_votes = 0.0_f64;
    let mut total_votes = 0.0_f64;

    if let Some(r) = rsi(candles, 14) {
        total_votes += 1.0;
        if r > 55.0 {
            bullish_votes += 1.0;
        } else if r < 45.0 {
            bullish_votes -= 1.0;
        }
    }
    if let Some(m) = macd(candles, 12, 26, 9) {
        total_votes += 1.0;
        bullish_votes += if m.trend == Trend::Up { 1.0 } else { -1.0 };
    }
    if let (Some(fast), Some(slow)) = (sma(candles, 10), sma(candles, 30)) {
        total_votes += 1.0;
        bullish_votes += if fast > slow { 1.0 } else { -1.0 };
    }
    if let Some(bb) = super::bollinger::bollinger(candles, 20, 2.0) {
        total_votes += 1.0;
        if bb.position > 0.6 {
            bullish_votes += 1.0;
        } else if bb.position < 0.4 {
            bullish_votes -= 1.0;
        }
    }

    if total_votes == 0.0 {
        return None;
    }
    let score = bullish_votes / total_votes;
    let trend = if score > 0.25 {
        TfTrend::Up
    } else if score < -0.25 {
        TfTrend::Down
    } else {
        TfTrend::Neutral
    };

    Some(TimeframeReading { timeframe, trend, strength: score.abs() })
}

/// Aggregates {5m,1h,4h} readings into a single boost in [-1.5, 1.5].
/// All-aligned contributes 1.5, 2-of-3 contributes 0.8, a single timeframe
/// 0.3; if the 4h reading contradicts the 5m reading the whole boost is
/// multiplied by 0.3.
pub fn aggregate_mtf_boost(readings: &[TimeframeReading]) -> f64 {
    let up = readings.iter().filter(|r| r.trend == TfTrend::Up).count();
    let down = readings.iter().filter(|r| r.trend == TfTrend::Down).count();
    let total = readings.len();
    if total == 0 {
        return 0.0;
    }

    let (aligned, direction) = if up >= down { (up, TfTrend::Up) } else { (down, TfTrend::Down) };

    let mut boost = match aligned {
        n if n == total && total >= 2 => 1.5,
        n if n * 2 >= total && total >= 2 => 0.8,
        _ => 0.3,
    };
    if direction == TfTrend::Down {
        boost = -boost;
    }

    let five_m = readings.iter().find(|r| r.timeframe == Timeframe::M5);
    let four_h = readings.iter().find(|r| r.timeframe == Timeframe::H4);
    if let (Some(fm), Some(fh)) = (five_m, four_h) {
        let contradicts = matches!(
            (fm.trend, fh.trend),
            (TfTrend::Up, TfTrend::Down) | (TfTrend::Down, TfTrend::Up)
        );
        if contradicts {
            boost *= 0.3;
        }
    }

    boost.clamp(-1.5, 1.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_readings_zero_boost() {
        assert_eq!(aggregate_mtf_boost(&[]), 0.0);
    }

    #[test]
    fn all_aligned_up_gives_max_boost() {
        let readings = vec![
            TimeframeReading { timeframe: Timeframe::M5, trend: TfTrend::Up, strength: 0.8 },
            TimeframeReading { timeframe: Timeframe::H1, trend: TfTrend::Up, strength: 0.8 },
            TimeframeReading { timeframe: Timeframe::H4, trend: TfTrend::Up, strength: 0.8 },
        ];
        assert_eq!(aggregate_mtf_boost(&readings), 1.5);
    }

    #[test]
    fn contradicting_4h_dampens_boost() {
        let readings = vec![
            TimeframeReading { timeframe: Timeframe::M5, trend: TfTrend::Up, strength: 0.8 },
            TimeframeReading { timeframe: Timeframe::H1, trend: TfTrend::Up, strength: 0.8 },
            TimeframeReading { timeframe: Timeframe::H4, trend: TfTrend::Down, strength: 0.8 },
        ];
        let boost = aggregate_mtf_boost(&readings);
        assert!(boost.abs() < 0.8, "expected dampened boost, got {boost}");
    }
}
