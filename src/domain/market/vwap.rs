use super::candle::Candle;

/// Session VWAP over the full supplied slice (callers pass the window they
/// consider "the session", e.g. the last 200 5m candles).
pub fn vwap(candles: &[Candle]) -> Option<f64> {
    if candles.is_empty() {
        return None;
    }
    let mut pv = 0.0;
    let mut vol = 0.0;
    for c in candles {
        let typical = (c.high + c.low + c.close) / 3.0;
        pv += typical * c.volume;
        vol += c.volume;
    }
    if vol == 0.0 {
        return None;
    }
    Some(pv / vol)
}

/// Ratio of the most recent candle's volume to the average of the
/// preceding `period` candles. `None` when there isn't a full prior window.
pub fn volume_ratio(candles: &[Candle], period: usize) -> Option<f64> {
    if candles.len() < period + 1 {
        return None;
    }
    let recent = candles.last()?.volume;
    let window = &candles[candles.len() - 1 - period..candles.len() - 1];
    let avg = window.iter().map(|c| c.volume).sum::<f64>() / period as f64;
    if avg == 0.0 {
        return None;
    }
    Some(recent / avg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_none() {
        assert_eq!(vwap(&[]), None);
    }

    #[test]
    fn constant_price_vwap_equals_price() {
        let candles: Vec<Candle> = (0..5).map(|i| Candle::new(i, 100.0, 100.0, 100.0, 100.0, 10.0)).collect();
        assert_eq!(vwap(&candles), Some(100.0));
    }

    #[test]
    fn volume_spike_ratio_above_one() {
        let mut candles: Vec<Candle> = (0..20).map(|i| Candle::new(i, 100.0, 101.0, 99.0, 100.0, 10.0)).collect();
        candles.push(Candle::new(20, 100.0, 101.0, 99.0, 100.0, 50.0));
        let r = volume_ratio(&candles, 20).unwrap();
        assert!(r > 4.0);
    }
}
