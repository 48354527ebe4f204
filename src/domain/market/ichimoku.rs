use super::candle::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ichimoku {
    pub tenkan_sen: f64,
    pub kijun_sen: f64,
    pub senkou_span_a: f64,
    pub senkou_span_b: f64,
    pub price_above_cloud: bool,
    pub price_below_cloud: bool,
    pub tenkan_above_kijun: bool,
}

fn midpoint(candles: &[Candle], period: usize) -> Option<f64> {
    if candles.len() < period {
        return None;
    }
    let window = &candles[candles.len() - period..];
    let hi = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let lo = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    Some((hi + lo) / 2.0)
}

pub fn ichimoku(candles: &[Candle]) -> Option<Ichimoku> {
    let tenkan_sen = midpoint(candles, 9)?;
    let kijun_sen = midpoint(candles, 26)?;
    let senkou_span_a = (tenkan_sen + kijun_sen) / 2.0;
    let senkou_span_b = midpoint(candles, 52)?;

    let price = candles.last()?.close;
    let cloud_top = senkou_span_a.max(senkou_span_b);
    let cloud_bottom = senkou_span_a.min(senkou_span_b);

    Some(Ichimoku {
        tenkan_sen,
        kijun_sen,
        senkou_span_a,
        senkou_span_b,
        price_above_cloud: price > cloud_top,
        price_below_cloud: price < cloud_bottom,
        tenkan_above_kijun: tenkan_sen > kijun_sen,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_short_is_none() {
        let candles: Vec<Candle> = (0..10)
            .map(|i| Candle::new(i, 100.0, 101.0, 99.0, 100.0, 1.0))
            .collect();
        assert_eq!(ichimoku(&candles), None);
    }

    #[test]
    fn uptrend_price_above_cloud() {
        let candles: Vec<Candle> = (0..60)
            .map(|i| {
                let p = 100.0 + i as f64;
                Candle::new(i, p, p + 1.0, p - 1.0, p, 1.0)
            })
            .collect();
        let ichi = ichimoku(&candles).unwrap();
        assert!(ichi.price_above_cloud);
    }
}
