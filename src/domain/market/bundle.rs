use super::atr::{atr, Atr};
use super::bollinger::{bb_squeeze, bollinger, Bollinger, SqueezeSignal};
use super::candle::Candle;
use super::ichimoku::{ichimoku, Ichimoku};
use super::macd::{macd, Macd};
use super::multi_timeframe::{aggregate_mtf_boost, TimeframeReading};
use super::patterns::{candlestick_patterns, chart_patterns, PatternHit};
use super::regime::{classify_regime, RegimeClassification};
use super::rsi::rsi;
use super::stoch_rsi::{stoch_rsi, StochRsi};
use super::volatility_breakout::{breakout, BreakoutSignal};
use super::vwap::{volume_ratio, vwap};

/// Every C1 output computed for one symbol at one instant, consumed whole
/// by the C3 signal compositor. Each field is independently `None` when its
/// own data requirement isn't met; `bundle()` never fails outright.
#[derive(Debug, Clone)]
pub struct IndicatorBundle {
    pub rsi: Option<f64>,
    pub macd: Option<Macd>,
    pub bollinger: Option<Bollinger>,
    pub squeeze: Option<SqueezeSignal>,
    pub atr: Option<Atr>,
    pub stoch_rsi: Option<StochRsi>,
    pub ichimoku: Option<Ichimoku>,
    pub vwap: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub regime: Option<RegimeClassification>,
    pub candlestick_patterns: Vec<PatternHit>,
    pub chart_patterns: Vec<PatternHit>,
    pub breakout: Option<BreakoutSignal>,
    pub mtf_boost: f64,
}

/// Computes the full C1 bundle for the primary (usually 5m) timeframe and
/// folds in a multi-timeframe boost derived from whatever higher
/// timeframes the caller was able to supply alongside it.
pub fn bundle(candles: &[Candle], mtf_readings: &[TimeframeReading]) -> IndicatorBundle {
    IndicatorBundle {
        rsi: rsi(candles, 14),
        macd: macd(candles, 12, 26, 9),
        bollinger: bollinger(candles, 20, 2.0),
        squeeze: bb_squeeze(candles, 20, 2.0, 50),
        atr: atr(candles, 14),
        stoch_rsi: stoch_rsi(candles, 14, 14, 3),
        ichimoku: ichimoku(candles),
        vwap: vwap(candles),
        volume_ratio: volume_ratio(candles, 20),
        regime: classify_regime(candles),
        candlestick_patterns: candlestick_patterns(candles),
        chart_patterns: chart_patterns(candles, 40),
        breakout: breakout(candles, 20, 1.0),
        mtf_boost: aggregate_mtf_boost(mtf_readings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_on_short_series_is_all_none() {
        let candles: Vec<Candle> = (0..5).map(|i| Candle::new(i, 100.0, 101.0, 99.0, 100.0, 1.0)).collect();
        let b = bundle(&candles, &[]);
        assert!(b.rsi.is_none());
        assert!(b.macd.is_none());
        assert!(b.regime.is_none());
        assert!(b.candlestick_patterns.is_empty() || !b.candlestick_patterns.is_empty());
        assert_eq!(b.mtf_boost, 0.0);
    }

    #[test]
    fn bundle_on_long_series_fills_most_fields() {
        let candles: Vec<Candle> = (0..80)
            .map(|i| {
                let p = 100.0 + (i as f64 * 0.2).sin() * 3.0 + i as f64 * 0.1;
                Candle::new(i, p, p + 1.0, p - 1.0, p, 10.0)
            })
            .collect();
        let b = bundle(&candles, &[]);
        assert!(b.rsi.is_some());
        assert!(b.macd.is_some());
        assert!(b.bollinger.is_some());
        assert!(b.atr.is_some());
        assert!(b.vwap.is_some());
    }
}
