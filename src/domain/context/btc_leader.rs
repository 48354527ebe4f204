use std::collections::VecDeque;

use super::ContextFragment;

const MIN_SAMPLE_SPACING_MS: i64 = 5_000;
const RING_WINDOW_MS: i64 = 16 * 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BtcLeaderClassification {
    StrongBuy,
    Buy,
    WeakBuy,
    Neutral,
    WeakSell,
    Sell,
    StrongSell,
}

impl BtcLeaderClassification {
    fn from_pct(pct: f64) -> Self {
        if pct >= 1.5 {
            Self::StrongBuy
        } else if pct >= 0.8 {
            Self::Buy
        } else if pct >= 0.3 {
            Self::WeakBuy
        } else if pct <= -1.5 {
            Self::StrongSell
        } else if pct <= -0.8 {
            Self::Sell
        } else if pct <= -0.3 {
            Self::WeakSell
        } else {
            Self::Neutral
        }
    }

    fn base_magnitude(self) -> f64 {
        match self {
            Self::StrongBuy | Self::StrongSell => 1.5,
            Self::Buy | Self::Sell => 1.0,
            Self::WeakBuy | Self::WeakSell => 0.5,
            Self::Neutral => 0.0,
        }
    }

    fn is_bullish(self) -> bool {
        matches!(self, Self::StrongBuy | Self::Buy | Self::WeakBuy)
    }
}

/// In-memory ring of recent BTC prices driving the "BTC leader" momentum
/// fragment. Samples spaced under 5s are dropped to keep the ring cheap and
/// the percent-change math meaningful.
#[derive(Debug, Clone, Default)]
pub struct BtcLeaderTracker {
    samples: VecDeque<(i64, f64)>,
}

impl BtcLeaderTracker {
    pub fn new() -> Self {
        Self { samples: VecDeque::new() }
    }

    /// Records a new BTC price sample. Returns `false` (no-op) when the
    /// spacing requirement isn't met.
    pub fn record(&mut self, ts_ms: i64, price: f64) -> bool {
        if let Some((last_ts, _)) = self.samples.back() {
            if ts_ms - last_ts < MIN_SAMPLE_SPACING_MS {
                return false;
            }
        }
        self.samples.push_back((ts_ms, price));
        while let Some((ts, _)) = self.samples.front() {
            if ts_ms - ts > RING_WINDOW_MS {
                self.samples.pop_front();
            } else {
                break;
            }
        }
        true
    }

    fn price_at_or_before(&self, ts_ms: i64) -> Option<f64> {
        self.samples.iter().rev().find(|(ts, _)| *ts <= ts_ms).map(|(_, p)| *p)
    }

    fn pct_change(&self, now_ms: i64, minutes_back: i64) -> Option<f64> {
        let (_, latest) = *self.samples.back()?;
        let past = self.price_at_or_before(now_ms - minutes_back * 60_000)?;
        if past == 0.0 {
            return None;
        }
        Some((latest - past) / past * 100.0)
    }

    /// Classifies current BTC momentum and produces the bounded `[-1.5,
    /// 1.5]` fragment C3 folds into `buy_score`/`sell_score`.
    pub fn classify(&self, now_ms: i64) -> (BtcLeaderClassification, ContextFragment) {
        let Some(c5) = self.pct_change(now_ms, 5) else {
            return (BtcLeaderClassification::Neutral, ContextFragment::neutral());
        };
        let classification = BtcLeaderClassification::from_pct(c5);
        let mut magnitude = classification.base_magnitude();

        if let Some(c1) = self.pct_change(now_ms, 1) {
            let accelerating = c1.signum() == c5.signum() && c1.abs() > (c5 / 5.0).abs();
            if accelerating && magnitude > 0.0 {
                magnitude += 0.3;
            }
        }

        let longer: Vec<f64> = [10, 15]
            .iter()
            .filter_map(|m| self.pct_change(now_ms, *m))
            .collect();
        if !longer.is_empty() && longer.iter().all(|c| c.signum() == c5.signum()) && c5 != 0.0 {
            magnitude += 0.2;
        }
        magnitude = magnitude.min(1.5);

        let fragment = if magnitude == 0.0 {
            ContextFragment::neutral()
        } else if classification.is_bullish() {
            ContextFragment { buy_boost: magnitude, sell_boost: 0.0, reason: "btc_leader_bullish" }
        } else {
            ContextFragment { buy_boost: 0.0, sell_boost: magnitude, reason: "btc_leader_bearish" }
        };
        (classification, fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_5s_samples_are_dropped() {
        let mut t = BtcLeaderTracker::new();
        assert!(t.record(0, 100.0));
        assert!(!t.record(1_000, 100.5));
        assert_eq!(t.samples.len(), 1);
    }

    #[test]
    fn strong_rally_classifies_strong_buy() {
        let mut t = BtcLeaderTracker::new();
        t.record(0, 100_000_000.0);
        t.record(5 * 60_000, 102_000_000.0);
        let (class, fragment) = t.classify(5 * 60_000);
        assert_eq!(class, BtcLeaderClassification::StrongBuy);
        assert!(fragment.buy_boost > 0.0);
        assert_eq!(fragment.sell_boost, 0.0);
    }

    #[test]
    fn flat_price_is_neutral() {
        let mut t = BtcLeaderTracker::new();
        t.record(0, 100_000_000.0);
        t.record(5 * 60_000, 100_050_000.0);
        let (class, fragment) = t.classify(5 * 60_000);
        assert_eq!(class, BtcLeaderClassification::Neutral);
        assert_eq!(fragment, ContextFragment::neutral());
    }
}
