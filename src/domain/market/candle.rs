use serde::{Deserialize, Serialize};
use std::fmt;

/// A single OHLCV candle. Sequences handed to the indicator library are
/// always ordered oldest -> newest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub ts_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(ts_ms: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            ts_ms,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Candle timeframe. The trading loop pulls 5m for every scan and 1h/4h on
/// demand for multi-timeframe alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M5,
    M15,
    H1,
    H4,
}

impl Timeframe {
    pub fn as_exchange_str(&self) -> &'static str {
        match self {
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_exchange_str())
    }
}

/// An opaque `BASE/QUOTE` trading pair. The quote side is always the single
/// configured fiat (KRW) for a given tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self(format!("{}/{}", base.into(), quote.into()))
    }

    pub fn parse(raw: &str) -> Option<Self> {
        if raw.split('/').count() == 2 && !raw.starts_with('/') && !raw.ends_with('/') {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    pub fn base(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    pub fn quote(&self) -> &str {
        self.0.split('/').nth(1).unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Symbol> for String {
    fn from(s: Symbol) -> Self {
        s.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_splits_base_quote() {
        let s = Symbol::new("BTC", "KRW");
        assert_eq!(s.base(), "BTC");
        assert_eq!(s.quote(), "KRW");
        assert_eq!(s.as_str(), "BTC/KRW");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(Symbol::parse("BTCKRW").is_none());
        assert!(Symbol::parse("BTC/KRW").is_some());
    }

    #[test]
    fn true_range_picks_widest_leg() {
        let c = Candle::new(0, 100.0, 105.0, 99.0, 102.0, 10.0);
        assert_eq!(c.true_range(110.0), 11.0); // |high-prev_close|
        assert_eq!(c.true_range(95.0), 10.0); // |low-prev_close|
        assert_eq!(c.true_range(101.0), 6.0); // high-low
    }
}
