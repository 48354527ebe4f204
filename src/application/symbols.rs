//! Hourly watch-list refresh: the top-volume symbols bounded to a small
//! default count, unioned with whatever symbols currently carry an open
//! position so a refresh never silently drops a position's own symbol
//! from the scan list.

use std::collections::HashSet;

use crate::domain::ports::{ExchangeClient, Ticker};

pub const DEFAULT_WATCHLIST_SIZE: usize = 10;
pub const SYMBOL_REFRESH_INTERVAL_MS: i64 = 3_600_000;

/// Ranks `tickers` by 24h volume and keeps the top `limit`, then unions in
/// every symbol from `held_symbols` regardless of rank.
pub fn refresh_watchlist(tickers: &std::collections::HashMap<String, Ticker>, held_symbols: &[String], limit: usize) -> Vec<String> {
    let mut by_volume: Vec<(&String, &Ticker)> = tickers.iter().collect();
    by_volume.sort_by(|a, b| b.1.volume.cmp(&a.1.volume));

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (symbol, _) in by_volume.into_iter().take(limit) {
        if seen.insert(symbol.clone()) {
            out.push(symbol.clone());
        }
    }
    for symbol in held_symbols {
        if seen.insert(symbol.clone()) {
            out.push(symbol.clone());
        }
    }
    out
}

/// Pulls all tradable tickers from the exchange and derives the new
/// watch-list. Returns the prior list unchanged if the exchange gave no
/// tickers at all, since an empty refresh would otherwise strand every
/// open position with no scan coverage.
pub async fn refresh_from_exchange(
    exchange: &dyn ExchangeClient,
    universe: &[String],
    held_symbols: &[String],
    limit: usize,
    previous: &[String],
) -> Vec<String> {
    let tickers = exchange.get_all_tickers(universe).await;
    if tickers.is_empty() {
        return previous.to_vec();
    }
    refresh_watchlist(&tickers, held_symbols, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn ticker(volume: rust_decimal::Decimal) -> Ticker {
        Ticker { price: dec!(100), volume, change_pct: 0.0, high: dec!(101), low: dec!(99) }
    }

    #[test]
    fn keeps_top_volume_and_unions_held_symbols() {
        let mut tickers = HashMap::new();
        tickers.insert("A/KRW".to_string(), ticker(dec!(100)));
        tickers.insert("B/KRW".to_string(), ticker(dec!(50)));
        tickers.insert("C/KRW".to_string(), ticker(dec!(10)));
        let held = vec!["Z/KRW".to_string()];
        let watch = refresh_watchlist(&tickers, &held, 2);
        assert!(watch.contains(&"A/KRW".to_string()));
        assert!(watch.contains(&"B/KRW".to_string()));
        assert!(watch.contains(&"Z/KRW".to_string()));
        assert!(!watch.contains(&"C/KRW".to_string()));
    }
}
