use crate::domain::context::ContextFragment;

/// A single price level: `(price, quantity)`.
pub type Level = (f64, f64);

#[derive(Debug, Clone, Default)]
pub struct OrderbookSnapshot {
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderbookSignal {
    pub imbalance: f64,
    pub fragment: ContextFragment,
}

const WALL_BAND_PCT: f64 = 0.5;
const WALL_MULTIPLE: f64 = 5.0;

/// Reads order-book depth into an imbalance ratio plus whale-wall
/// proximity (spec's "Order-book imbalance & walls", ±2.0). `None` when
/// either side of the book is empty.
pub fn analyze_orderbook(book: &OrderbookSnapshot, last_price: f64) -> Option<OrderbookSignal> {
    if book.bids.is_empty() || book.asks.is_empty() || last_price <= 0.0 {
        return None;
    }
    let bid_volume: f64 = book.bids.iter().map(|(_, q)| q).sum();
    let ask_volume: f64 = book.asks.iter().map(|(_, q)| q).sum();
    let total = bid_volume + ask_volume;
    if total == 0.0 {
        return None;
    }
    let imbalance = (bid_volume - ask_volume) / total;

    let avg_level = total / (book.bids.len() + book.asks.len()) as f64;
    let band = last_price * WALL_BAND_PCT / 100.0;

    let buy_wall = book.bids.iter().any(|(p, q)| (last_price - p).abs() <= band && *q >= avg_level * WALL_MULTIPLE);
    let sell_wall = book.asks.iter().any(|(p, q)| (p - last_price).abs() <= band && *q >= avg_level * WALL_MULTIPLE);

    let mut buy_boost = (imbalance.max(0.0) * 2.0).min(2.0);
    let mut sell_boost = ((-imbalance).max(0.0) * 2.0).min(2.0);
    if buy_wall {
        buy_boost = (buy_boost + 0.5).min(2.0);
    }
    if sell_wall {
        sell_boost = (sell_boost + 0.5).min(2.0);
    }

    let reason = if buy_wall {
        "orderbook_buy_wall"
    } else if sell_wall {
        "orderbook_sell_wall"
    } else if imbalance > 0.0 {
        "orderbook_bid_heavy"
    } else if imbalance < 0.0 {
        "orderbook_ask_heavy"
    } else {
        "no_data"
    };

    Some(OrderbookSignal { imbalance, fragment: ContextFragment { buy_boost, sell_boost, reason } })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_book_is_none() {
        assert!(analyze_orderbook(&OrderbookSnapshot::default(), 100.0).is_none());
    }

    #[test]
    fn bid_heavy_book_tilts_buy() {
        let book = OrderbookSnapshot {
            bids: vec![(99.9, 10.0), (99.8, 10.0)],
            asks: vec![(100.1, 2.0), (100.2, 2.0)],
        };
        let signal = analyze_orderbook(&book, 100.0).unwrap();
        assert!(signal.imbalance > 0.0);
        assert!(signal.fragment.buy_boost > 0.0);
    }

    #[test]
    fn large_bid_wall_near_price_is_flagged() {
        let book = OrderbookSnapshot {
            bids: vec![(99.9, 100.0), (95.0, 1.0)],
            asks: vec![(100.1, 5.0), (101.0, 5.0)],
        };
        let signal = analyze_orderbook(&book, 100.0).unwrap();
        assert_eq!(signal.fragment.reason, "orderbook_buy_wall");
    }
}
