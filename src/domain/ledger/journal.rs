use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
    PartialSell,
    Dca,
    ForceRemove,
}

/// One append-only row in `trades.jsonl`. `pnl_amount` is always written
/// explicitly at exit time (spec §9 open-question resolution): replay
/// never has to re-derive it from a percentage and an ambiguous prior
/// BUY amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeJournalEntry {
    pub ts_ms: i64,
    pub side: TradeSide,
    pub symbol: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub amount: Decimal,
    pub pnl_amount: Option<Decimal>,
    pub pnl_pct: Option<f64>,
    pub reason: String,
    /// Idempotency key: a per-tenant monotonic sequence assigned at the
    /// moment of decision, before the in-memory position is mutated.
    /// A restart replaying the journal recognizes and skips a row whose
    /// `order_seq` it already applied.
    pub order_seq: u64,
}

impl TradeJournalEntry {
    pub fn is_exit(&self) -> bool {
        matches!(self.side, TradeSide::Sell | TradeSide::PartialSell | TradeSide::ForceRemove)
    }
}

/// One FIFO-matched round trip, the unit the learning pass and combo
/// tracker both operate on.
#[derive(Debug, Clone, PartialEq)]
pub struct TradePair {
    pub symbol: String,
    pub buy_ts_ms: i64,
    pub sell_ts_ms: i64,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub quantity: Decimal,
    pub pnl_pct: f64,
    pub hold_ms: i64,
    pub buy_reason: String,
}

/// Matches BUY rows to SELL/PARTIAL_SELL rows per symbol on a FIFO basis.
/// Replaying the same journal twice yields identical pair counts, which
/// is what keeps the online combo tracker and the offline learning pass
/// in agreement.
pub fn fifo_match(entries: &[TradeJournalEntry]) -> Vec<TradePair> {
    use std::collections::HashMap;

    struct OpenLot {
        ts_ms: i64,
        price: Decimal,
        quantity: Decimal,
        reason: String,
    }

    let mut open: HashMap<String, std::collections::VecDeque<OpenLot>> = HashMap::new();
    let mut pairs = Vec::new();

    for entry in entries {
        match entry.side {
            TradeSide::Buy | TradeSide::Dca => {
                open.entry(entry.symbol.clone()).or_default().push_back(OpenLot {
                    ts_ms: entry.ts_ms,
                    price: entry.price,
                    quantity: entry.quantity,
                    reason: entry.reason.clone(),
                });
            }
            TradeSide::Sell | TradeSide::PartialSell | TradeSide::ForceRemove => {
                let lots = open.entry(entry.symbol.clone()).or_default();
                let mut remaining = entry.quantity;
                while remaining > Decimal::ZERO {
                    let Some(lot) = lots.front_mut() else { break };
                    let matched = remaining.min(lot.quantity);
                    if matched <= Decimal::ZERO {
                        break;
                    }
                    let pnl_pct = if lot.price.is_zero() {
                        0.0
                    } else {
                        use rust_decimal::prelude::ToPrimitive;
                        ((entry.price - lot.price) / lot.price * Decimal::ONE_HUNDRED).to_f64().unwrap_or(0.0)
                    };
                    pairs.push(TradePair {
                        symbol: entry.symbol.clone(),
                        buy_ts_ms: lot.ts_ms,
                        sell_ts_ms: entry.ts_ms,
                        buy_price: lot.price,
                        sell_price: entry.price,
                        quantity: matched,
                        pnl_pct,
                        hold_ms: entry.ts_ms - lot.ts_ms,
                        buy_reason: lot.reason.clone(),
                    });
                    lot.quantity -= matched;
                    remaining -= matched;
                    if lot.quantity <= Decimal::ZERO {
                        lots.pop_front();
                    }
                }
            }
        }
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(side: TradeSide, symbol: &str, price: Decimal, qty: Decimal, ts: i64) -> TradeJournalEntry {
        TradeJournalEntry {
            ts_ms: ts,
            side,
            symbol: symbol.to_string(),
            price,
            quantity: qty,
            amount: price * qty,
            pnl_amount: None,
            pnl_pct: None,
            reason: "x".to_string(),
            order_seq: ts as u64,
        }
    }

    #[test]
    fn fifo_matches_buy_then_sell() {
        let entries = vec![
            entry(TradeSide::Buy, "BTC/KRW", dec!(100), dec!(1), 0),
            entry(TradeSide::Sell, "BTC/KRW", dec!(105), dec!(1), 1000),
        ];
        let pairs = fifo_match(&entries);
        assert_eq!(pairs.len(), 1);
        assert!((pairs[0].pnl_pct - 5.0).abs() < 0.001);
    }

    #[test]
    fn fifo_splits_partial_sells_across_one_lot() {
        let entries = vec![
            entry(TradeSide::Buy, "BTC/KRW", dec!(100), dec!(2), 0),
            entry(TradeSide::PartialSell, "BTC/KRW", dec!(103), dec!(1), 1000),
            entry(TradeSide::Sell, "BTC/KRW", dec!(106), dec!(1), 2000),
        ];
        let pairs = fifo_match(&entries);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].quantity, dec!(1));
        assert_eq!(pairs[1].quantity, dec!(1));
    }

    #[test]
    fn replay_is_deterministic() {
        let entries = vec![
            entry(TradeSide::Buy, "BTC/KRW", dec!(100), dec!(1), 0),
            entry(TradeSide::Sell, "BTC/KRW", dec!(95), dec!(1), 1000),
        ];
        assert_eq!(fifo_match(&entries).len(), fifo_match(&entries).len());
    }
}
