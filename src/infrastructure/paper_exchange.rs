//! C9: an in-memory [`ExchangeClient`] for tenants running `PAPER_TRADE`.
//! Fills happen instantly at the last fed ticker price, minus a flat
//! taker fee, against an in-memory KRW balance and holdings map. Candle
//! and ticker data are injected by whatever feed task owns this exchange
//! — live order-book/ticker polling against a real exchange is an
//! out-of-scope external collaborator, so this struct never reaches the
//! network itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::domain::market::{Candle, Timeframe};
use crate::domain::ports::{Balance, ExchangeClient, Fill, Holding, Ticker};

const TAKER_FEE_RATE: &str = "0.0005";

struct PaperState {
    krw_free: Decimal,
    holdings: HashMap<String, Holding>,
    tickers: HashMap<String, Ticker>,
    candles: HashMap<(String, Timeframe), Vec<Candle>>,
}

/// A simulated exchange account. `feed_ticker`/`feed_candles` are called
/// by the loop's own market-data step immediately after it pulls real
/// data for a symbol, so the paper fills always execute at a realistic
/// price even though no live order ever leaves the process.
pub struct PaperExchange {
    state: RwLock<PaperState>,
    order_seq: AtomicU64,
    fee_rate: Decimal,
}

impl PaperExchange {
    pub fn new(starting_balance: Decimal) -> Self {
        Self {
            state: RwLock::new(PaperState {
                krw_free: starting_balance,
                holdings: HashMap::new(),
                tickers: HashMap::new(),
                candles: HashMap::new(),
            }),
            order_seq: AtomicU64::new(1),
            fee_rate: TAKER_FEE_RATE.parse().expect("valid decimal literal"),
        }
    }

    pub fn feed_ticker(&self, symbol: &str, ticker: Ticker) {
        self.state.write().tickers.insert(symbol.to_string(), ticker);
    }

    pub fn feed_candles(&self, symbol: &str, timeframe: Timeframe, candles: Vec<Candle>) {
        self.state.write().candles.insert((symbol.to_string(), timeframe), candles);
    }

    /// Seeds an initial holding, used when a tenant's paper account
    /// starts with pre-existing coins to exercise the position-sync
    /// adoption path without a live exchange.
    pub fn seed_holding(&self, symbol: &str, holding: Holding) {
        self.state.write().holdings.insert(symbol.to_string(), holding);
    }

    fn next_order_id(&self) -> u64 {
        self.order_seq.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeClient for PaperExchange {
    async fn connect(&self) -> bool {
        true
    }

    async fn get_candles(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Option<Vec<Candle>> {
        let state = self.state.read();
        let series = state.candles.get(&(symbol.to_string(), timeframe))?;
        if series.is_empty() {
            return None;
        }
        let start = series.len().saturating_sub(count);
        Some(series[start..].to_vec())
    }

    async fn get_ticker(&self, symbol: &str) -> Option<Ticker> {
        self.state.read().tickers.get(symbol).copied()
    }

    async fn get_all_tickers(&self, symbols: &[String]) -> HashMap<String, Ticker> {
        let state = self.state.read();
        symbols.iter().filter_map(|s| state.tickers.get(s).map(|t| (s.clone(), *t))).collect()
    }

    async fn get_balance(&self) -> Option<Balance> {
        let state = self.state.read();
        let holdings_value: Decimal = state
            .holdings
            .iter()
            .filter_map(|(symbol, h)| state.tickers.get(symbol).map(|t| t.price * h.quantity))
            .sum();
        Some(Balance { free: state.krw_free, total: state.krw_free + holdings_value })
    }

    async fn get_holdings(&self) -> HashMap<String, Decimal> {
        self.state.read().holdings.iter().map(|(s, h)| (s.clone(), h.quantity)).collect()
    }

    async fn get_detailed_holdings(&self) -> HashMap<String, Holding> {
        self.state.read().holdings.clone()
    }

    async fn buy(&self, symbol: &str, krw_amount: Decimal) -> Option<Fill> {
        let mut state = self.state.write();
        let price = state.tickers.get(symbol)?.price;
        if price <= Decimal::ZERO || krw_amount <= Decimal::ZERO || state.krw_free < krw_amount {
            return None;
        }
        let fee = krw_amount * self.fee_rate;
        let net_amount = krw_amount - fee;
        let quantity = net_amount / price;
        state.krw_free -= krw_amount;
        let entry = state.holdings.entry(symbol.to_string()).or_insert(Holding { quantity: Decimal::ZERO, avg_buy_price: price });
        let new_total_cost = entry.avg_buy_price * entry.quantity + price * quantity;
        entry.quantity += quantity;
        entry.avg_buy_price = new_total_cost / entry.quantity;
        Some(Fill { order_id: self.next_order_id(), price, quantity, amount: krw_amount })
    }

    async fn sell(&self, symbol: &str, quantity: Decimal) -> Option<Fill> {
        let mut state = self.state.write();
        let price = state.tickers.get(symbol)?.price;
        let holding = state.holdings.get_mut(symbol)?;
        if quantity <= Decimal::ZERO || holding.quantity < quantity {
            return None;
        }
        let gross = price * quantity;
        let fee = gross * self.fee_rate;
        let net = gross - fee;
        holding.quantity -= quantity;
        if holding.quantity <= Decimal::ZERO {
            state.holdings.remove(symbol);
        }
        state.krw_free += net;
        Some(Fill { order_id: self.next_order_id(), price, quantity, amount: net })
    }

    async fn limit_buy(&self, symbol: &str, krw_amount: Decimal, target_price: Decimal) -> Option<Fill> {
        let crosses = {
            let state = self.state.read();
            state.tickers.get(symbol).map(|t| t.price <= target_price).unwrap_or(false)
        };
        if crosses {
            self.buy(symbol, krw_amount).await
        } else {
            None
        }
    }

    async fn limit_sell(&self, symbol: &str, quantity: Decimal, target_price: Decimal) -> Option<Fill> {
        let crosses = {
            let state = self.state.read();
            state.tickers.get(symbol).map(|t| t.price >= target_price).unwrap_or(false)
        };
        if crosses {
            self.sell(symbol, quantity).await
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ticker(price: Decimal) -> Ticker {
        Ticker { price, volume: dec!(100), change_pct: 0.0, high: price, low: price }
    }

    #[tokio::test]
    async fn buy_then_sell_round_trips_balance_minus_fees() {
        let ex = PaperExchange::new(dec!(1_000_000));
        ex.feed_ticker("BTC/KRW", ticker(dec!(100_000)));
        let fill = ex.buy("BTC/KRW", dec!(100_000)).await.unwrap();
        assert!(fill.quantity > Decimal::ZERO);
        let balance = ex.get_balance().await.unwrap();
        assert_eq!(balance.free, dec!(900_000));

        let sell_fill = ex.sell("BTC/KRW", fill.quantity).await.unwrap();
        assert!(sell_fill.amount < dec!(100_000));
        assert!(ex.get_holdings().await.is_empty());
    }

    #[tokio::test]
    async fn buy_rejected_when_balance_insufficient() {
        let ex = PaperExchange::new(dec!(1_000));
        ex.feed_ticker("BTC/KRW", ticker(dec!(100_000)));
        assert!(ex.buy("BTC/KRW", dec!(100_000)).await.is_none());
    }

    #[tokio::test]
    async fn limit_buy_only_fills_when_price_crosses() {
        let ex = PaperExchange::new(dec!(1_000_000));
        ex.feed_ticker("BTC/KRW", ticker(dec!(100_000)));
        assert!(ex.limit_buy("BTC/KRW", dec!(50_000), dec!(99_000)).await.is_none());
        assert!(ex.limit_buy("BTC/KRW", dec!(50_000), dec!(101_000)).await.is_some());
    }
}
