use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::market::{Candle, Timeframe};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ticker {
    pub price: Decimal,
    pub volume: Decimal,
    pub change_pct: f64,
    pub high: Decimal,
    pub low: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Balance {
    pub free: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Holding {
    pub quantity: Decimal,
    pub avg_buy_price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub order_id: u64,
    pub price: Decimal,
    pub quantity: Decimal,
    pub amount: Decimal,
}

/// Every I/O collaborator the trading loop needs from the exchange,
/// merged from the teacher's split `MarketDataService`/`ExecutionService`
/// traits into one cohesive port. Every method returns `None` on failure
/// rather than propagating an error — callers log and continue per the
/// spec's error-handling table.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn connect(&self) -> bool;

    async fn get_candles(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Option<Vec<Candle>>;

    async fn get_ticker(&self, symbol: &str) -> Option<Ticker>;

    async fn get_all_tickers(&self, symbols: &[String]) -> HashMap<String, Ticker>;

    async fn get_balance(&self) -> Option<Balance>;

    async fn get_holdings(&self) -> HashMap<String, Decimal>;

    async fn get_detailed_holdings(&self) -> HashMap<String, Holding>;

    async fn buy(&self, symbol: &str, krw_amount: Decimal) -> Option<Fill>;

    async fn sell(&self, symbol: &str, quantity: Decimal) -> Option<Fill>;

    async fn limit_buy(&self, symbol: &str, krw_amount: Decimal, target_price: Decimal) -> Option<Fill>;

    async fn limit_sell(&self, symbol: &str, quantity: Decimal, target_price: Decimal) -> Option<Fill>;
}

/// A completed (or synthetic) trade handed to whatever notification
/// transport a tenant has configured.
#[derive(Debug, Clone)]
pub struct TradeNotification {
    pub symbol: String,
    pub side: &'static str,
    pub price: Decimal,
    pub quantity: Decimal,
    pub pnl_pct: Option<f64>,
    pub reason: String,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify_trade(&self, trade: &TradeNotification);
}
