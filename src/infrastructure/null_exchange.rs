//! A no-op [`ExchangeClient`] that never panics and never fills an order.
//! Grounded in the teacher's own null-object test double; useful for
//! dashboard smoke tests and for a tenant slot that's configured but not
//! yet funded.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::market::{Candle, Timeframe};
use crate::domain::ports::{Balance, ExchangeClient, Fill, Holding, Ticker};

#[derive(Debug, Default)]
pub struct NullExchange;

#[async_trait]
impl ExchangeClient for NullExchange {
    async fn connect(&self) -> bool {
        true
    }

    async fn get_candles(&self, _symbol: &str, _timeframe: Timeframe, _count: usize) -> Option<Vec<Candle>> {
        None
    }

    async fn get_ticker(&self, _symbol: &str) -> Option<Ticker> {
        None
    }

    async fn get_all_tickers(&self, _symbols: &[String]) -> HashMap<String, Ticker> {
        HashMap::new()
    }

    async fn get_balance(&self) -> Option<Balance> {
        Some(Balance { free: Decimal::ZERO, total: Decimal::ZERO })
    }

    async fn get_holdings(&self) -> HashMap<String, Decimal> {
        HashMap::new()
    }

    async fn get_detailed_holdings(&self) -> HashMap<String, Holding> {
        HashMap::new()
    }

    async fn buy(&self, _symbol: &str, _krw_amount: Decimal) -> Option<Fill> {
        None
    }

    async fn sell(&self, _symbol: &str, _quantity: Decimal) -> Option<Fill> {
        None
    }

    async fn limit_buy(&self, _symbol: &str, _krw_amount: Decimal, _target_price: Decimal) -> Option<Fill> {
        None
    }

    async fn limit_sell(&self, _symbol: &str, _quantity: Decimal, _target_price: Decimal) -> Option<Fill> {
        None
    }
}
