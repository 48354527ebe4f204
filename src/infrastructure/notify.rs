//! A [`NotificationSink`] that logs every trade via `tracing`, grounded
//! in the teacher's own struct-free logging notifier. Pushing to an
//! external chat webhook is an out-of-scope collaborator (spec §1); a
//! tenant that wants one can layer it on top of this at the call site
//! without the core depending on any particular transport.

use async_trait::async_trait;

use crate::domain::ports::{NotificationSink, TradeNotification};

#[derive(Debug, Default)]
pub struct TracingNotifier {
    pub tenant_id: String,
}

impl TracingNotifier {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self { tenant_id: tenant_id.into() }
    }
}

#[async_trait]
impl NotificationSink for TracingNotifier {
    async fn notify_trade(&self, trade: &TradeNotification) {
        tracing::info!(
            tenant = %self.tenant_id,
            symbol = %trade.symbol,
            side = trade.side,
            price = %trade.price,
            quantity = %trade.quantity,
            pnl_pct = ?trade.pnl_pct,
            reason = %trade.reason,
            "trade executed"
        );
    }
}
