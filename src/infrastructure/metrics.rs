//! Prometheus text-format metrics (declared ambient dependency, spec §6
//! dashboard façade), one process-wide [`Registry`] scraped through every
//! tenant's own `GET /metrics`. Labels carry `tenant_id` so one registry
//! is enough even though each tenant binds its own port.

use std::sync::OnceLock;

use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    trades_total: IntCounterVec,
    open_positions: IntGaugeVec,
    scan_errors_total: IntCounterVec,
}

impl Metrics {
    fn new() -> Self {
        let registry = Registry::new();

        let trades_total = IntCounterVec::new(
            Opts::new("kimchi_trades_total", "Executed trades by tenant, side, and reason"),
            &["tenant_id", "side", "reason"],
        )
        .expect("static metric descriptor");
        let open_positions = IntGaugeVec::new(Opts::new("kimchi_open_positions", "Currently open positions per tenant"), &["tenant_id"])
            .expect("static metric descriptor");
        let scan_errors_total = IntCounterVec::new(Opts::new("kimchi_scan_errors_total", "Scan-loop errors per tenant"), &["tenant_id"])
            .expect("static metric descriptor");

        registry.register(Box::new(trades_total.clone())).expect("unique metric name");
        registry.register(Box::new(open_positions.clone())).expect("unique metric name");
        registry.register(Box::new(scan_errors_total.clone())).expect("unique metric name");

        Self { registry, trades_total, open_positions, scan_errors_total }
    }

    pub fn global() -> &'static Metrics {
        static INSTANCE: OnceLock<Metrics> = OnceLock::new();
        INSTANCE.get_or_init(Metrics::new)
    }

    pub fn record_trade(&self, tenant_id: &str, side: &str, reason: &str) {
        self.trades_total.with_label_values(&[tenant_id, side, reason]).inc();
    }

    pub fn set_open_positions(&self, tenant_id: &str, count: i64) {
        self.open_positions.with_label_values(&[tenant_id]).set(count);
    }

    pub fn record_scan_error(&self, tenant_id: &str) {
        self.scan_errors_total.with_label_values(&[tenant_id]).inc();
    }

    /// Renders the whole registry as Prometheus text-exposition format.
    pub fn render(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buf).expect("text encoder never fails on well-formed families");
        String::from_utf8(buf).expect("prometheus text output is always valid utf-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_recorded_samples() {
        let metrics = Metrics::new();
        metrics.record_trade("t1", "BUY", "rsi_oversold");
        metrics.set_open_positions("t1", 3);
        let text = metrics.render();
        assert!(text.contains("kimchi_trades_total"));
        assert!(text.contains("kimchi_open_positions"));
    }
}
