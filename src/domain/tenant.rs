use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One user of the multi-tenant supervisor. Owns its exchange credentials,
/// ledger directory, dashboard port, and runtime config; the tenant id is
/// threaded through every persistence path and log span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    pub id: String,
    pub nickname: String,
    pub access_key: String,
    pub secret_key: String,
    pub dashboard_port: u16,
    pub paper_trade: bool,
    pub paper_balance: rust_decimal::Decimal,
    pub notify_token: Option<String>,
    pub scan_interval_secs: u64,
    /// Bearer value the dashboard façade (C11) requires on every
    /// `X-Tenant-Token` header; generated once at registration and never
    /// rotated automatically.
    pub dashboard_token: String,
}

impl TenantConfig {
    pub fn ledger_dir(&self, tenants_root: &Path) -> PathBuf {
        tenants_root.join(&self.id)
    }
}

/// Lowest free dashboard port starting at 3737, scanning over already
/// registered tenants. Used by the registration endpoint (C11) so a new
/// tenant never collides with a running one.
pub fn allocate_dashboard_port(existing: &[TenantConfig]) -> u16 {
    let mut port = 3737u16;
    loop {
        if !existing.iter().any(|t| t.dashboard_port == port) {
            return port;
        }
        port += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tenant(id: &str, port: u16) -> TenantConfig {
        TenantConfig {
            id: id.to_string(),
            nickname: id.to_string(),
            access_key: "k".to_string(),
            secret_key: "s".to_string(),
            dashboard_port: port,
            paper_trade: true,
            paper_balance: dec!(1_000_000),
            notify_token: None,
            scan_interval_secs: 5,
            dashboard_token: "test-token".to_string(),
        }
    }

    #[test]
    fn allocates_first_free_port() {
        let existing = vec![tenant("a", 3737), tenant("b", 3738)];
        assert_eq!(allocate_dashboard_port(&existing), 3739);
    }

    #[test]
    fn starts_at_base_when_empty() {
        assert_eq!(allocate_dashboard_port(&[]), 3737);
    }

    #[test]
    fn fills_gaps() {
        let existing = vec![tenant("a", 3737), tenant("c", 3739)];
        assert_eq!(allocate_dashboard_port(&existing), 3738);
    }
}
