//! C10: owns one [`TenantContext`] and trading-loop task per tenant, and
//! the hot-registration path the dashboard's `POST /api/register`
//! drives. Nothing here is a singleton — a fresh [`Supervisor`] is built
//! once in `main` and everything downstream (the dashboard façade, the
//! `learn` binary) reaches tenants only through it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::task::JoinHandle;

use crate::domain::ports::ExchangeClient;
use crate::domain::tenant::{allocate_dashboard_port, TenantConfig};
use crate::infrastructure::config::{load_tenants_from_dir, write_tenant_env, GlobalConfig};
use crate::infrastructure::notify::TracingNotifier;
use crate::infrastructure::null_exchange::NullExchange;
use crate::infrastructure::paper_exchange::PaperExchange;
use crate::infrastructure::persistence::TenantStore;

use super::context::TenantContext;
use super::trading_loop;

/// One running tenant: its shared context plus the scan-loop task (C5),
/// so shutdown can await completion instead of just flipping a flag.
struct TenantHandle {
    ctx: Arc<TenantContext>,
    task: JoinHandle<()>,
}

/// Supervises every tenant's lifecycle (spec §4.9): boots one
/// [`TenantContext`] + trading-loop task per configured tenant and
/// exposes hot registration so a new tenant can join without a process
/// restart.
pub struct Supervisor {
    tenants: DashMap<String, TenantHandle>,
    tenants_dir: PathBuf,
}

impl Supervisor {
    pub fn new(global: &GlobalConfig) -> Self {
        Self { tenants: DashMap::new(), tenants_dir: global.tenants_dir.clone() }
    }

    /// Loads every tenant config under `tenants_dir` and spawns its
    /// loop. A tenant whose context fails to build (unwritable ledger
    /// directory) is logged and skipped rather than aborting the whole
    /// boot.
    pub async fn boot(&self) {
        for config in load_tenants_from_dir(&self.tenants_dir) {
            let id = config.id.clone();
            if let Err(e) = self.spawn_tenant(config) {
                tracing::error!(tenant = %id, error = %e, "failed to boot tenant");
            }
        }
    }

    /// A live-trading tenant has no real exchange wired in yet (that
    /// connectivity is an out-of-scope external collaborator) and stays
    /// inert on [`NullExchange`] rather than panicking the supervisor.
    fn build_exchange(config: &TenantConfig) -> Arc<dyn ExchangeClient> {
        if config.paper_trade {
            Arc::new(PaperExchange::new(config.paper_balance))
        } else {
            Arc::new(NullExchange)
        }
    }

    fn spawn_tenant(&self, config: TenantConfig) -> Result<()> {
        let id = config.id.clone();
        let ledger_dir = config.ledger_dir(&self.tenants_dir);
        let store = Arc::new(TenantStore::new(&ledger_dir).with_context(|| format!("opening ledger dir for tenant {id}"))?);
        let exchange = Self::build_exchange(&config);
        let notifier = Arc::new(TracingNotifier::new(id.clone()));
        let initial_balance = config.paper_balance;
        let ctx = Arc::new(TenantContext::new(config, exchange, notifier, store, initial_balance));
        let task = tokio::spawn(trading_loop::run(ctx.clone()));
        self.tenants.insert(id, TenantHandle { ctx, task });
        Ok(())
    }

    /// Registers a brand new tenant at runtime (C11 `POST /api/register`):
    /// allocates a free dashboard port, mints a dashboard token, persists
    /// the tenant's env file, then spawns it exactly like a boot-time
    /// tenant. Returns the new tenant's config so the caller can hand the
    /// freshly-minted token back in the registration response.
    pub fn register_tenant(&self, id: String, nickname: String, access_key: String, secret_key: String, paper_trade: bool, paper_balance: Decimal) -> Result<TenantConfig> {
        if self.tenants.contains_key(&id) {
            bail!("tenant {id} already registered");
        }
        if !paper_trade && (access_key.is_empty() || secret_key.is_empty()) {
            bail!("live trading tenant {id} is missing an access/secret key pair");
        }

        let existing: Vec<TenantConfig> = self.tenants.iter().map(|e| e.ctx.config.clone()).collect();
        let config = TenantConfig {
            id: id.clone(),
            nickname,
            access_key,
            secret_key,
            dashboard_port: allocate_dashboard_port(&existing),
            paper_trade,
            paper_balance,
            notify_token: None,
            scan_interval_secs: 30,
            dashboard_token: uuid::Uuid::new_v4().to_string(),
        };
        write_tenant_env(&self.tenants_dir, &config).context("writing new tenant env file")?;
        self.spawn_tenant(config.clone())?;
        Ok(config)
    }

    pub fn get(&self, id: &str) -> Option<Arc<TenantContext>> {
        self.tenants.get(id).map(|e| e.ctx.clone())
    }

    pub fn tenant_ids(&self) -> Vec<String> {
        self.tenants.iter().map(|e| e.key().clone()).collect()
    }

    pub fn all(&self) -> Vec<Arc<TenantContext>> {
        self.tenants.iter().map(|e| e.ctx.clone()).collect()
    }

    /// Orderly shutdown (spec §4.9): flips every tenant's running flag,
    /// then awaits each loop task — which best-effort liquidates its
    /// open positions before returning — so nothing is dropped mid-scan.
    pub async fn shutdown(&self) {
        for entry in self.tenants.iter() {
            entry.ctx.stop();
        }
        let ids: Vec<String> = self.tenants.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, handle)) = self.tenants.remove(&id) {
                if let Err(e) = handle.task.await {
                    tracing::error!(tenant = %id, error = %e, "tenant loop task panicked during shutdown");
                }
            }
        }
    }
}
