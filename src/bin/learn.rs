//! Offline learning-pass CLI (C8): reads one tenant's journal and combo
//! tracker off disk, grid-searches the seven learnable strategy keys, and
//! writes the resulting `learned-params.json`/`loss-patterns.json`/
//! `blacklist.json` back out. Run on a schedule alongside the live
//! engine, never from within it, so a slow grid search never stalls a
//! scan.

use std::path::PathBuf;

use clap::Parser;
use kimchi_engine::application::learning::run_learning_pass;
use kimchi_engine::domain::ledger::LearnedParamDefaults;
use kimchi_engine::infrastructure::persistence::TenantStore;

#[derive(Parser, Debug)]
#[command(name = "learn", about = "Runs the offline learning pass for one tenant")]
struct Args {
    /// Tenant id whose ledger directory should be read and rewritten.
    #[arg(long)]
    tenant: String,

    /// Root directory under which each tenant has its own ledger folder.
    #[arg(long, default_value = "tenants")]
    tenants_dir: PathBuf,
}

fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let ledger_dir = args.tenants_dir.join(&args.tenant);
    let store = match TenantStore::new(&ledger_dir) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(tenant = %args.tenant, dir = %ledger_dir.display(), error = %e, "failed to open tenant ledger directory");
            std::process::exit(1);
        }
    };

    let journal = store.read_journal();
    let combo_store = store.read_combo_stats();
    let defaults = LearnedParamDefaults::default();
    let now_ms = chrono::Utc::now().timestamp_millis();

    let outcome = run_learning_pass(&journal, &combo_store, &defaults, now_ms);

    tracing::info!(
        tenant = %args.tenant,
        pairs_considered = journal.len(),
        confidence = outcome.record.confidence,
        loss_rules = outcome.loss_rules.len(),
        blacklisted = outcome.blacklist.len(),
        "learning pass complete"
    );

    if let Err(e) = store.write_learned_params(&outcome.record) {
        tracing::error!(tenant = %args.tenant, error = %e, "failed to write learned-params.json");
        std::process::exit(1);
    }
    if let Err(e) = store.write_loss_patterns(&outcome.loss_rules) {
        tracing::error!(tenant = %args.tenant, error = %e, "failed to write loss-patterns.json");
        std::process::exit(1);
    }
    if let Err(e) = store.write_blacklist(&outcome.blacklist) {
        tracing::error!(tenant = %args.tenant, error = %e, "failed to write blacklist.json");
        std::process::exit(1);
    }
}
