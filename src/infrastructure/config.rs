//! **[AMBIENT]** Per-tenant env-style file parsing and the process-global
//! config, grounded in the teacher's `Config::from_env` pattern
//! (`config/mod.rs`) but scoped down to `KEY=VALUE` line parsing since
//! richer config *loading* (file watching, remote config) is an
//! out-of-scope external concern per spec §1 — only the content format
//! in spec §6 is ours to parse.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;

use crate::domain::tenant::TenantConfig;

/// Parses `KEY=VALUE` lines (no shell expansion, `#` comments, blank
/// lines ignored) the way a `.env`-style tenant file is written per spec
/// §6. Lines that don't split on `=` are skipped with a warning rather
/// than aborting the whole tenant boot.
pub fn parse_env_lines(contents: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            tracing::warn!(line = trimmed, "skipping malformed config line");
            continue;
        };
        let value = value.trim().trim_matches('"');
        map.insert(key.trim().to_string(), value.to_string());
    }
    map
}

/// Builds a [`TenantConfig`] from one tenant's env-style file content.
/// `id` is the filesystem-safe directory name the file lives under, not
/// read from the file itself.
pub fn tenant_config_from_env(id: &str, contents: &str, nickname: &str) -> Result<TenantConfig> {
    let vars = parse_env_lines(contents);
    let access_key = vars.get("ACCESS_KEY").cloned().unwrap_or_default();
    let secret_key = vars.get("SECRET_KEY").cloned().unwrap_or_default();
    let dashboard_port: u16 = vars
        .get("DASHBOARD_PORT")
        .map(|v| v.parse())
        .transpose()
        .context("DASHBOARD_PORT must be a u16")?
        .unwrap_or(3737);
    let paper_trade = vars.get("PAPER_TRADE").map(|v| v == "true" || v == "1").unwrap_or(true);
    let paper_balance: Decimal = vars
        .get("PAPER_BALANCE")
        .map(|v| v.parse())
        .transpose()
        .context("PAPER_BALANCE must be a decimal")?
        .unwrap_or(Decimal::new(1_000_000, 0));
    let scan_interval_secs: u64 = vars
        .get("SCAN_INTERVAL_SECS")
        .map(|v| v.parse())
        .transpose()
        .context("SCAN_INTERVAL_SECS must be a u64")?
        .unwrap_or(30);
    let notify_token = vars.get("NOTIFY_TOKEN").cloned();
    let dashboard_token = vars.get("DASHBOARD_TOKEN").cloned().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    if !paper_trade && (access_key.is_empty() || secret_key.is_empty()) {
        bail!("live trading tenant {id} is missing ACCESS_KEY/SECRET_KEY");
    }

    Ok(TenantConfig {
        id: id.to_string(),
        nickname: nickname.to_string(),
        access_key,
        secret_key,
        dashboard_port,
        paper_trade,
        paper_balance,
        notify_token,
        scan_interval_secs,
        dashboard_token,
    })
}

/// Renders a [`TenantConfig`] back to the same `KEY=VALUE` format
/// [`tenant_config_from_env`] reads, so hot-registration (C10/C11's
/// `/api/register`) can write a brand new tenant file without a process
/// restart and have it reload identically on the next boot.
pub fn render_tenant_env(config: &TenantConfig) -> String {
    format!(
        "ACCESS_KEY={}\nSECRET_KEY={}\nDASHBOARD_PORT={}\nPAPER_TRADE={}\nPAPER_BALANCE={}\nSCAN_INTERVAL_SECS={}\nDASHBOARD_TOKEN={}\n{}",
        config.access_key,
        config.secret_key,
        config.dashboard_port,
        config.paper_trade,
        config.paper_balance,
        config.scan_interval_secs,
        config.dashboard_token,
        config.notify_token.as_ref().map(|t| format!("NOTIFY_TOKEN={t}\n")).unwrap_or_default(),
    )
}

/// Atomically writes a new tenant's env file under `tenants_dir`, named
/// after its id. Used by the registration path so a restart picks up
/// exactly the tenant the running supervisor already hot-registered.
pub fn write_tenant_env(tenants_dir: &Path, config: &TenantConfig) -> Result<()> {
    std::fs::create_dir_all(tenants_dir).context("creating tenants directory")?;
    let path = tenants_dir.join(format!("{}.env", config.id));
    let tmp_path = tenants_dir.join(format!("{}.env.tmp", config.id));
    std::fs::write(&tmp_path, render_tenant_env(config)).with_context(|| format!("writing {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, &path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

/// Loads every `*.env` tenant file under `tenants_dir` at boot (C10).
/// A tenant whose file fails to parse is logged and skipped rather than
/// aborting the whole supervisor's startup.
pub fn load_tenants_from_dir(tenants_dir: &Path) -> Vec<TenantConfig> {
    let Ok(entries) = std::fs::read_dir(tenants_dir) else {
        tracing::warn!(dir = %tenants_dir.display(), "tenants directory missing, starting with zero tenants");
        return Vec::new();
    };
    let mut tenants = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("env") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
        match std::fs::read_to_string(&path) {
            Ok(contents) => match tenant_config_from_env(stem, &contents, stem) {
                Ok(cfg) => tenants.push(cfg),
                Err(e) => tracing::error!(tenant = stem, error = %e, "failed to parse tenant config"),
            },
            Err(e) => tracing::error!(path = %path.display(), error = %e, "failed to read tenant config file"),
        }
    }
    tenants
}

/// Process-global settings: the invite code gating `/api/register` and
/// the optional AI-chatbot key, both external collaborators per spec §1
/// — the core only needs to know whether they're configured.
#[derive(Debug, Clone, Default)]
pub struct GlobalConfig {
    pub invite_code: Option<String>,
    pub chatbot_key: Option<String>,
    pub tenants_dir: std::path::PathBuf,
}

impl GlobalConfig {
    pub fn from_env() -> Self {
        Self {
            invite_code: std::env::var("INVITE_CODE").ok(),
            chatbot_key: std::env::var("CHATBOT_KEY").ok(),
            tenants_dir: std::env::var("TENANTS_DIR").map(std::path::PathBuf::from).unwrap_or_else(|_| std::path::PathBuf::from("tenants")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_env_file() {
        let contents = "ACCESS_KEY=abc\nSECRET_KEY=def\nDASHBOARD_PORT=3740\nPAPER_TRADE=true\n# a comment\n\nPAPER_BALANCE=2000000\n";
        let cfg = tenant_config_from_env("alice", contents, "Alice").unwrap();
        assert_eq!(cfg.access_key, "abc");
        assert_eq!(cfg.dashboard_port, 3740);
        assert!(cfg.paper_trade);
        assert_eq!(cfg.paper_balance, Decimal::new(2_000_000, 0));
    }

    #[test]
    fn live_trading_without_keys_is_rejected() {
        let contents = "PAPER_TRADE=false\n";
        assert!(tenant_config_from_env("bob", contents, "Bob").is_err());
    }

    #[test]
    fn malformed_line_is_skipped_not_fatal() {
        let contents = "ACCESS_KEY=abc\nthis is not kv\nSECRET_KEY=def\n";
        let cfg = tenant_config_from_env("carol", contents, "Carol").unwrap();
        assert_eq!(cfg.secret_key, "def");
    }
}
