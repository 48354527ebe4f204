//! Per-tenant dashboard HTTP surface (spec §6): status/trades/logs/candles
//! reads plus the blacklist mutation route, all behind [`TenantAuth`]. One
//! router is built per tenant and bound to that tenant's own
//! `dashboard_port`, mirroring the teacher's one-axum-app-per-service
//! layout rather than a single shared router keyed by tenant id.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::application::context::TenantContext;
use crate::domain::market::bollinger::{bollinger, Bollinger};
use crate::domain::market::{Candle, Timeframe};
use crate::infrastructure::metrics::Metrics;

use super::auth::TenantAuth;
use super::snapshot::{build_snapshot, StatusSnapshot};

const CANDLE_VIEW_COUNT: usize = 60;

async fn status(_auth: TenantAuth, State(ctx): State<Arc<TenantContext>>) -> Json<StatusSnapshot> {
    Json(build_snapshot(&ctx).await)
}

async fn trades(_auth: TenantAuth, State(ctx): State<Arc<TenantContext>>) -> Json<serde_json::Value> {
    let mut journal = ctx.store.read_journal();
    journal.reverse();
    journal.truncate(50);
    Json(serde_json::json!({ "trades": journal }))
}

async fn logs(_auth: TenantAuth, State(ctx): State<Arc<TenantContext>>) -> Json<serde_json::Value> {
    let entries: Vec<_> = {
        let state = ctx.state.read();
        state
            .log_ring
            .iter()
            .rev()
            .take(30)
            .map(|e| serde_json::json!({ "ts_ms": e.ts_ms, "level": e.level, "message": e.message }))
            .collect()
    };
    Json(serde_json::json!({ "logs": entries }))
}

#[derive(Debug, Serialize)]
struct CandleView {
    candle: Candle,
    bollinger: Option<Bollinger>,
}

async fn candles(_auth: TenantAuth, State(ctx): State<Arc<TenantContext>>, Path(symbol): Path<String>) -> Result<Json<serde_json::Value>, StatusCode> {
    let Some(history) = ctx.exchange.get_candles(&symbol, Timeframe::M5, 200).await else {
        return Err(StatusCode::NOT_FOUND);
    };
    let view_start = history.len().saturating_sub(CANDLE_VIEW_COUNT);
    let mut views = Vec::new();
    for i in view_start..history.len() {
        let window = &history[..=i];
        views.push(CandleView { candle: history[i], bollinger: bollinger(window, 20, 2.0) });
    }
    let position = { ctx.state.read().positions.get(&symbol).cloned() };
    Ok(Json(serde_json::json!({ "symbol": symbol, "candles": views, "position": position })))
}

#[derive(Debug, Deserialize)]
struct PnlHistoryQuery {
    #[serde(default = "default_timeframe")]
    #[allow(dead_code)]
    tf: String,
}

fn default_timeframe() -> String {
    "all".to_string()
}

/// Falls back to rebuilding from the journal when the in-memory 48h
/// window is empty (spec §6 `GET /api/pnl-history`) — e.g. right after a
/// restart, before the first scan has appended a fresh minute sample.
async fn pnl_history(_auth: TenantAuth, State(ctx): State<Arc<TenantContext>>, Query(_query): Query<PnlHistoryQuery>) -> Json<serde_json::Value> {
    let live: Vec<(i64, f64)> = { ctx.state.read().pnl_minutes.iter().copied().collect() };
    if !live.is_empty() {
        return Json(serde_json::json!({ "history": live }));
    }

    let pairs = crate::domain::ledger::fifo_match(&ctx.store.read_journal());
    let mut cumulative = 0.0;
    let history: Vec<(i64, f64)> = pairs
        .iter()
        .map(|p| {
            cumulative += p.pnl_pct;
            (p.sell_ts_ms, cumulative)
        })
        .collect();
    Json(serde_json::json!({ "history": history }))
}

async fn get_blacklist(_auth: TenantAuth, State(ctx): State<Arc<TenantContext>>) -> Json<serde_json::Value> {
    let (symbols, protected): (Vec<String>, Vec<String>) = {
        let state = ctx.state.read();
        (state.buy_blacklist.iter().cloned().collect(), state.protected_coins.iter().cloned().collect())
    };
    Json(serde_json::json!({ "symbols": symbols, "protected": protected }))
}

/// `mode` on `set_mode` places a symbol in exactly one of the two disjoint
/// manual lists the dashboard exposes (spec §6): `blacklist` (never
/// auto-buy, still sellable if held) or `protected` (never auto-sold or
/// swept, see [`ProtectedCoins`](crate::domain::ledger::ProtectedCoins)).
/// `none` clears a symbol out of both.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ListMode {
    Blacklist,
    Protected,
    None,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum BlacklistRequest {
    Add { symbol: String },
    Remove { symbol: String },
    SetMode { symbol: String, mode: ListMode },
}

async fn post_blacklist(
    _auth: TenantAuth,
    State(ctx): State<Arc<TenantContext>>,
    Json(req): Json<BlacklistRequest>,
) -> Json<serde_json::Value> {
    {
        let mut state = ctx.state.write();
        match &req {
            BlacklistRequest::Add { symbol } => state.buy_blacklist.add(symbol.clone()),
            BlacklistRequest::Remove { symbol } => state.buy_blacklist.remove(symbol),
            BlacklistRequest::SetMode { symbol, mode } => {
                state.buy_blacklist.remove(symbol);
                state.protected_coins.remove(symbol);
                match mode {
                    ListMode::Blacklist => state.buy_blacklist.add(symbol.clone()),
                    ListMode::Protected => state.protected_coins.add(symbol.clone()),
                    ListMode::None => {}
                }
            }
        }
    }
    let (blacklist, protected) = { let state = ctx.state.read(); (state.buy_blacklist.clone(), state.protected_coins.clone()) };
    if let Err(e) = ctx.store.write_blacklist(&blacklist) {
        tracing::error!(tenant = %ctx.config.id, error = %e, "failed to persist blacklist mutation");
    }
    if matches!(req, BlacklistRequest::SetMode { .. }) {
        if let Err(e) = ctx.store.write_protected_coins(&protected) {
            tracing::error!(tenant = %ctx.config.id, error = %e, "failed to persist protected-coins mutation");
        }
    }
    Json(serde_json::json!({ "ok": true }))
}

/// Unauthenticated by design: a Prometheus scraper hits this once per
/// tenant port and never carries the dashboard's `X-Tenant-Token`.
async fn metrics(State(ctx): State<Arc<TenantContext>>) -> String {
    let open_count = { ctx.state.read().positions.len() as i64 };
    let metrics = Metrics::global();
    metrics.set_open_positions(&ctx.config.id, open_count);
    metrics.render()
}

pub fn tenant_router(ctx: Arc<TenantContext>) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/trades", get(trades))
        .route("/api/logs", get(logs))
        .route("/api/candles/:symbol", get(candles))
        .route("/api/pnl-history", get(pnl_history))
        .route("/api/blacklist", get(get_blacklist).post(post_blacklist))
        .route("/metrics", get(metrics))
        .with_state(ctx)
}
