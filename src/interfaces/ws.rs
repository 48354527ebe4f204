//! The dashboard's live feed (spec §6 WebSocket channel): a single socket
//! per browser tab that receives `status`/`log`/`trade_event` pushes and
//! accepts a small inbound command set. Token auth arrives as a query
//! parameter rather than a header, since the browser's WS client can't
//! set custom headers on the upgrade request.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::application::context::TenantContext;

use super::auth::validate_token;
use super::snapshot::build_snapshot;

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    #[serde(default)]
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum InboundCommand {
    RunLearning,
    RunBacktest { #[serde(default)] symbols: Vec<String> },
}

pub async fn ws_handler(ws: WebSocketUpgrade, Query(query): Query<WsAuthQuery>, State(ctx): State<Arc<TenantContext>>) -> Response {
    if !validate_token(&query.token, &ctx.config.dashboard_token) {
        return (axum::http::StatusCode::FORBIDDEN, "missing or invalid token").into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, ctx))
}

async fn handle_socket(mut socket: WebSocket, ctx: Arc<TenantContext>) {
    let mut trade_rx = ctx.trade_events.subscribe();
    let mut status_tick = tokio::time::interval(Duration::from_secs(3));

    loop {
        tokio::select! {
            _ = status_tick.tick() => {
                let snapshot = build_snapshot(&ctx).await;
                let payload = serde_json::json!({ "type": "status", "data": snapshot });
                if send_json(&mut socket, &payload).await.is_err() {
                    break;
                }
                let logs: Vec<_> = {
                    let state = ctx.state.read();
                    state.log_ring.iter().rev().take(5).map(|e| serde_json::json!({
                        "ts_ms": e.ts_ms, "level": e.level, "message": e.message,
                    })).collect()
                };
                if !logs.is_empty() {
                    let payload = serde_json::json!({ "type": "log", "data": logs });
                    if send_json(&mut socket, &payload).await.is_err() {
                        break;
                    }
                }
            }
            trade = trade_rx.recv() => {
                match trade {
                    Ok(event) => {
                        let payload = serde_json::json!({ "type": "trade_event", "data": {
                            "ts_ms": event.ts_ms,
                            "symbol": event.symbol,
                            "side": event.side,
                            "price": event.price,
                            "quantity": event.quantity,
                            "pnl_pct": event.pnl_pct,
                            "pnl_amount": event.pnl_amount,
                            "reason": event.reason,
                        }});
                        if send_json(&mut socket, &payload).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => handle_inbound(&ctx, &text).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }
}

async fn send_json(socket: &mut WebSocket, value: &serde_json::Value) -> Result<(), axum::Error> {
    socket.send(Message::Text(value.to_string())).await
}

/// `run_learning`/`run_backtest` both describe out-of-scope external
/// batch jobs per spec §1 — acknowledged here rather than dispatched, so
/// a connected dashboard doesn't silently swallow the command.
async fn handle_inbound(ctx: &Arc<TenantContext>, text: &str) {
    let Ok(command) = serde_json::from_str::<InboundCommand>(text) else {
        return;
    };
    match command {
        InboundCommand::RunLearning => {
            ctx.log("INFO", crate::application::now_ms(), "learning_status: run_learning acknowledged, dispatch to the `learn` binary out of band");
        }
        InboundCommand::RunBacktest { symbols } => {
            ctx.log("INFO", crate::application::now_ms(), format!("backtest_status: run_backtest acknowledged for {} symbol(s)", symbols.len()));
        }
    }
}

pub fn ws_router(ctx: Arc<TenantContext>) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(ctx)
}
