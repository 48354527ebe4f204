//! The process-wide admin surface (spec §6 "Hot registration"): a single
//! `POST /api/register` route gated by an invite code, independent of any
//! one tenant's dashboard token. Mounted once, on its own port, alongside
//! every tenant's individual router.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::supervisor::Supervisor;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub invite_code: String,
    pub id: String,
    pub nickname: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_true")]
    pub paper_trade: bool,
    #[serde(default = "default_paper_balance")]
    pub paper_balance: Decimal,
}

fn default_true() -> bool {
    true
}

fn default_paper_balance() -> Decimal {
    Decimal::new(1_000_000, 0)
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub id: String,
    pub dashboard_port: u16,
    pub dashboard_token: String,
}

#[derive(Clone)]
pub struct AdminState {
    pub supervisor: Arc<Supervisor>,
    pub invite_code: Option<String>,
}

async fn register(State(state): State<AdminState>, Json(req): Json<RegisterRequest>) -> Result<Json<RegisterResponse>, (StatusCode, Json<serde_json::Value>)> {
    let expected = state.invite_code.as_deref().unwrap_or_default();
    if expected.is_empty() || req.invite_code != expected {
        return Err((StatusCode::FORBIDDEN, Json(serde_json::json!({ "error": "invalid invite code" }))));
    }

    let config = state
        .supervisor
        .register_tenant(req.id, req.nickname, req.access_key, req.secret_key, req.paper_trade, req.paper_balance)
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": e.to_string() }))))?;

    Ok(Json(RegisterResponse { id: config.id, dashboard_port: config.dashboard_port, dashboard_token: config.dashboard_token }))
}

pub fn admin_router(supervisor: Arc<Supervisor>, invite_code: Option<String>) -> Router {
    Router::new().route("/api/register", post(register)).with_state(AdminState { supervisor, invite_code })
}
