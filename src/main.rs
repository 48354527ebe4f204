//! Process entry point: boots every configured tenant under one
//! [`Supervisor`], then serves the admin registration route and every
//! tenant's own dashboard router concurrently until a shutdown signal
//! arrives (spec §4.9).

use std::sync::Arc;

use tower_http::cors::CorsLayer;

use kimchi_engine::application::supervisor::Supervisor;
use kimchi_engine::infrastructure::config::GlobalConfig;
use kimchi_engine::interfaces::{admin_router, tenant_router, ws_router};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let global = GlobalConfig::from_env();
    let supervisor = Arc::new(Supervisor::new(&global));
    supervisor.boot().await;

    let admin_port: u16 = std::env::var("ADMIN_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(3700);
    let admin_app = admin_router(supervisor.clone(), global.invite_code.clone()).layer(CorsLayer::permissive());
    let admin_listener = match tokio::net::TcpListener::bind(("0.0.0.0", admin_port)).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(port = admin_port, error = %e, "failed to bind admin listener");
            return;
        }
    };
    let admin_server = tokio::spawn(async move {
        if let Err(e) = axum::serve(admin_listener, admin_app).await {
            tracing::error!(error = %e, "admin server exited");
        }
    });

    let mut tenant_servers = Vec::new();
    for ctx in supervisor.all() {
        let port = ctx.config.dashboard_port;
        let app = tenant_router(ctx.clone()).merge(ws_router(ctx.clone())).layer(CorsLayer::permissive());
        match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => {
                tenant_servers.push(tokio::spawn(async move {
                    if let Err(e) = axum::serve(listener, app).await {
                        tracing::error!(error = %e, "tenant dashboard server exited");
                    }
                }));
            }
            Err(e) => tracing::error!(tenant = %ctx.config.id, port, error = %e, "failed to bind tenant dashboard listener"),
        }
    }

    tokio::signal::ctrl_c().await.ok();
    tracing::info!("shutdown signal received, liquidating and stopping all tenants");
    supervisor.shutdown().await;

    admin_server.abort();
    for handle in tenant_servers {
        handle.abort();
    }
}
