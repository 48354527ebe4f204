//! C11: the HTTP+WS dashboard façade. Every tenant gets its own `axum`
//! server bound to its `dashboard_port`, guarded by its
//! `X-Tenant-Token` bearer (spec §6 "Dashboard HTTP/WS"); one extra
//! admin server exposes the invite-code-gated registration endpoint so
//! a brand new tenant can join without a restart.

pub mod admin;
pub mod auth;
pub mod snapshot;
pub mod tenant_api;
pub mod ws;

pub use admin::admin_router;
pub use tenant_api::tenant_router;
pub use ws::ws_router;
