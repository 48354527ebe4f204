//! Bearer authentication for the per-tenant dashboard (spec §6): every
//! authenticated route requires an `X-Tenant-Token` header matching the
//! tenant's own [`TenantConfig::dashboard_token`][cfg], compared in
//! constant time so a slow string compare can't leak how many leading
//! bytes matched. Grounded in the teacher's single-admin-token
//! `AuthBearer` extractor, generalized to a per-tenant expected value.
//!
//! [cfg]: crate::domain::tenant::TenantConfig::dashboard_token

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::application::context::TenantContext;

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Extractor that validates `X-Tenant-Token`. Yields nothing beyond
/// proof of validity — handlers read the tenant's own state from the
/// `State<Arc<TenantContext>>` extractor alongside this one.
pub struct TenantAuth;

pub struct AuthRejection(StatusCode, &'static str);

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

impl FromRequestParts<Arc<TenantContext>> for TenantAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<TenantContext>) -> Result<Self, Self::Rejection> {
        let provided = parts.headers.get("X-Tenant-Token").and_then(|v| v.to_str().ok()).unwrap_or_default();
        if provided.is_empty() || !constant_time_eq(provided.as_bytes(), state.config.dashboard_token.as_bytes()) {
            return Err(AuthRejection(StatusCode::FORBIDDEN, "missing or invalid X-Tenant-Token"));
        }
        Ok(TenantAuth)
    }
}

/// Same check for the WebSocket upgrade path, where the token arrives as
/// a query parameter rather than a header.
pub fn validate_token(provided: &str, expected: &str) -> bool {
    !provided.is_empty() && constant_time_eq(provided.as_bytes(), expected.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_tokens_validate() {
        assert!(validate_token("abc", "abc"));
    }

    #[test]
    fn mismatched_tokens_reject() {
        assert!(!validate_token("abc", "xyz"));
        assert!(!validate_token("", "xyz"));
    }
}
