//! Admin access-token middleware.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use obscura_core::AppError;
use subtle::ConstantTimeEq;

use crate::error::HttpAppError;

/// Header carrying the admin secret.
pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";

#[derive(Clone)]
pub struct AuthState {
    pub access_token: String,
}

/// Constant-time equality so the comparison leaks nothing about the secret.
fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Gate for the `/admin` routes: the request must present the configured
/// access token or it is turned away with a 403.
pub async fn require_access_token(
    State(auth): State<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(ACCESS_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if !secure_compare(presented, &auth.access_token) {
        return HttpAppError(AppError::Unauthorized).into_response();
    }

    next.run(request).await
}
