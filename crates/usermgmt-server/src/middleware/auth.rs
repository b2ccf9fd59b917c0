//! Bearer token guard for every route except login and health.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;
use usermgmt_core::Error;

use crate::{error::ApiResult, state::AppState};

/// Rejects the request with 401 unless it carries a valid token.
///
/// # Errors
///
/// Returns [`Error::TokenInvalid`] for a missing, malformed, expired or wrongly signed token.
pub async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| Error::TokenInvalid("missing authorization token".to_string()))?;

    if let Err(err) = state.tokens.validate_token(token) {
        warn!(path = %request.uri().path(), "rejected token: {err}");
        return Err(err.into());
    }

    Ok(next.run(request).await)
}

/// Extracts the token from `Authorization: Bearer <token>` or a bare `Authorization: <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ => value,
    };
    (!token.is_empty()).then_some(token)
}
