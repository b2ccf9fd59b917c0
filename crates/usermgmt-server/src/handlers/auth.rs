//! Login and health endpoints.

use axum::extract::State;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use usermgmt_core::Error;
use validator::Validate;

use crate::{error::ApiResult, extract::Payload, state::AppState};

/// `POST /api/login` body.
#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    /// Administrator name.
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    /// Administrator password.
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Authenticates an administrator and returns a bearer token as `text/plain`.
///
/// # Errors
///
/// Returns [`Error::AuthenticationFailed`] (403) for any rejected login.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    Payload(request): Payload<LoginRequest>,
) -> ApiResult<String> {
    if !state
        .credentials
        .authenticate_admin(&request.username, &request.password)
        .await
    {
        warn!(username = %request.username, "rejected login");
        return Err(Error::AuthenticationFailed.into());
    }

    let token = state.tokens.issue_token()?;
    info!(username = %request.username, "issued token");
    Ok(token)
}

/// Liveness probe.
pub async fn health() -> &'static str {
    "ok"
}
