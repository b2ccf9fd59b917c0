//! HTTP rendering of gateway errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, error};
use usermgmt_core::Error;

/// Handler error: a core [`Error`] rendered as a JSON error body.
///
/// The rendered response carries the original error in its extensions so the request ID
/// middleware can re-render the body with the request ID attached.
#[derive(Debug)]
pub struct ApiError(pub Error);

/// Result type returned by handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        if err.should_log() {
            error!(code = err.error_code(), "{err}");
        } else {
            debug!(code = err.error_code(), "{err}");
        }

        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(err.clone().into_error_response())).into_response();
        response.extensions_mut().insert(err);
        response
    }
}
