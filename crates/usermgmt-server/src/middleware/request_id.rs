//! Request ID assignment.

use axum::{
    body::Body,
    extract::Request,
    http::{header::CONTENT_LENGTH, HeaderValue},
    middleware::Next,
    response::Response,
};
use usermgmt_core::Error;
use uuid::Uuid;

/// Header carrying the request ID in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_CLIENT_REQUEST_ID_LEN: usize = 128;

/// Request ID, available to handlers as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Assigns every request an ID (keeping a sane client-supplied one), echoes it in the response
/// header and stamps it into JSON error bodies.
pub async fn assign_request_id(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty() && value.len() <= MAX_CLIENT_REQUEST_ID_LEN)
        .map_or_else(|| Uuid::new_v4().to_string(), str::to_owned);
    request.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(request).await;

    if let Some(err) = response.extensions_mut().remove::<Error>() {
        let body = err.into_error_response_with_id(Some(id.clone()));
        if let Ok(bytes) = serde_json::to_vec(&body) {
            response.headers_mut().remove(CONTENT_LENGTH);
            *response.body_mut() = Body::from(bytes);
        }
    }

    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
