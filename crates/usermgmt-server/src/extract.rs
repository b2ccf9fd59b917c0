//! Request body extraction.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
    Form,
};
use serde::de::DeserializeOwned;
use usermgmt_core::Error;
use validator::Validate;

use crate::error::ApiError;

/// A validated request body, accepted as JSON or as `application/x-www-form-urlencoded`.
///
/// Bodies without a form content type are parsed as JSON. Missing or empty required fields
/// reject the request with 400 before any handler code runs.
#[derive(Debug, Clone)]
pub struct Payload<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

        let value = if is_form {
            let Form(value) = Form::<T>::from_request(request, state)
                .await
                .map_err(|rejection| Error::BadRequest(rejection.body_text()))?;
            value
        } else {
            let body = Bytes::from_request(request, state)
                .await
                .map_err(|rejection| Error::BadRequest(rejection.body_text()))?;
            serde_json::from_slice::<T>(&body).map_err(Error::from)?
        };

        value.validate().map_err(Error::from)?;
        Ok(Self(value))
    }
}
