//! Credential and token service for the user management gateway.
//!
//! [`CredentialVerifier`] decides whether a login is allowed by binding to the directory, and
//! [`TokenService`] issues and checks the short-lived RS256 bearer tokens that guard every other
//! endpoint.

#![deny(missing_docs)]

mod credentials;
mod token;

pub use credentials::CredentialVerifier;
pub use token::{TokenClaims, TokenService, TOKEN_LIFETIME_SECS};
