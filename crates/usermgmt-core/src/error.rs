//! Error types for gateway operations.
//!
//! This module provides the error taxonomy shared by the directory adapter, the token service
//! and the HTTP handlers, including HTTP status code mapping and structured error responses.

use serde::Serialize;
use thiserror::Error;

/// Main error type for gateway operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed or missing request fields
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request fields present but invalid
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// No directory entry matched
    #[error("Not found: {0}")]
    NotFound(String),

    /// More than one directory entry matched
    #[error("Ambiguous: {0}")]
    Ambiguous(String),

    /// Entity already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A protected account or group was targeted
    #[error("Reserved: {0}")]
    Reserved(String),

    /// Login credentials were rejected
    #[error("Invalid credentials")]
    AuthenticationFailed,

    /// Bearer token missing, malformed, expired or signed with an unexpected algorithm
    #[error("Token invalid: {0}")]
    TokenInvalid(String),

    /// Client exceeded the login rate limit
    #[error("Too many requests: {0}")]
    RateLimited(String),

    /// Transport or protocol failure talking to the directory
    #[error("Directory error: {message}")]
    DirectoryError {
        /// LDAP result code, when the server returned one
        code: Option<u32>,
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Specialized result type for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for serialization.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
    /// Optional request ID for tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail structure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDetail {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl Error {
    /// Builds a directory error without an LDAP result code.
    #[must_use]
    pub fn directory(message: impl Into<String>) -> Self {
        Self::DirectoryError {
            code: None,
            message: message.into(),
        }
    }

    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Ambiguous(_) => "AMBIGUOUS",
            Self::Conflict(_) => "CONFLICT",
            Self::Reserved(_) => "RESERVED",
            Self::AuthenticationFailed => "AUTHENTICATION_FAILED",
            Self::TokenInvalid(_) => "TOKEN_INVALID",
            Self::RateLimited(_) => "RATE_LIMITED",
            Self::DirectoryError { .. } => "DIRECTORY_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code the error maps to.
    ///
    /// Protected-name violations answer 500, matching the deployed behaviour clients rely on.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_)
            | Self::ValidationError(_)
            | Self::NotFound(_)
            | Self::Ambiguous(_) => 400,
            Self::TokenInvalid(_) => 401,
            Self::AuthenticationFailed => 403,
            Self::Conflict(_) => 409,
            Self::RateLimited(_) => 429,
            Self::Reserved(_)
            | Self::DirectoryError { .. }
            | Self::ConfigError(_)
            | Self::InternalError(_) => 500,
        }
    }

    /// Converts the error into an `ErrorResponse`.
    #[must_use]
    pub fn into_error_response(self) -> ErrorResponse {
        self.into_error_response_with_id(None)
    }

    /// Converts the error into an `ErrorResponse` with a request ID.
    #[must_use]
    pub fn into_error_response_with_id(self, request_id: Option<String>) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
            },
            request_id,
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::InternalError(_) | Self::ConfigError(_) | Self::DirectoryError { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::ConfigError(err.to_string())
    }
}
