//! Request middleware: token guard, login rate limiting and request IDs.

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::require_token;
pub use rate_limit::{LoginRateLimitLayer, LoginRateLimiter};
pub use request_id::{assign_request_id, RequestId, REQUEST_ID_HEADER};
