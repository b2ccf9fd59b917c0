//! HTTP gateway for administering directory users and groups.
//!
//! Administrators log in against the directory at `POST /api/login` and receive a short-lived
//! RS256 token. Every other route under `/api/users` and `/api/groups` requires that token and
//! translates the request into directory operations.
//!
//! # Example
//!
//! ```no_run
//! use usermgmt_server::{build_router, AppState};
//! # fn example(state: AppState) {
//! let app = build_router(state, 10);
//! # let _ = app;
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use handlers::{auth, groups, users};
use middleware::{assign_request_id, require_token, LoginRateLimitLayer};

/// Builds the gateway router.
///
/// `login_rate_limit` is the number of login attempts admitted per client address per minute;
/// zero disables limiting.
pub fn build_router(state: AppState, login_rate_limit: u32) -> Router {
    let protected = Router::new()
        .route("/api/users/add", post(users::add_user))
        .route("/api/users/remove", post(users::remove_user))
        .route("/api/users/changePassword", post(users::change_password))
        .route("/api/users/addToGroup", post(users::add_to_group))
        .route("/api/users/removeFromGroup", post(users::remove_from_group))
        .route("/api/users/list", get(users::list_users))
        .route("/api/groups/add", post(groups::add_group))
        .route("/api/groups/remove", post(groups::remove_group))
        .route("/api/groups/list", get(groups::list_groups))
        .route_layer(from_fn_with_state(state.clone(), require_token));

    let login = Router::new()
        .route("/api/login", post(auth::login))
        .layer(LoginRateLimitLayer::new(login_rate_limit));

    Router::new()
        .route("/api/health", get(auth::health))
        .merge(login)
        .merge(protected)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn(assign_request_id)),
        )
}
