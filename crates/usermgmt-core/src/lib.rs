//! # usermgmt-core
//!
//! Core types shared by the directory user management gateway.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy and HTTP status code mapping
//! - [`config`] - File and environment configuration with startup validation

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::GatewayConfig;
pub use error::{Error, Result};
