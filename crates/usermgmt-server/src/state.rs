//! Shared handler state.

use std::sync::Arc;
use usermgmt_auth::{CredentialVerifier, TokenService};
use usermgmt_core::config::ProtectedNames;
use usermgmt_directory::DirectoryClient;

/// Process-wide state injected into every handler.
///
/// Everything here is initialised once at startup and read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    /// Directory adapter.
    pub directory: Arc<DirectoryClient>,
    /// Token issuance and validation.
    pub tokens: Arc<TokenService>,
    /// Administrator credential checks.
    pub credentials: Arc<CredentialVerifier>,
    /// Names that mutation endpoints refuse to touch.
    pub protected: Arc<ProtectedNames>,
}

impl AppState {
    /// Wires the state together from its parts.
    #[must_use]
    pub fn new(directory: DirectoryClient, tokens: TokenService, protected: ProtectedNames) -> Self {
        let directory = Arc::new(directory);
        Self {
            credentials: Arc::new(CredentialVerifier::new(directory.clone())),
            directory,
            tokens: Arc::new(tokens),
            protected: Arc::new(protected),
        }
    }
}
