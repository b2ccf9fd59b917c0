//! Administrator credential verification.

use std::sync::Arc;
use tracing::{debug, instrument};
use usermgmt_core::Result;
use usermgmt_directory::DirectoryClient;

/// Checks administrator credentials against the directory.
pub struct CredentialVerifier {
    directory: Arc<DirectoryClient>,
}

impl CredentialVerifier {
    /// Creates a verifier backed by `directory`.
    #[must_use]
    pub fn new(directory: Arc<DirectoryClient>) -> Self {
        Self { directory }
    }

    /// Returns true only if `username` resolves to exactly one entry through the administrator
    /// filter and a bind with `password` as that entry succeeds.
    ///
    /// Unknown, ambiguous, wrong password and transport failures all yield `false`.
    #[instrument(skip(self, password))]
    pub async fn authenticate_admin(&self, username: &str, password: &str) -> bool {
        match self.try_authenticate(username, password).await {
            Ok(()) => true,
            Err(err) => {
                debug!("administrator authentication failed: {err}");
                false
            }
        }
    }

    async fn try_authenticate(&self, username: &str, password: &str) -> Result<()> {
        let filter = self.directory.config().admin_filter();
        let dn = self.directory.resolve_dn(filter, username).await?;
        self.directory.verify_credentials(&dn, password).await
    }
}
