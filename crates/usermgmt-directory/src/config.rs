//! Directory client configuration.

use crate::{dn::DistinguishedName, filter::DirectoryFilter, Result};
use secrecy::SecretString;
use std::fmt;
use std::time::Duration;
use usermgmt_core::config::{DirectorySettings, DEFAULT_CONNECT_TIMEOUT_SECS};

/// Configuration for connecting to the directory.
#[derive(Clone)]
pub struct DirectoryConfig {
    url: String,
    base_dn: DistinguishedName,
    admin_dn: String,
    admin_password: SecretString,
    admin_filter: DirectoryFilter,
    user_filter: DirectoryFilter,
    group_filter: DirectoryFilter,
    connect_timeout_secs: u64,
}

impl DirectoryConfig {
    /// Creates a configuration with default filters.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_dn` is not a valid distinguished name.
    pub fn new(
        url: impl Into<String>,
        base_dn: &str,
        admin_dn: impl Into<String>,
        admin_password: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            base_dn: DistinguishedName::parse(base_dn)?,
            admin_dn: admin_dn.into(),
            admin_password: SecretString::from(admin_password.into()),
            admin_filter: DirectoryFilter::new("(&(objectClass=organizationalPerson)(cn=%s))"),
            user_filter: DirectoryFilter::new("(&(objectClass=organizationalPerson)(cn=%s))"),
            group_filter: DirectoryFilter::new("(&(objectClass=groupOfNames)(cn=%s))"),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        })
    }

    /// Builds the configuration from validated gateway settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured base DN cannot be parsed.
    pub fn from_settings(settings: &DirectorySettings) -> Result<Self> {
        let base_dn = DistinguishedName::parse(&settings.base_dn).map_err(|err| {
            usermgmt_core::Error::ConfigError(format!("LDAPBaseDN is invalid: {err}"))
        })?;

        Ok(Self {
            url: settings.url.clone(),
            base_dn,
            admin_dn: settings.admin_dn.clone(),
            admin_password: settings.admin_password.clone(),
            admin_filter: DirectoryFilter::new(settings.admin_filter.clone()),
            user_filter: DirectoryFilter::new(settings.user_filter.clone()),
            group_filter: DirectoryFilter::new(settings.group_filter.clone()),
            connect_timeout_secs: settings.connect_timeout_secs,
        })
    }

    /// Sets the administrator filter template.
    #[must_use]
    pub fn with_admin_filter(mut self, template: impl Into<String>) -> Self {
        self.admin_filter = DirectoryFilter::new(template);
        self
    }

    /// Sets the user filter template.
    #[must_use]
    pub fn with_user_filter(mut self, template: impl Into<String>) -> Self {
        self.user_filter = DirectoryFilter::new(template);
        self
    }

    /// Sets the group filter template.
    #[must_use]
    pub fn with_group_filter(mut self, template: impl Into<String>) -> Self {
        self.group_filter = DirectoryFilter::new(template);
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, seconds: u64) -> Self {
        self.connect_timeout_secs = seconds;
        self
    }

    /// Returns the `ldap://host:port` endpoint.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the base DN that searches start from and new entries are created under.
    #[must_use]
    pub const fn base_dn(&self) -> &DistinguishedName {
        &self.base_dn
    }

    /// Returns the DN used for privileged binds.
    #[must_use]
    pub fn admin_dn(&self) -> &str {
        &self.admin_dn
    }

    /// Returns the password used for privileged binds.
    #[must_use]
    pub const fn admin_password(&self) -> &SecretString {
        &self.admin_password
    }

    /// Filter resolving administrators by name.
    #[must_use]
    pub const fn admin_filter(&self) -> &DirectoryFilter {
        &self.admin_filter
    }

    /// Filter resolving users by name.
    #[must_use]
    pub const fn user_filter(&self) -> &DirectoryFilter {
        &self.user_filter
    }

    /// Filter resolving groups by name.
    #[must_use]
    pub const fn group_filter(&self) -> &DirectoryFilter {
        &self.group_filter
    }

    /// Returns the connection timeout as a Duration.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// DN of the user entry named `name`.
    #[must_use]
    pub fn user_dn(&self, name: &str) -> DistinguishedName {
        self.base_dn.child("cn", name)
    }

    /// DN of the group entry named `name`.
    #[must_use]
    pub fn group_dn(&self, name: &str) -> DistinguishedName {
        self.base_dn.child("cn", name)
    }
}

impl fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("url", &self.url)
            .field("base_dn", &self.base_dn.to_string())
            .field("admin_dn", &self.admin_dn)
            .field("admin_password", &"[REDACTED]")
            .field("admin_filter", &self.admin_filter.template())
            .field("user_filter", &self.user_filter.template())
            .field("group_filter", &self.group_filter.template())
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}
