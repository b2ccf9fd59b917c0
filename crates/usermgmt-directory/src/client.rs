//! LDAP directory client.

use crate::{config::DirectoryConfig, dn::DistinguishedName, filter::DirectoryFilter, Result};
use async_trait::async_trait;
use ldap3::{DerefAliases, LdapConnAsync, LdapConnSettings, Mod, Scope, SearchEntry, SearchOptions};
use secrecy::ExposeSecret;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use usermgmt_core::error::Error;

/// Attribute list requesting no attributes (RFC 4511 `1.1`).
pub const NO_ATTRIBUTES: &str = "1.1";

/// LDAP result code `noSuchObject`.
pub const RESULT_NO_SUCH_OBJECT: u32 = 32;
/// LDAP result code `invalidCredentials`.
pub const RESULT_INVALID_CREDENTIALS: u32 = 49;
/// LDAP result code `entryAlreadyExists`.
pub const RESULT_ENTRY_ALREADY_EXISTS: u32 = 68;

/// LDAP entry representation used by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapEntry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attribute map, keyed by the attribute names the server returned.
    pub attributes: HashMap<String, Vec<String>>,
}

impl LdapEntry {
    /// Returns the first value of the attribute if present.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.values(attribute)
            .and_then(|values| values.first().map(String::as_str))
    }

    /// Returns all values for the attribute; names are matched case-insensitively.
    #[must_use]
    pub fn values(&self, attribute: &str) -> Option<&[String]> {
        self.attributes
            .get(attribute)
            .or_else(|| {
                self.attributes
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
                    .map(|(_, values)| values)
            })
            .map(Vec::as_slice)
    }
}

/// Modification of a single attribute's values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryModification {
    /// Add attribute values.
    Add {
        /// Attribute to modify.
        attribute: String,
        /// Values to add.
        values: Vec<String>,
    },
    /// Delete attribute values.
    Delete {
        /// Attribute to modify.
        attribute: String,
        /// Values to delete (empty removes attribute).
        values: Vec<String>,
    },
    /// Replace attribute values.
    Replace {
        /// Attribute to modify.
        attribute: String,
        /// Replacement values.
        values: Vec<String>,
    },
}

impl DirectoryModification {
    /// Adds `member` to a group.
    #[must_use]
    pub fn add_member(member: &DistinguishedName) -> Self {
        Self::Add {
            attribute: "member".to_string(),
            values: vec![member.to_string()],
        }
    }

    /// Removes `member` from a group.
    #[must_use]
    pub fn remove_member(member: &DistinguishedName) -> Self {
        Self::Delete {
            attribute: "member".to_string(),
            values: vec![member.to_string()],
        }
    }

    /// Replaces `userPassword` with an already hashed value.
    #[must_use]
    pub fn replace_password(hashed: impl Into<String>) -> Self {
        Self::Replace {
            attribute: "userPassword".to_string(),
            values: vec![hashed.into()],
        }
    }

    fn attribute(&self) -> &str {
        match self {
            Self::Add { attribute, .. }
            | Self::Delete { attribute, .. }
            | Self::Replace { attribute, .. } => attribute,
        }
    }
}

/// A single connection to the directory.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LdapSession: Send {
    /// Simple bind; empty DN and password bind anonymously.
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()>;
    /// Subtree search under `base_dn`.
    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&'static str],
    ) -> Result<Vec<LdapEntry>>;
    /// Creates an entry.
    async fn add(&mut self, dn: &str, attributes: &[(String, Vec<String>)]) -> Result<()>;
    /// Applies modifications to an entry.
    async fn modify(&mut self, dn: &str, modifications: &[DirectoryModification]) -> Result<()>;
    /// Deletes an entry.
    async fn delete(&mut self, dn: &str) -> Result<()>;
    /// Closes the connection.
    async fn unbind(&mut self) -> Result<()>;
}

/// Opens directory connections.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LdapConnector: Send + Sync {
    /// Opens a new, unbound session.
    async fn connect(&self) -> Result<Box<dyn LdapSession>>;
}

/// Directory client with pluggable LDAP backend.
///
/// Every operation opens its own connection, binds anonymously for reads or as the configured
/// administrator for writes, and unbinds before returning.
pub struct DirectoryClient {
    config: Arc<DirectoryConfig>,
    connector: Box<dyn LdapConnector>,
}

impl DirectoryClient {
    /// Creates a client that uses the real LDAP connector.
    #[must_use]
    pub fn new(config: DirectoryConfig) -> Self {
        let config = Arc::new(config);
        let connector: Box<dyn LdapConnector> = Box::new(RealLdapConnector::new(config.clone()));
        Self { config, connector }
    }

    /// Creates a client over a custom connector, e.g. an in-memory directory.
    #[must_use]
    pub fn with_connector(config: DirectoryConfig, connector: Box<dyn LdapConnector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
        }
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Resolves `value` through `filter` to exactly one DN.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when nothing matches, [`Error::Ambiguous`] when more than one
    /// entry matches, or [`Error::DirectoryError`] on transport failures.
    pub async fn resolve_dn(&self, filter: &DirectoryFilter, value: &str) -> Result<DistinguishedName> {
        let rendered = filter.render(value);
        let mut entries = self.search(&rendered, &[NO_ATTRIBUTES]).await?;

        match entries.len() {
            0 => Err(Error::NotFound(format!("no entry matches `{value}`"))),
            1 => {
                let entry = entries.remove(0);
                Ok(DistinguishedName::parse(&entry.dn).map_err(|err| {
                    Error::directory(format!("server returned unparseable DN `{}`: {err}", entry.dn))
                })?)
            }
            count => Err(Error::Ambiguous(format!(
                "{count} entries match `{value}`"
            ))),
        }
    }

    /// Subtree search under the base DN; aliases are never dereferenced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DirectoryError`] on transport or protocol failures.
    pub async fn search(&self, filter: &str, attributes: &[&'static str]) -> Result<Vec<LdapEntry>> {
        let mut session = self.anonymous_session().await?;
        let base_dn = self.config.base_dn().to_string();
        let result = session.search(&base_dn, filter, attributes).await;
        debug!(
            filter,
            entries = result.as_ref().map_or(0, Vec::len),
            "directory search"
        );
        close(session, result).await
    }

    /// Creates an entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if the entry already exists.
    pub async fn add_entry(
        &self,
        dn: &DistinguishedName,
        attributes: &[(String, Vec<String>)],
    ) -> Result<()> {
        let mut session = self.privileged_session().await?;
        let result = session.add(&dn.to_string(), attributes).await;
        debug!(dn = %dn, ok = result.is_ok(), "directory add");
        close(session, result).await
    }

    /// Applies a single attribute modification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the entry does not exist.
    pub async fn modify_entry(
        &self,
        dn: &DistinguishedName,
        modification: DirectoryModification,
    ) -> Result<()> {
        let mut session = self.privileged_session().await?;
        let attribute = modification.attribute().to_string();
        let result = session.modify(&dn.to_string(), &[modification]).await;
        debug!(dn = %dn, attribute = %attribute, ok = result.is_ok(), "directory modify");
        close(session, result).await
    }

    /// Deletes an entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the entry does not exist.
    pub async fn delete_entry(&self, dn: &DistinguishedName) -> Result<()> {
        let mut session = self.privileged_session().await?;
        let result = session.delete(&dn.to_string()).await;
        debug!(dn = %dn, ok = result.is_ok(), "directory delete");
        close(session, result).await
    }

    /// Binds as `dn` with `password` to check the credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthenticationFailed`] when the directory rejects the bind. An empty
    /// password is rejected without contacting the directory, since servers treat it as an
    /// unauthenticated bind that always succeeds.
    pub async fn verify_credentials(&self, dn: &DistinguishedName, password: &str) -> Result<()> {
        if password.is_empty() {
            return Err(Error::AuthenticationFailed);
        }
        let mut session = self.connector.connect().await?;
        let result = session.simple_bind(&dn.to_string(), password).await;
        close(session, result).await
    }

    async fn anonymous_session(&self) -> Result<Box<dyn LdapSession>> {
        let mut session = self.connector.connect().await?;
        session.simple_bind("", "").await?;
        Ok(session)
    }

    async fn privileged_session(&self) -> Result<Box<dyn LdapSession>> {
        let mut session = self.connector.connect().await?;
        session
            .simple_bind(
                self.config.admin_dn(),
                self.config.admin_password().expose_secret(),
            )
            .await
            .map_err(|err| match err {
                Error::AuthenticationFailed => {
                    Error::directory("directory rejected the administrator bind")
                }
                other => other,
            })?;
        Ok(session)
    }
}

async fn close<T>(mut session: Box<dyn LdapSession>, result: Result<T>) -> Result<T> {
    if let Err(err) = session.unbind().await {
        debug!("unbind failed: {err}");
    }
    result
}

/// Real LDAP connector backed by `ldap3`.
pub struct RealLdapConnector {
    config: Arc<DirectoryConfig>,
}

impl RealLdapConnector {
    /// Creates a new connector instance.
    #[must_use]
    pub fn new(config: Arc<DirectoryConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl LdapConnector for RealLdapConnector {
    async fn connect(&self) -> Result<Box<dyn LdapSession>> {
        let settings = LdapConnSettings::new().set_conn_timeout(self.config.connect_timeout());
        let (conn, ldap) = LdapConnAsync::with_settings(settings, self.config.url())
            .await
            .map_err(map_ldap_error)?;
        ldap3::drive!(conn);
        Ok(Box::new(RealLdapSession { inner: ldap }))
    }
}

struct RealLdapSession {
    inner: ldap3::Ldap,
}

#[async_trait]
impl LdapSession for RealLdapSession {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()> {
        let result = self
            .inner
            .simple_bind(dn, password)
            .await
            .map_err(map_ldap_error)?;
        ensure_success(result)
    }

    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&'static str],
    ) -> Result<Vec<LdapEntry>> {
        let result = self
            .inner
            .with_search_options(SearchOptions::new().deref(DerefAliases::Never))
            .search(base_dn, Scope::Subtree, filter, attributes.to_vec())
            .await
            .map_err(map_ldap_error)?;
        let (entries, _) = result.success().map_err(map_ldap_error)?;
        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| LdapEntry {
                dn: entry.dn,
                attributes: entry.attrs,
            })
            .collect())
    }

    async fn add(&mut self, dn: &str, attributes: &[(String, Vec<String>)]) -> Result<()> {
        let attrs = attributes
            .iter()
            .map(|(name, values)| (name.clone(), values.iter().cloned().collect::<HashSet<_>>()))
            .collect::<Vec<_>>();
        let result = self.inner.add(dn, attrs).await.map_err(map_ldap_error)?;
        ensure_success(result)
    }

    async fn modify(&mut self, dn: &str, modifications: &[DirectoryModification]) -> Result<()> {
        let mods = modifications
            .iter()
            .map(|modification| match modification {
                DirectoryModification::Add { attribute, values } => {
                    Mod::Add(attribute.clone(), values.iter().cloned().collect::<HashSet<_>>())
                }
                DirectoryModification::Delete { attribute, values } => {
                    Mod::Delete(attribute.clone(), values.iter().cloned().collect::<HashSet<_>>())
                }
                DirectoryModification::Replace { attribute, values } => {
                    Mod::Replace(attribute.clone(), values.iter().cloned().collect::<HashSet<_>>())
                }
            })
            .collect::<Vec<_>>();
        let result = self.inner.modify(dn, mods).await.map_err(map_ldap_error)?;
        ensure_success(result)
    }

    async fn delete(&mut self, dn: &str) -> Result<()> {
        let result = self.inner.delete(dn).await.map_err(map_ldap_error)?;
        ensure_success(result)
    }

    async fn unbind(&mut self) -> Result<()> {
        self.inner.unbind().await.map_err(map_ldap_error)
    }
}

fn ensure_success(result: ldap3::LdapResult) -> Result<()> {
    result.success().map(|_| ()).map_err(map_ldap_error)
}

fn map_ldap_error(err: ldap3::LdapError) -> Error {
    match err {
        ldap3::LdapError::LdapResult { result } => map_result_code(result.rc, &result.text),
        other => Error::directory(other.to_string()),
    }
}

/// Maps an LDAP result code to the gateway error taxonomy.
#[must_use]
pub fn map_result_code(rc: u32, text: &str) -> Error {
    match rc {
        RESULT_ENTRY_ALREADY_EXISTS => Error::Conflict(format!("entry already exists: {text}")),
        RESULT_NO_SUCH_OBJECT => Error::NotFound(format!("no such object: {text}")),
        RESULT_INVALID_CREDENTIALS => Error::AuthenticationFailed,
        code => Error::DirectoryError {
            code: Some(code),
            message: format!("LDAP result code {code}: {text}"),
        },
    }
}
