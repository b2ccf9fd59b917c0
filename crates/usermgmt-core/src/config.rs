//! Gateway configuration.
//!
//! Configuration is read from a JSON file using the historical key names (`LDAPServer`,
//! `JWTPublicRSAKey`, ...), then overridden by `UM_*` environment variables, validated, and
//! converted into the typed [`GatewayConfig`] that is shared read-only for the lifetime of the
//! process.

use crate::{Error, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use url::Url;
use validator::{Validate, ValidationError};

/// Default configuration file name, resolved relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.conf";

/// Placeholder substituted with the (escaped) user or group name in filter templates.
pub const FILTER_PLACEHOLDER: &str = "%s";

/// Default LDAP connection timeout (seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default number of login attempts admitted per client address per minute.
pub const DEFAULT_LOGIN_RATE_LIMIT: u32 = 10;

/// Raw configuration as it appears in the config file and environment.
///
/// Every field carries a default so a partial file (or none at all) still deserializes; required
/// values are enforced by [`Validate`].
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct RawConfig {
    /// Listen address, `host:port` or `:port`.
    #[serde(rename = "ServerBindAddr")]
    #[validate(length(min = 1, message = "missing required config ServerBindAddr"))]
    pub server_bind_addr: String,

    /// DN used for privileged (write) binds.
    #[serde(rename = "LDAPAdmin")]
    #[validate(length(min = 1, message = "missing required config LDAPAdmin"))]
    pub ldap_admin: String,

    /// Password for [`RawConfig::ldap_admin`].
    #[serde(rename = "LDAPPass")]
    #[validate(length(min = 1, message = "missing required config LDAPPass"))]
    pub ldap_pass: String,

    /// PEM private key used to sign tokens.
    #[serde(rename = "JWTPrivateRSAKey")]
    #[validate(length(min = 1, message = "missing required config JWTPrivateRSAKey"))]
    pub jwt_private_rsa_key: String,

    /// PEM public key used to verify tokens.
    #[serde(rename = "JWTPublicRSAKey")]
    #[validate(length(min = 1, message = "missing required config JWTPublicRSAKey"))]
    pub jwt_public_rsa_key: String,

    /// Optional TLS certificate (PEM).
    #[serde(rename = "SSLCertificate")]
    pub ssl_certificate: String,

    /// Optional TLS private key (PKCS#8 PEM).
    #[serde(rename = "SSLKeyFile")]
    pub ssl_key_file: String,

    /// Directory host name.
    #[serde(rename = "LDAPServer")]
    #[validate(length(min = 1, message = "missing required config LDAPServer"))]
    pub ldap_server: String,

    /// Directory port.
    #[serde(rename = "LDAPPort")]
    #[validate(length(min = 1, message = "missing required config LDAPPort"))]
    pub ldap_port: String,

    /// Base DN under which all entries live.
    #[serde(rename = "LDAPBaseDN")]
    #[validate(length(min = 1, message = "missing required config LDAPBaseDN"))]
    pub ldap_base_dn: String,

    /// Filter template that resolves an administrator by name.
    #[serde(rename = "LDAPAdminfilter")]
    #[validate(
        length(min = 1, message = "missing required config LDAPAdminfilter"),
        custom(function = "validate_filter_template")
    )]
    pub ldap_admin_filter: String,

    /// Filter template that resolves a user by name.
    #[serde(rename = "LDAPUserfilter")]
    #[validate(
        length(min = 1, message = "missing required config LDAPUserfilter"),
        custom(function = "validate_filter_template")
    )]
    pub ldap_user_filter: String,

    /// Filter template that resolves a group by name.
    #[serde(rename = "LDAPGroupfilter")]
    #[validate(
        length(min = 1, message = "missing required config LDAPGroupfilter"),
        custom(function = "validate_filter_template")
    )]
    pub ldap_group_filter: String,

    /// Account that can never be mutated through the API.
    #[serde(rename = "ProtectedUser")]
    #[validate(length(min = 1, message = "missing required config ProtectedUser"))]
    pub protected_user: String,

    /// Group that can never be removed through the API.
    #[serde(rename = "ProtectedGroup")]
    #[validate(length(min = 1, message = "missing required config ProtectedGroup"))]
    pub protected_group: String,

    /// Login attempts per client address per minute, `0` disables limiting.
    #[serde(rename = "LoginRateLimit")]
    pub login_rate_limit: u32,

    /// LDAP connection timeout in seconds.
    #[serde(rename = "LDAPConnectTimeout")]
    #[validate(range(min = 1, max = 300))]
    pub ldap_connect_timeout_secs: u64,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            server_bind_addr: ":8443".to_string(),
            ldap_admin: String::new(),
            ldap_pass: String::new(),
            jwt_private_rsa_key: "./keys/jwt.key".to_string(),
            jwt_public_rsa_key: "./keys/jwt.pub".to_string(),
            ssl_certificate: String::new(),
            ssl_key_file: String::new(),
            ldap_server: "localhost".to_string(),
            ldap_port: "389".to_string(),
            ldap_base_dn: String::new(),
            ldap_admin_filter: String::new(),
            ldap_user_filter: "(&(objectClass=organizationalPerson)(cn=%s))".to_string(),
            ldap_group_filter: "(&(objectClass=groupOfNames)(cn=%s))".to_string(),
            protected_user: "admin".to_string(),
            protected_group: "admins".to_string(),
            login_rate_limit: DEFAULT_LOGIN_RATE_LIMIT,
            ldap_connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

fn validate_filter_template(template: &str) -> std::result::Result<(), ValidationError> {
    if template.is_empty() || template.contains(FILTER_PLACEHOLDER) {
        Ok(())
    } else {
        let mut err = ValidationError::new("filter_placeholder");
        err.message = Some(format!("filter template `{template}` has no %s placeholder").into());
        Err(err)
    }
}

impl RawConfig {
    /// Applies `UM_*` overrides; empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides: [(&str, &mut String); 15] = [
            ("UM_SERVER_BIND_ADDR", &mut self.server_bind_addr),
            ("UM_JWT_PUB", &mut self.jwt_public_rsa_key),
            ("UM_JWT_PRIV", &mut self.jwt_private_rsa_key),
            ("UM_TLS_CERT", &mut self.ssl_certificate),
            ("UM_TLS_KEY", &mut self.ssl_key_file),
            ("UM_LDAP_ADMIN", &mut self.ldap_admin),
            ("UM_LDAP_PASS", &mut self.ldap_pass),
            ("UM_LDAP_BASE_DN", &mut self.ldap_base_dn),
            ("UM_LDAP_SERVER", &mut self.ldap_server),
            ("UM_LDAP_PORT", &mut self.ldap_port),
            ("UM_LDAP_ADMINFILTER", &mut self.ldap_admin_filter),
            ("UM_LDAP_USERFILTER", &mut self.ldap_user_filter),
            ("UM_LDAP_GROUPFILTER", &mut self.ldap_group_filter),
            ("UM_PROTECTED_USER", &mut self.protected_user),
            ("UM_PROTECTED_GROUP", &mut self.protected_group),
        ];

        for (key, slot) in overrides {
            if let Some(value) = lookup(key).filter(|value| !value.is_empty()) {
                *slot = value;
            }
        }

        if let Some(value) = lookup("UM_LOGIN_RATE_LIMIT") {
            match value.parse() {
                Ok(limit) => self.login_rate_limit = limit,
                Err(_) => warn!("ignoring non-numeric UM_LOGIN_RATE_LIMIT `{value}`"),
            }
        }
    }
}

/// TLS material for the HTTP listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
    /// PEM certificate chain.
    pub certificate: PathBuf,
    /// PKCS#8 PEM private key.
    pub private_key: PathBuf,
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Socket address to bind.
    pub bind_addr: SocketAddr,
    /// TLS material, when the listener terminates TLS itself.
    pub tls: Option<TlsSettings>,
    /// Login attempts per client address per minute, `0` disables limiting.
    pub login_rate_limit: u32,
}

/// Directory connection settings.
#[derive(Clone)]
pub struct DirectorySettings {
    /// `ldap://host:port` endpoint.
    pub url: String,
    /// Base DN for searches and new entries.
    pub base_dn: String,
    /// DN used for privileged binds.
    pub admin_dn: String,
    /// Password used for privileged binds.
    pub admin_password: SecretString,
    /// Filter template resolving administrators.
    pub admin_filter: String,
    /// Filter template resolving users.
    pub user_filter: String,
    /// Filter template resolving groups.
    pub group_filter: String,
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl DirectorySettings {
    /// Returns the connection timeout as a Duration.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl fmt::Debug for DirectorySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectorySettings")
            .field("url", &self.url)
            .field("base_dn", &self.base_dn)
            .field("admin_dn", &self.admin_dn)
            .field("admin_password", &"[REDACTED]")
            .field("admin_filter", &self.admin_filter)
            .field("user_filter", &self.user_filter)
            .field("group_filter", &self.group_filter)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Locations of the token signing key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPaths {
    /// PEM private key.
    pub private_key: PathBuf,
    /// PEM public key.
    pub public_key: PathBuf,
}

/// Names that can never be targeted by mutation endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedNames {
    /// Protected account name.
    pub user: String,
    /// Protected group name.
    pub group: String,
}

impl ProtectedNames {
    /// Returns true if `username` names the protected account.
    ///
    /// Directory `cn` matching ignores case, so this does too; surrounding whitespace is ignored.
    #[must_use]
    pub fn is_protected_user(&self, username: &str) -> bool {
        same_name(&self.user, username)
    }

    /// Returns true if `group` names the protected group.
    #[must_use]
    pub fn is_protected_group(&self, group: &str) -> bool {
        same_name(&self.group, group)
    }
}

fn same_name(protected: &str, candidate: &str) -> bool {
    protected.trim().eq_ignore_ascii_case(candidate.trim())
}

/// Validated, process-wide gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// HTTP listener settings.
    pub server: ServerSettings,
    /// Directory connection settings.
    pub directory: DirectorySettings,
    /// Token key pair locations.
    pub keys: KeyPaths,
    /// Protected account and group.
    pub protected: ProtectedNames,
}

impl GatewayConfig {
    /// Loads configuration from `path` and the process environment.
    ///
    /// An unreadable or malformed file is logged and ignored so that deployments configured purely
    /// through the environment keep working.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] when a required value is missing or malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => Some(contents),
            Err(err) => {
                warn!(
                    "couldn't read config file {}: {err}, falling back to defaults + environment variables",
                    path.display()
                );
                None
            }
        };

        Self::from_sources(contents.as_deref(), |key| std::env::var(key).ok())
    }

    /// Builds configuration from file contents and an environment lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] when a required value is missing or malformed.
    pub fn from_sources<F>(file_contents: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut raw = match file_contents {
            Some(contents) => serde_json::from_str::<RawConfig>(contents).unwrap_or_else(|err| {
                warn!("couldn't parse config file: {err}, falling back to defaults + environment variables");
                RawConfig::default()
            }),
            None => RawConfig::default(),
        };
        raw.apply_env(env);
        Self::try_from(raw)
    }
}

impl TryFrom<RawConfig> for GatewayConfig {
    type Error = Error;

    fn try_from(raw: RawConfig) -> Result<Self> {
        raw.validate()
            .map_err(|err| Error::ConfigError(format!("Invalid configuration: {err}")))?;

        let bind_addr = parse_bind_addr(&raw.server_bind_addr)?;

        let port: u16 = raw.ldap_port.parse().map_err(|_| {
            Error::ConfigError(format!("LDAPPort `{}` is not a valid port", raw.ldap_port))
        })?;
        let url = Url::parse(&format!("ldap://{}:{port}", raw.ldap_server))?;

        let tls = match (raw.ssl_certificate.is_empty(), raw.ssl_key_file.is_empty()) {
            (true, true) => None,
            (false, false) => Some(TlsSettings {
                certificate: PathBuf::from(raw.ssl_certificate),
                private_key: PathBuf::from(raw.ssl_key_file),
            }),
            _ => {
                return Err(Error::ConfigError(
                    "SSLCertificate and SSLKeyFile must be set together".to_string(),
                ))
            }
        };

        Ok(Self {
            server: ServerSettings {
                bind_addr,
                tls,
                login_rate_limit: raw.login_rate_limit,
            },
            directory: DirectorySettings {
                url: url.to_string().trim_end_matches('/').to_string(),
                base_dn: raw.ldap_base_dn,
                admin_dn: raw.ldap_admin,
                admin_password: SecretString::from(raw.ldap_pass),
                admin_filter: raw.ldap_admin_filter,
                user_filter: raw.ldap_user_filter,
                group_filter: raw.ldap_group_filter,
                connect_timeout_secs: raw.ldap_connect_timeout_secs,
            },
            keys: KeyPaths {
                private_key: PathBuf::from(raw.jwt_private_rsa_key),
                public_key: PathBuf::from(raw.jwt_public_rsa_key),
            },
            protected: ProtectedNames {
                user: raw.protected_user,
                group: raw.protected_group,
            },
        })
    }
}

fn parse_bind_addr(value: &str) -> Result<SocketAddr> {
    let candidate = if value.starts_with(':') {
        format!("0.0.0.0{value}")
    } else {
        value.to_string()
    };
    candidate
        .parse()
        .map_err(|_| Error::ConfigError(format!("ServerBindAddr `{value}` is not a socket address")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const FILE: &str = r#"{
        "LDAPAdmin": "cn=admin,dc=example,dc=com",
        "LDAPPass": "secret",
        "LDAPBaseDN": "dc=example,dc=com",
        "LDAPAdminfilter": "(&(objectClass=person)(memberOf=cn=admins,dc=example,dc=com)(cn=%s))"
    }"#;

    #[test]
    fn test_file_with_defaults() {
        let config = GatewayConfig::from_sources(Some(FILE), env_from(&[])).unwrap();
        assert_eq!(config.server.bind_addr, "0.0.0.0:8443".parse().unwrap());
        assert!(config.server.tls.is_none());
        assert_eq!(config.directory.url, "ldap://localhost:389");
        assert_eq!(config.directory.base_dn, "dc=example,dc=com");
        assert_eq!(
            config.directory.user_filter,
            "(&(objectClass=organizationalPerson)(cn=%s))"
        );
        assert_eq!(config.directory.admin_password.expose_secret(), "secret");
        assert_eq!(config.keys.public_key, PathBuf::from("./keys/jwt.pub"));
        assert!(config.protected.is_protected_user("admin"));
        assert!(config.protected.is_protected_group("admins"));
        assert_eq!(config.server.login_rate_limit, DEFAULT_LOGIN_RATE_LIMIT);
    }

    #[test]
    fn test_environment_overrides_file() {
        let env = env_from(&[
            ("UM_LDAP_SERVER", "ldap.internal"),
            ("UM_LDAP_PORT", "1389"),
            ("UM_SERVER_BIND_ADDR", "127.0.0.1:9000"),
            ("UM_LDAP_PASS", ""),
            ("UM_LOGIN_RATE_LIMIT", "0"),
        ]);
        let config = GatewayConfig::from_sources(Some(FILE), env).unwrap();
        assert_eq!(config.directory.url, "ldap://ldap.internal:1389");
        assert_eq!(config.server.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.directory.admin_password.expose_secret(), "secret");
        assert_eq!(config.server.login_rate_limit, 0);
    }

    #[test]
    fn test_environment_only() {
        let env = env_from(&[
            ("UM_LDAP_ADMIN", "cn=admin,dc=example,dc=com"),
            ("UM_LDAP_PASS", "secret"),
            ("UM_LDAP_BASE_DN", "dc=example,dc=com"),
            ("UM_LDAP_ADMINFILTER", "(cn=%s)"),
        ]);
        let config = GatewayConfig::from_sources(None, env).unwrap();
        assert_eq!(config.directory.admin_filter, "(cn=%s)");
    }

    #[test]
    fn test_malformed_file_falls_back_to_environment() {
        let env = env_from(&[
            ("UM_LDAP_ADMIN", "cn=admin,dc=example,dc=com"),
            ("UM_LDAP_PASS", "secret"),
            ("UM_LDAP_BASE_DN", "dc=example,dc=com"),
            ("UM_LDAP_ADMINFILTER", "(cn=%s)"),
        ]);
        assert!(GatewayConfig::from_sources(Some("{not json"), env).is_ok());
    }

    #[test]
    fn test_missing_required_field_is_fatal() {
        let err = GatewayConfig::from_sources(None, env_from(&[])).unwrap_err();
        match err {
            Error::ConfigError(message) => assert!(message.contains("LDAPAdmin")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_filter_without_placeholder_rejected() {
        let env = env_from(&[("UM_LDAP_USERFILTER", "(objectClass=person)")]);
        let err = GatewayConfig::from_sources(Some(FILE), env).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_invalid_port_rejected() {
        let env = env_from(&[("UM_LDAP_PORT", "ldap")]);
        assert!(GatewayConfig::from_sources(Some(FILE), env).is_err());
    }

    #[test]
    fn test_tls_requires_both_files() {
        let env = env_from(&[("UM_TLS_CERT", "/etc/um/cert.pem")]);
        assert!(GatewayConfig::from_sources(Some(FILE), env).is_err());

        let env = env_from(&[
            ("UM_TLS_CERT", "/etc/um/cert.pem"),
            ("UM_TLS_KEY", "/etc/um/key.pem"),
        ]);
        let config = GatewayConfig::from_sources(Some(FILE), env).unwrap();
        assert_eq!(
            config.server.tls,
            Some(TlsSettings {
                certificate: PathBuf::from("/etc/um/cert.pem"),
                private_key: PathBuf::from("/etc/um/key.pem"),
            })
        );
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = GatewayConfig::from_sources(Some(FILE), env_from(&[])).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_protected_names_ignore_case_and_whitespace() {
        let protected = ProtectedNames {
            user: "admin".to_string(),
            group: "admins".to_string(),
        };

        for name in ["admin", "ADMIN", "Admin", " admin "] {
            assert!(protected.is_protected_user(name), "{name:?}");
        }
        for name in ["admins", "ADMINS", "Admins", "admins\t"] {
            assert!(protected.is_protected_group(name), "{name:?}");
        }
        assert!(!protected.is_protected_user("administrator"));
        assert!(!protected.is_protected_group("admin"));
    }
}
