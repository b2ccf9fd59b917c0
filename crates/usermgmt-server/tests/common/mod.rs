//! In-memory directory and router helpers shared by the API tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Request, StatusCode},
    response::Response,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha512};
use std::collections::BTreeMap;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use tower::ServiceExt;
use usermgmt_auth::TokenService;
use usermgmt_core::{config::ProtectedNames, Result};
use usermgmt_directory::{
    hash_password, map_result_code, DirectoryClient, DirectoryConfig, DirectoryModification,
    LdapConnector, LdapEntry, LdapSession, NO_ATTRIBUTES, RESULT_ENTRY_ALREADY_EXISTS,
    RESULT_INVALID_CREDENTIALS, RESULT_NO_SUCH_OBJECT, SSHA512_PREFIX,
};
use usermgmt_server::{build_router, AppState};

pub const BASE_DN: &str = "dc=example,dc=org";
pub const MANAGER_DN: &str = "cn=manager,dc=example,dc=org";
pub const MANAGER_PASSWORD: &str = "manager-secret";
pub const ADMIN_PASSWORD: &str = "admin-secret";
pub const ADMIN_FILTER: &str = "(&(objectClass=organizationalPerson)(employeeType=admin)(cn=%s))";

const PRIVATE_KEY: &[u8] = include_bytes!("../fixtures/jwt.key");
const PUBLIC_KEY: &[u8] = include_bytes!("../fixtures/jwt.pub");

/// LDAP result code `insufficientAccessRights`.
const RESULT_INSUFFICIENT_ACCESS: u32 = 50;

#[derive(Debug, Clone)]
struct StoredEntry {
    dn: String,
    attributes: Vec<(String, Vec<String>)>,
}

impl StoredEntry {
    fn values(&self, attribute: &str) -> Option<&Vec<String>> {
        self.attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
            .map(|(_, values)| values)
    }

    fn values_mut(&mut self, attribute: &str) -> Option<&mut Vec<String>> {
        self.attributes
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
            .map(|(_, values)| values)
    }
}

/// A directory held in memory. It does not maintain `memberOf`, so listings rely on the group
/// side of the membership.
#[derive(Clone, Default)]
pub struct InMemoryDirectory {
    entries: Arc<Mutex<BTreeMap<String, StoredEntry>>>,
    privileged_binds: Arc<AtomicUsize>,
}

impl InMemoryDirectory {
    /// Directory holding the `admins` group with one administrator and an empty `teamA` group.
    pub fn seeded() -> Self {
        let directory = Self::default();
        directory.insert_user("admin", ADMIN_PASSWORD, true);
        directory.insert_group("admins", &["admin"]);
        directory.insert_group("teamA", &[]);
        directory
    }

    pub fn insert_user(&self, name: &str, password: &str, admin: bool) {
        let mut attributes = vec![
            (
                "objectClass".to_string(),
                vec!["inetOrgPerson".to_string(), "organizationalPerson".to_string()],
            ),
            ("cn".to_string(), vec![name.to_string()]),
            ("sn".to_string(), vec![name.to_string()]),
            ("userPassword".to_string(), vec![hash_password(password)]),
        ];
        if admin {
            attributes.push(("employeeType".to_string(), vec!["admin".to_string()]));
        }
        self.insert(format!("cn={name},{BASE_DN}"), attributes);
    }

    pub fn insert_group(&self, name: &str, members: &[&str]) {
        let mut member_values = vec![String::new()];
        member_values.extend(members.iter().map(|member| format!("cn={member},{BASE_DN}")));
        self.insert(
            format!("cn={name},{BASE_DN}"),
            vec![
                ("objectClass".to_string(), vec!["groupOfNames".to_string()]),
                ("cn".to_string(), vec![name.to_string()]),
                ("member".to_string(), member_values),
            ],
        );
    }

    fn insert(&self, dn: String, attributes: Vec<(String, Vec<String>)>) {
        self.entries
            .lock()
            .unwrap()
            .insert(dn.to_ascii_lowercase(), StoredEntry { dn, attributes });
    }

    pub fn contains(&self, dn: &str) -> bool {
        self.entries
            .lock()
            .unwrap()
            .contains_key(&dn.to_ascii_lowercase())
    }

    /// Values of `attribute` on the entry at `dn`, empty when either is missing.
    pub fn attribute(&self, dn: &str, attribute: &str) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .get(&dn.to_ascii_lowercase())
            .and_then(|entry| entry.values(attribute).cloned())
            .unwrap_or_default()
    }

    pub fn privileged_binds(&self) -> usize {
        self.privileged_binds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LdapConnector for InMemoryDirectory {
    async fn connect(&self) -> Result<Box<dyn LdapSession>> {
        Ok(Box::new(InMemorySession {
            directory: self.clone(),
            privileged: false,
        }))
    }
}

struct InMemorySession {
    directory: InMemoryDirectory,
    privileged: bool,
}

impl InMemorySession {
    fn require_privilege(&self) -> Result<()> {
        if self.privileged {
            Ok(())
        } else {
            Err(map_result_code(RESULT_INSUFFICIENT_ACCESS, "write requires a privileged bind"))
        }
    }
}

#[async_trait]
impl LdapSession for InMemorySession {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()> {
        if dn.is_empty() && password.is_empty() {
            return Ok(());
        }
        if dn.eq_ignore_ascii_case(MANAGER_DN) && password == MANAGER_PASSWORD {
            self.privileged = true;
            self.directory.privileged_binds.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }

        let entries = self.directory.entries.lock().unwrap();
        let accepted = entries
            .get(&dn.to_ascii_lowercase())
            .and_then(|entry| entry.values("userPassword"))
            .is_some_and(|stored| {
                stored
                    .iter()
                    .any(|hash| verify_password(password, hash))
            });
        if accepted {
            Ok(())
        } else {
            Err(map_result_code(RESULT_INVALID_CREDENTIALS, "invalid credentials"))
        }
    }

    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&'static str],
    ) -> Result<Vec<LdapEntry>> {
        let filter = Filter::parse(filter)
            .ok_or_else(|| map_result_code(87, &format!("bad search filter {filter}")))?;
        let base = base_dn.to_ascii_lowercase();
        let entries = self.directory.entries.lock().unwrap();

        Ok(entries
            .iter()
            .filter(|(dn, _)| dn.as_str() == base || dn.ends_with(&format!(",{base}")))
            .filter(|(_, entry)| filter.matches(entry))
            .map(|(_, entry)| LdapEntry {
                dn: entry.dn.clone(),
                attributes: entry
                    .attributes
                    .iter()
                    .filter(|(name, _)| {
                        !attributes.contains(&NO_ATTRIBUTES)
                            && attributes
                                .iter()
                                .any(|wanted| wanted.eq_ignore_ascii_case(name))
                    })
                    .cloned()
                    .collect(),
            })
            .collect())
    }

    async fn add(&mut self, dn: &str, attributes: &[(String, Vec<String>)]) -> Result<()> {
        self.require_privilege()?;
        let mut entries = self.directory.entries.lock().unwrap();
        let key = dn.to_ascii_lowercase();
        if entries.contains_key(&key) {
            return Err(map_result_code(RESULT_ENTRY_ALREADY_EXISTS, dn));
        }
        entries.insert(
            key,
            StoredEntry {
                dn: dn.to_string(),
                attributes: attributes.to_vec(),
            },
        );
        Ok(())
    }

    async fn modify(&mut self, dn: &str, modifications: &[DirectoryModification]) -> Result<()> {
        self.require_privilege()?;
        let mut entries = self.directory.entries.lock().unwrap();
        let entry = entries
            .get_mut(&dn.to_ascii_lowercase())
            .ok_or_else(|| map_result_code(RESULT_NO_SUCH_OBJECT, dn))?;

        for modification in modifications {
            match modification {
                DirectoryModification::Add { attribute, values } => {
                    match entry.values_mut(attribute) {
                        Some(existing) => existing.extend(values.iter().cloned()),
                        None => entry.attributes.push((attribute.clone(), values.clone())),
                    }
                }
                DirectoryModification::Delete { attribute, values } => {
                    if values.is_empty() {
                        entry
                            .attributes
                            .retain(|(name, _)| !name.eq_ignore_ascii_case(attribute));
                    } else if let Some(existing) = entry.values_mut(attribute) {
                        existing.retain(|value| {
                            !values.iter().any(|gone| gone.eq_ignore_ascii_case(value))
                        });
                    }
                }
                DirectoryModification::Replace { attribute, values } => {
                    entry
                        .attributes
                        .retain(|(name, _)| !name.eq_ignore_ascii_case(attribute));
                    entry.attributes.push((attribute.clone(), values.clone()));
                }
            }
        }
        Ok(())
    }

    async fn delete(&mut self, dn: &str) -> Result<()> {
        self.require_privilege()?;
        self.directory
            .entries
            .lock()
            .unwrap()
            .remove(&dn.to_ascii_lowercase())
            .map(|_| ())
            .ok_or_else(|| map_result_code(RESULT_NO_SUCH_OBJECT, dn))
    }

    async fn unbind(&mut self) -> Result<()> {
        self.privileged = false;
        Ok(())
    }
}

/// Checks a `{SSHA512}` or cleartext `userPassword` value the way the directory server would.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some(encoded) = stored.strip_prefix(SSHA512_PREFIX) else {
        return password == stored;
    };
    let Ok(decoded) = STANDARD.decode(encoded) else {
        return false;
    };
    if decoded.len() <= 64 {
        return false;
    }
    let (expected, salt) = decoded.split_at(64);
    let mut hasher = Sha512::new();
    hasher.update(password.as_bytes());
    hasher.update(salt);
    hasher.finalize().as_slice() == expected
}

/// The subset of RFC 4515 the gateway emits: equality and `&`.
enum Filter {
    And(Vec<Filter>),
    Equal(String, String),
}

impl Filter {
    fn parse(input: &str) -> Option<Self> {
        let (filter, rest) = Self::parse_one(input)?;
        rest.is_empty().then_some(filter)
    }

    fn parse_one(input: &str) -> Option<(Self, &str)> {
        let body = input.strip_prefix('(')?;
        if let Some(mut rest) = body.strip_prefix('&') {
            let mut parts = Vec::new();
            while !rest.starts_with(')') {
                let (part, remaining) = Self::parse_one(rest)?;
                parts.push(part);
                rest = remaining;
            }
            return Some((Self::And(parts), &rest[1..]));
        }

        let end = body.find(')')?;
        let (attribute, value) = body[..end].split_once('=')?;
        Some((
            Self::Equal(attribute.to_string(), unescape(value)?),
            &body[end + 1..],
        ))
    }

    fn matches(&self, entry: &StoredEntry) -> bool {
        match self {
            Self::And(parts) => parts.iter().all(|part| part.matches(entry)),
            Self::Equal(attribute, value) => entry
                .values(attribute)
                .is_some_and(|values| values.iter().any(|v| v.eq_ignore_ascii_case(value))),
        }
    }
}

fn unescape(value: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(value.len());
    let mut chars = value.bytes();
    while let Some(byte) = chars.next() {
        if byte == b'\\' {
            let hex = [chars.next()?, chars.next()?];
            let hex = std::str::from_utf8(&hex).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
        } else {
            bytes.push(byte);
        }
    }
    String::from_utf8(bytes).ok()
}

/// A router over a freshly seeded directory, with login rate limiting at `login_rate_limit`.
pub fn app_with_limit(login_rate_limit: u32) -> (Router, InMemoryDirectory) {
    let directory = InMemoryDirectory::seeded();
    let config = DirectoryConfig::new("ldap://memory", BASE_DN, MANAGER_DN, MANAGER_PASSWORD)
        .unwrap()
        .with_admin_filter(ADMIN_FILTER);
    let client = DirectoryClient::with_connector(config, Box::new(directory.clone()));
    let tokens = TokenService::from_pem(PRIVATE_KEY, PUBLIC_KEY).unwrap();
    let protected = ProtectedNames {
        user: "admin".to_string(),
        group: "admins".to_string(),
    };

    let state = AppState::new(client, tokens, protected);
    (build_router(state, login_rate_limit), directory)
}

pub fn app() -> (Router, InMemoryDirectory) {
    app_with_limit(0)
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let text = body_string(response).await;
    serde_json::from_str(&text).unwrap()
}

/// Logs in as the seeded administrator and returns the token.
pub async fn login(app: &Router) -> String {
    let body = format!(r#"{{"username":"admin","password":"{ADMIN_PASSWORD}"}}"#);
    let response = send(app, json_request("POST", "/api/login", None, &body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_string(response).await
}
