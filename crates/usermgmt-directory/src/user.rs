//! Directory user (person) entries.

use serde::Serialize;

use crate::{client::LdapEntry, dn::DistinguishedName, password::hash_password};

/// Object classes carried by every user entry created through the gateway.
pub const USER_OBJECT_CLASSES: &[&str] = &[
    "inetOrgPerson",
    "person",
    "top",
    "organizationalPerson",
];

/// Attributes requested when listing users.
pub const USER_LIST_ATTRIBUTES: &[&str] = &["cn", "memberOf"];

/// A user entry about to be created.
///
/// The password is hashed on construction; the cleartext never leaves this type.
#[derive(Debug, Clone)]
pub struct NewUser {
    name: String,
    password_hash: String,
}

impl NewUser {
    /// Prepares a user named `name` with the given cleartext password.
    #[must_use]
    pub fn new(name: impl Into<String>, password: &str) -> Self {
        Self {
            name: name.into(),
            password_hash: hash_password(password),
        }
    }

    /// User name (`cn`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute set for the add request.
    #[must_use]
    pub fn attributes(&self) -> Vec<(String, Vec<String>)> {
        vec![
            (
                "objectClass".to_string(),
                USER_OBJECT_CLASSES.iter().map(ToString::to_string).collect(),
            ),
            ("cn".to_string(), vec![self.name.clone()]),
            ("sn".to_string(), vec![self.name.clone()]),
            ("displayName".to_string(), vec![self.name.clone()]),
            ("userPassword".to_string(), vec![self.password_hash.clone()]),
        ]
    }
}

/// A user as reported by the listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    /// User name (`cn`).
    pub name: String,
    /// Names of the groups the user belongs to.
    pub groups: Vec<String>,
    #[serde(skip)]
    dn: Option<DistinguishedName>,
}

impl UserSummary {
    /// Creates a summary without a known DN.
    #[must_use]
    pub fn new(name: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            name: name.into(),
            groups,
            dn: None,
        }
    }

    /// Builds a summary from a search entry carrying `cn` and optionally `memberOf`.
    ///
    /// Returns `None` for entries without a usable name.
    #[must_use]
    pub fn from_entry(entry: &LdapEntry) -> Option<Self> {
        let dn = DistinguishedName::parse(&entry.dn).ok();
        let name = entry
            .first("cn")
            .map(str::to_owned)
            .or_else(|| dn.as_ref()?.common_name().map(str::to_owned))?;

        let groups = entry
            .values("memberOf")
            .unwrap_or_default()
            .iter()
            .filter_map(|value| DistinguishedName::parse(value).ok())
            .filter_map(|group_dn| group_dn.common_name().map(str::to_owned))
            .collect();

        Some(Self { name, groups, dn })
    }

    /// Entry DN, when the summary was built from a search result.
    #[must_use]
    pub const fn dn(&self) -> Option<&DistinguishedName> {
        self.dn.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::SSHA512_PREFIX;
    use std::collections::HashMap;

    #[test]
    fn new_user_attributes_hash_password() {
        let user = NewUser::new("alice", "x");
        let attributes: HashMap<_, _> = user.attributes().into_iter().collect();

        assert_eq!(attributes["cn"], vec!["alice"]);
        assert_eq!(attributes["sn"], vec!["alice"]);
        assert_eq!(attributes["displayName"], vec!["alice"]);
        assert_eq!(attributes["objectClass"].len(), USER_OBJECT_CLASSES.len());

        let stored = &attributes["userPassword"][0];
        assert_ne!(stored, "x");
        assert!(stored.starts_with(SSHA512_PREFIX));
    }

    #[test]
    fn summary_reads_member_of() {
        let mut attributes = HashMap::new();
        attributes.insert("cn".to_string(), vec!["alice".to_string()]);
        attributes.insert(
            "memberOf".to_string(),
            vec![
                "cn=teamA,dc=example,dc=com".to_string(),
                "cn=devs,ou=Groups,dc=example,dc=com".to_string(),
            ],
        );
        let entry = LdapEntry {
            dn: "cn=alice,dc=example,dc=com".to_string(),
            attributes,
        };

        let summary = UserSummary::from_entry(&entry).unwrap();
        assert_eq!(summary.name, "alice");
        assert_eq!(summary.groups, vec!["teamA", "devs"]);
        assert_eq!(
            summary.dn().map(ToString::to_string).as_deref(),
            Some("cn=alice,dc=example,dc=com")
        );
    }

    #[test]
    fn summary_falls_back_to_dn_name() {
        let entry = LdapEntry {
            dn: "cn=bob,dc=example,dc=com".to_string(),
            attributes: HashMap::new(),
        };
        let summary = UserSummary::from_entry(&entry).unwrap();
        assert_eq!(summary.name, "bob");
        assert!(summary.groups.is_empty());
    }

    #[test]
    fn summary_serializes_name_and_groups_only() {
        let json = serde_json::to_value(UserSummary::new("carol", vec!["fs".into()])).unwrap();
        assert_eq!(json, serde_json::json!({"name": "carol", "groups": ["fs"]}));
    }
}
