//! Directory group entries and membership.

use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

use crate::{client::LdapEntry, dn::DistinguishedName};

/// Object classes carried by every group entry created through the gateway.
pub const GROUP_OBJECT_CLASSES: &[&str] = &["groupOfNames", "top"];

/// Attributes requested when listing groups.
pub const GROUP_LIST_ATTRIBUTES: &[&str] = &["cn", "member"];

/// `groupOfNames` requires at least one `member`; new groups carry this empty placeholder.
pub const EMPTY_MEMBER_PLACEHOLDER: &str = "";

/// Attribute set for a new, empty group named `name`.
#[must_use]
pub fn new_group_attributes(name: &str) -> Vec<(String, Vec<String>)> {
    vec![
        (
            "objectClass".to_string(),
            GROUP_OBJECT_CLASSES.iter().map(ToString::to_string).collect(),
        ),
        ("cn".to_string(), vec![name.to_string()]),
        (
            "member".to_string(),
            vec![EMPTY_MEMBER_PLACEHOLDER.to_string()],
        ),
    ]
}

/// A group entry read from the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Distinguished name of the group.
    pub dn: DistinguishedName,
    /// Group name (`cn`).
    pub name: String,
    /// Member DNs, without the empty placeholder.
    pub members: Vec<DistinguishedName>,
}

impl Group {
    /// Parses a search entry carrying `cn` and `member`.
    ///
    /// Returns `None` when the entry DN is unparseable or no name can be found.
    #[must_use]
    pub fn from_entry(entry: &LdapEntry) -> Option<Self> {
        let dn = match DistinguishedName::parse(&entry.dn) {
            Ok(dn) => dn,
            Err(err) => {
                warn!("skipping group with unparseable DN `{}`: {err}", entry.dn);
                return None;
            }
        };
        let name = entry
            .first("cn")
            .or_else(|| dn.common_name())?
            .to_string();

        let members = entry
            .values("member")
            .unwrap_or_default()
            .iter()
            .filter(|value| value.as_str() != EMPTY_MEMBER_PLACEHOLDER)
            .filter_map(|value| match DistinguishedName::parse(value) {
                Ok(member) => Some(member),
                Err(err) => {
                    warn!("failed to parse member DN `{value}` of group `{name}`: {err}");
                    None
                }
            })
            .collect();

        Some(Self { dn, name, members })
    }

    /// Checks whether `member` is listed in this group (DN comparison ignores case).
    #[must_use]
    pub fn has_member(&self, member: &DistinguishedName) -> bool {
        let wanted = member.normalized();
        self.members.iter().any(|dn| dn.normalized() == wanted)
    }

    /// Summary reported by the listing endpoint.
    #[must_use]
    pub fn summary(&self) -> GroupSummary {
        GroupSummary {
            name: self.name.clone(),
            members: self
                .members
                .iter()
                .map(|member| {
                    member
                        .common_name()
                        .map_or_else(|| member.to_string(), str::to_owned)
                })
                .collect(),
        }
    }
}

/// A group as reported by the listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    /// Group name (`cn`).
    pub name: String,
    /// Member names (`cn` of each member DN).
    pub members: Vec<String>,
}

/// Reverse index from member DN to the names of the groups containing it.
#[derive(Debug, Default, Clone)]
pub struct MembershipIndex {
    groups_by_member: HashMap<String, Vec<String>>,
}

impl MembershipIndex {
    /// Builds the index from a full group listing.
    #[must_use]
    pub fn from_groups(groups: &[Group]) -> Self {
        let mut groups_by_member: HashMap<String, Vec<String>> = HashMap::new();
        for group in groups {
            for member in &group.members {
                groups_by_member
                    .entry(member.normalized())
                    .or_default()
                    .push(group.name.clone());
            }
        }
        Self { groups_by_member }
    }

    /// Group names containing `member`, in listing order.
    #[must_use]
    pub fn groups_of(&self, member: &DistinguishedName) -> &[String] {
        self.groups_by_member
            .get(&member.normalized())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
