//! Search filter templates.

use std::fmt;
use usermgmt_core::config::FILTER_PLACEHOLDER;

/// Filter matching every person entry, used when listing users.
pub const ALL_USERS_FILTER: &str = "(objectClass=organizationalPerson)";

/// Filter matching every group entry, used when listing groups.
pub const ALL_GROUPS_FILTER: &str = "(objectClass=groupOfNames)";

/// A configured filter template such as `(&(objectClass=person)(cn=%s))`.
///
/// Every occurrence of `%s` is replaced with the RFC 4515 escaped parameter, so a value like
/// `*)(cn=*` can never widen the search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryFilter {
    template: String,
}

impl DirectoryFilter {
    /// Wraps a filter template.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Raw template text.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Renders the filter for `value`.
    #[must_use]
    pub fn render(&self, value: &str) -> String {
        self.template
            .replace(FILTER_PLACEHOLDER, &escape_filter_value(value))
    }
}

impl fmt::Display for DirectoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

/// Escapes a value for inclusion in an LDAP filter (RFC 4515).
#[must_use]
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\\' => escaped.push_str("\\5c"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
