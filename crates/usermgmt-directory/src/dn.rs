//! Distinguished name handling.
//!
//! Names built from request input (`cn=<username>,<base>`) go through [`DistinguishedName::child`]
//! so that RFC 4514 special characters in user-supplied values are escaped rather than
//! interpreted as structure.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use usermgmt_core::Error as CoreError;

/// Errors that can occur when parsing a distinguished name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DistinguishedNameError {
    /// The distinguished name was empty.
    #[error("distinguished name cannot be empty")]
    Empty,
    /// A component had no `=` separator or was empty.
    #[error("invalid distinguished name component: {0}")]
    InvalidComponent(String),
    /// A component was missing the attribute name to the left of the `=`.
    #[error("distinguished name component missing attribute: {0}")]
    MissingAttribute(String),
    /// The distinguished name ended with an escape character.
    #[error("distinguished name contains an unterminated escape sequence")]
    UnterminatedEscape,
}

impl From<DistinguishedNameError> for CoreError {
    fn from(err: DistinguishedNameError) -> Self {
        CoreError::BadRequest(err.to_string())
    }
}

/// A single `attribute=value` assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeAssertion {
    attribute: String,
    value: String,
}

impl AttributeAssertion {
    /// Creates an assertion from an unescaped value.
    #[must_use]
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Attribute type, e.g. `cn`.
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Unescaped attribute value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for AttributeAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.attribute, escape_value(&self.value))
    }
}

/// Parsed distinguished name.
///
/// Each RDN is a list of assertions joined by `+` in the string form; almost every entry this
/// gateway touches has single-valued RDNs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinguishedName {
    rdns: Vec<Vec<AttributeAssertion>>,
}

impl DistinguishedName {
    /// Parses a distinguished name.
    ///
    /// # Errors
    ///
    /// Returns [`DistinguishedNameError`] for empty input or malformed components.
    pub fn parse(input: &str) -> Result<Self, DistinguishedNameError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(DistinguishedNameError::Empty);
        }

        let mut rdns = Vec::new();
        let mut current_rdn = Vec::new();
        let mut token = String::new();
        let mut chars = input.chars();

        while let Some(ch) = chars.next() {
            match ch {
                '\\' => {
                    let next = chars.next().ok_or(DistinguishedNameError::UnterminatedEscape)?;
                    token.push('\\');
                    token.push(next);
                }
                '+' => {
                    current_rdn.push(parse_assertion(&token)?);
                    token.clear();
                }
                ',' => {
                    current_rdn.push(parse_assertion(&token)?);
                    token.clear();
                    rdns.push(std::mem::take(&mut current_rdn));
                }
                _ => token.push(ch),
            }
        }
        current_rdn.push(parse_assertion(&token)?);
        rdns.push(current_rdn);

        Ok(Self { rdns })
    }

    /// Returns `<attribute>=<value>,<self>`, escaping `value`.
    #[must_use]
    pub fn child(&self, attribute: &str, value: &str) -> Self {
        let mut rdns = Vec::with_capacity(self.rdns.len() + 1);
        rdns.push(vec![AttributeAssertion::new(attribute, value)]);
        rdns.extend(self.rdns.iter().cloned());
        Self { rdns }
    }

    /// Iterates over every assertion, leftmost RDN first.
    pub fn assertions(&self) -> impl Iterator<Item = &AttributeAssertion> + '_ {
        self.rdns.iter().flatten()
    }

    /// Value of the first assertion for `attribute` (case-insensitive).
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.assertions()
            .find(|assertion| assertion.attribute.eq_ignore_ascii_case(attribute))
            .map(AttributeAssertion::value)
    }

    /// The `cn` of the leftmost RDN, which is how users and groups are named.
    #[must_use]
    pub fn common_name(&self) -> Option<&str> {
        self.rdns
            .first()?
            .iter()
            .find(|assertion| assertion.attribute.eq_ignore_ascii_case("cn"))
            .map(AttributeAssertion::value)
    }

    /// Lower-cased string form, suitable as a lookup key.
    #[must_use]
    pub fn normalized(&self) -> String {
        self.to_string().to_ascii_lowercase()
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, rdn) in self.rdns.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            for (position, assertion) in rdn.iter().enumerate() {
                if position > 0 {
                    f.write_str("+")?;
                }
                write!(f, "{assertion}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for DistinguishedName {
    type Err = DistinguishedNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_assertion(token: &str) -> Result<AttributeAssertion, DistinguishedNameError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(DistinguishedNameError::InvalidComponent(token.to_string()));
    }

    // Escapes only appear in values, so the first `=` always separates the attribute type.
    let (attribute, value) = token
        .split_once('=')
        .ok_or_else(|| DistinguishedNameError::InvalidComponent(token.to_string()))?;
    let attribute = attribute.trim();
    if attribute.is_empty() {
        return Err(DistinguishedNameError::MissingAttribute(token.to_string()));
    }

    Ok(AttributeAssertion::new(attribute, unescape_value(value.trim())?))
}

fn unescape_value(value: &str) -> Result<String, DistinguishedNameError> {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            result.push(chars.next().ok_or(DistinguishedNameError::UnterminatedEscape)?);
        } else {
            result.push(ch);
        }
    }
    Ok(result)
}

fn escape_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut escaped = String::with_capacity(value.len());
    for (index, ch) in value.chars().enumerate() {
        let needs_escape = matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=')
            || (index == 0 && matches!(ch, ' ' | '#'))
            || (index == last && ch == ' ');
        if needs_escape {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_user_dn() {
        let dn = DistinguishedName::parse("cn=alice,ou=People,dc=example,dc=com").unwrap();
        assert_eq!(dn.common_name(), Some("alice"));
        assert_eq!(dn.get("OU"), Some("People"));
        assert_eq!(dn.to_string(), "cn=alice,ou=People,dc=example,dc=com");
    }

    #[test]
    fn child_escapes_structural_characters() {
        let base = DistinguishedName::parse("dc=example,dc=com").unwrap();
        let dn = base.child("cn", "evil,ou=admins");
        assert_eq!(dn.to_string(), "cn=evil\\,ou\\=admins,dc=example,dc=com");
        assert_eq!(dn.common_name(), Some("evil,ou=admins"));

        let reparsed = DistinguishedName::parse(&dn.to_string()).unwrap();
        assert_eq!(reparsed, dn);
    }

    #[test]
    fn multi_valued_rdn() {
        let dn = DistinguishedName::parse("cn=John+uid=1234,dc=example,dc=com").unwrap();
        assert_eq!(dn.get("uid"), Some("1234"));
        assert_eq!(dn.to_string(), "cn=John+uid=1234,dc=example,dc=com");
    }

    #[test]
    fn normalized_ignores_case() {
        let a = DistinguishedName::parse("CN=Alice,DC=Example,DC=com").unwrap();
        let b = DistinguishedName::parse("cn=alice,dc=example,dc=com").unwrap();
        assert_eq!(a.normalized(), b.normalized());
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(DistinguishedName::parse("  "), Err(DistinguishedNameError::Empty));
        assert!(matches!(
            DistinguishedName::parse("cn=alice,"),
            Err(DistinguishedNameError::InvalidComponent(_))
        ));
        assert!(matches!(
            DistinguishedName::parse("=alice"),
            Err(DistinguishedNameError::MissingAttribute(_))
        ));
        assert_eq!(
            DistinguishedName::parse("cn=alice\\"),
            Err(DistinguishedNameError::UnterminatedEscape)
        );
    }
}
