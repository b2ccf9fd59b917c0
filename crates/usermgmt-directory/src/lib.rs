//! LDAP directory adapter for the user management gateway.
//!
//! This crate provides the connection-per-operation [`DirectoryClient`], strongly-typed
//! distinguished names and filter templates, and the user and group entry models the HTTP
//! handlers build on.

#![deny(missing_docs)]

mod client;
mod config;
mod dn;
mod filter;
mod group;
mod password;
mod user;

pub use client::{
    map_result_code, DirectoryClient, DirectoryModification, LdapConnector, LdapEntry, LdapSession,
    RealLdapConnector, NO_ATTRIBUTES, RESULT_ENTRY_ALREADY_EXISTS, RESULT_INVALID_CREDENTIALS,
    RESULT_NO_SUCH_OBJECT,
};
pub use config::DirectoryConfig;
pub use dn::{AttributeAssertion, DistinguishedName, DistinguishedNameError};
pub use filter::{escape_filter_value, DirectoryFilter, ALL_GROUPS_FILTER, ALL_USERS_FILTER};
pub use group::{
    new_group_attributes, Group, GroupSummary, MembershipIndex, EMPTY_MEMBER_PLACEHOLDER,
    GROUP_LIST_ATTRIBUTES, GROUP_OBJECT_CLASSES,
};
pub use password::{hash_password, SSHA512_PREFIX};
pub use user::{NewUser, UserSummary, USER_LIST_ATTRIBUTES, USER_OBJECT_CLASSES};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = usermgmt_core::Result<T>;
