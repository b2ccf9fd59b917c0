//! HTTP handlers.

pub mod auth;
pub mod groups;
pub mod users;

use usermgmt_core::Error;

use crate::state::AppState;

fn ensure_user_not_protected(state: &AppState, username: &str) -> Result<(), Error> {
    if state.protected.is_protected_user(username) {
        return Err(Error::Reserved(format!("user `{username}` is protected")));
    }
    Ok(())
}

fn ensure_group_not_protected(state: &AppState, group: &str) -> Result<(), Error> {
    if state.protected.is_protected_group(group) {
        return Err(Error::Reserved(format!("group `{group}` is protected")));
    }
    Ok(())
}
