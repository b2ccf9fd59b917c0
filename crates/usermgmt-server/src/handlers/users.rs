//! User endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use tracing::{info, instrument};
use usermgmt_core::Error;
use usermgmt_directory::{
    escape_filter_value, hash_password, DirectoryModification, DistinguishedName, Group,
    MembershipIndex, NewUser, UserSummary, ALL_GROUPS_FILTER, ALL_USERS_FILTER,
    GROUP_LIST_ATTRIBUTES, USER_LIST_ATTRIBUTES,
};
use validator::Validate;

use super::{ensure_group_not_protected, ensure_user_not_protected};
use crate::{error::ApiResult, extract::Payload, state::AppState};

/// `POST /api/users/add` body.
#[derive(Deserialize, Validate)]
pub struct AddUserRequest {
    /// New user name.
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    /// Initial password, hashed before it reaches the directory.
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    /// Group the new user is placed in.
    #[validate(length(min = 1, message = "fs is required"))]
    pub fs: String,
}

/// `POST /api/users/remove` body.
#[derive(Debug, Deserialize, Validate)]
pub struct RemoveUserRequest {
    /// User to remove.
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
}

/// `POST /api/users/changePassword` body.
#[derive(Deserialize, Validate)]
pub struct ChangePasswordRequest {
    /// User whose password changes.
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    /// New password, hashed before it reaches the directory.
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// `POST /api/users/addToGroup` and `POST /api/users/removeFromGroup` body.
#[derive(Debug, Deserialize, Validate)]
pub struct MembershipRequest {
    /// User being added or removed.
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    /// Target group.
    #[serde(alias = "groupname")]
    #[validate(length(min = 1, message = "group is required"))]
    pub group: String,
}

/// Creates a user and adds it to its `fs` group.
///
/// # Errors
///
/// [`Error::Reserved`] for the protected account or group, [`Error::Conflict`] if the user
/// already exists, [`Error::NotFound`] if the `fs` group does not.
#[instrument(skip_all, fields(username = %request.username, group = %request.fs))]
pub async fn add_user(
    State(state): State<AppState>,
    Payload(request): Payload<AddUserRequest>,
) -> ApiResult<StatusCode> {
    ensure_user_not_protected(&state, &request.username)?;
    ensure_group_not_protected(&state, &request.fs)?;
    let directory = &state.directory;
    let config = directory.config();

    match directory
        .resolve_dn(config.user_filter(), &request.username)
        .await
    {
        Ok(_) | Err(Error::Ambiguous(_)) => {
            return Err(Error::Conflict(format!(
                "user `{}` already exists",
                request.username
            ))
            .into())
        }
        Err(Error::NotFound(_)) => {}
        Err(err) => return Err(err.into()),
    }

    let group_dn = directory
        .resolve_dn(config.group_filter(), &request.fs)
        .await?;

    let user = NewUser::new(&request.username, &request.password);
    let user_dn = config.user_dn(user.name());
    directory.add_entry(&user_dn, &user.attributes()).await?;
    directory
        .modify_entry(&group_dn, DirectoryModification::add_member(&user_dn))
        .await?;

    info!(dn = %user_dn, "user created");
    Ok(StatusCode::OK)
}

/// Removes a user from every group that lists it, then deletes the entry.
///
/// # Errors
///
/// [`Error::Reserved`] for the protected account, [`Error::NotFound`] if the user does not exist.
#[instrument(skip_all, fields(username = %request.username))]
pub async fn remove_user(
    State(state): State<AppState>,
    Payload(request): Payload<RemoveUserRequest>,
) -> ApiResult<StatusCode> {
    ensure_user_not_protected(&state, &request.username)?;
    let directory = &state.directory;

    let user_dn = directory
        .resolve_dn(directory.config().user_filter(), &request.username)
        .await?;

    let filter = format!(
        "(&{ALL_GROUPS_FILTER}(member={}))",
        escape_filter_value(&user_dn.to_string())
    );
    let groups = directory.search(&filter, GROUP_LIST_ATTRIBUTES).await?;
    for group in groups.iter().filter_map(Group::from_entry) {
        directory
            .modify_entry(&group.dn, DirectoryModification::remove_member(&user_dn))
            .await?;
    }

    directory.delete_entry(&user_dn).await?;
    info!(dn = %user_dn, "user removed");
    Ok(StatusCode::OK)
}

/// Replaces a user's password.
///
/// # Errors
///
/// [`Error::Reserved`] for the protected account, [`Error::NotFound`] if the user does not exist.
#[instrument(skip_all, fields(username = %request.username))]
pub async fn change_password(
    State(state): State<AppState>,
    Payload(request): Payload<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    ensure_user_not_protected(&state, &request.username)?;
    let directory = &state.directory;

    let user_dn = directory
        .resolve_dn(directory.config().user_filter(), &request.username)
        .await?;
    directory
        .modify_entry(
            &user_dn,
            DirectoryModification::replace_password(hash_password(&request.password)),
        )
        .await?;

    info!(dn = %user_dn, "password changed");
    Ok(StatusCode::OK)
}

/// Adds a user to a group.
///
/// # Errors
///
/// [`Error::Reserved`] for the protected account or group, [`Error::NotFound`] if the user or
/// group does not exist.
#[instrument(skip_all, fields(username = %request.username, group = %request.group))]
pub async fn add_to_group(
    State(state): State<AppState>,
    Payload(request): Payload<MembershipRequest>,
) -> ApiResult<StatusCode> {
    change_membership(&state, &request, DirectoryModification::add_member).await?;
    info!("user added to group");
    Ok(StatusCode::OK)
}

/// Removes a user from a group.
///
/// # Errors
///
/// [`Error::Reserved`] for the protected account or group, [`Error::NotFound`] if the user or
/// group does not exist.
#[instrument(skip_all, fields(username = %request.username, group = %request.group))]
pub async fn remove_from_group(
    State(state): State<AppState>,
    Payload(request): Payload<MembershipRequest>,
) -> ApiResult<StatusCode> {
    change_membership(&state, &request, DirectoryModification::remove_member).await?;
    info!("user removed from group");
    Ok(StatusCode::OK)
}

async fn change_membership(
    state: &AppState,
    request: &MembershipRequest,
    modification: fn(&DistinguishedName) -> DirectoryModification,
) -> Result<(), Error> {
    ensure_user_not_protected(state, &request.username)?;
    ensure_group_not_protected(state, &request.group)?;
    let directory = &state.directory;
    let config = directory.config();

    let user_dn = directory
        .resolve_dn(config.user_filter(), &request.username)
        .await?;
    let group_dn = directory
        .resolve_dn(config.group_filter(), &request.group)
        .await?;
    directory
        .modify_entry(&group_dn, modification(&user_dn))
        .await
}

/// Lists every user with the names of its groups.
///
/// Group names come from the entry's `memberOf` when the directory maintains it, otherwise from
/// a single group listing turned into a reverse index.
///
/// # Errors
///
/// [`Error::DirectoryError`] if either search fails.
#[instrument(skip_all)]
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<UserSummary>>> {
    let directory = &state.directory;
    let (users, groups) = tokio::try_join!(
        directory.search(ALL_USERS_FILTER, USER_LIST_ATTRIBUTES),
        directory.search(ALL_GROUPS_FILTER, GROUP_LIST_ATTRIBUTES),
    )?;

    let groups: Vec<Group> = groups.iter().filter_map(Group::from_entry).collect();
    let index = MembershipIndex::from_groups(&groups);

    let summaries = users
        .iter()
        .filter_map(UserSummary::from_entry)
        .map(|mut summary| {
            if summary.groups.is_empty() {
                let inferred = summary
                    .dn()
                    .map(|dn| index.groups_of(dn).to_vec())
                    .unwrap_or_default();
                summary.groups = inferred;
            }
            summary
        })
        .collect();

    Ok(Json(summaries))
}
