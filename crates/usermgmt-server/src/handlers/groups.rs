//! Group endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use tracing::{info, instrument};
use usermgmt_core::Error;
use usermgmt_directory::{
    new_group_attributes, Group, GroupSummary, ALL_GROUPS_FILTER, GROUP_LIST_ATTRIBUTES,
};
use validator::Validate;

use super::ensure_group_not_protected;
use crate::{error::ApiResult, extract::Payload, state::AppState};

/// `POST /api/groups/add` and `POST /api/groups/remove` body.
#[derive(Debug, Deserialize, Validate)]
pub struct GroupRequest {
    /// Group name.
    #[validate(length(min = 1, message = "groupname is required"))]
    pub groupname: String,
}

/// Creates an empty group.
///
/// # Errors
///
/// [`Error::Reserved`] for the protected group, [`Error::Conflict`] if a group with that name
/// already exists.
#[instrument(skip_all, fields(group = %request.groupname))]
pub async fn add_group(
    State(state): State<AppState>,
    Payload(request): Payload<GroupRequest>,
) -> ApiResult<StatusCode> {
    ensure_group_not_protected(&state, &request.groupname)?;
    let directory = &state.directory;
    let config = directory.config();

    match directory
        .resolve_dn(config.group_filter(), &request.groupname)
        .await
    {
        Ok(_) | Err(Error::Ambiguous(_)) => {
            return Err(Error::Conflict(format!(
                "group `{}` already exists",
                request.groupname
            ))
            .into())
        }
        Err(Error::NotFound(_)) => {}
        Err(err) => return Err(err.into()),
    }

    let group_dn = config.group_dn(&request.groupname);
    directory
        .add_entry(&group_dn, &new_group_attributes(&request.groupname))
        .await?;

    info!(dn = %group_dn, "group created");
    Ok(StatusCode::OK)
}

/// Deletes a group.
///
/// # Errors
///
/// [`Error::Reserved`] for the protected group, [`Error::NotFound`] if the group does not exist.
#[instrument(skip_all, fields(group = %request.groupname))]
pub async fn remove_group(
    State(state): State<AppState>,
    Payload(request): Payload<GroupRequest>,
) -> ApiResult<StatusCode> {
    ensure_group_not_protected(&state, &request.groupname)?;
    let directory = &state.directory;

    let group_dn = directory
        .resolve_dn(directory.config().group_filter(), &request.groupname)
        .await?;
    directory.delete_entry(&group_dn).await?;

    info!(dn = %group_dn, "group removed");
    Ok(StatusCode::OK)
}

/// Lists every group with its member names.
///
/// # Errors
///
/// [`Error::DirectoryError`] if the search fails.
#[instrument(skip_all)]
pub async fn list_groups(State(state): State<AppState>) -> ApiResult<Json<Vec<GroupSummary>>> {
    let entries = state
        .directory
        .search(ALL_GROUPS_FILTER, GROUP_LIST_ATTRIBUTES)
        .await?;
    let groups = entries
        .iter()
        .filter_map(Group::from_entry)
        .map(|group| group.summary())
        .collect();
    Ok(Json(groups))
}
