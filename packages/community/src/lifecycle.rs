//! Creating, updating, joining, and removing communities.

use civic_map_community_models::{
    CommunityPatch, CommunityRecord, CreateCommunityRequest, JoinOutcome, JoinStatus, NewCommunity,
};
use civic_map_geometry::centroid_of;
use serde_json::Value;

use crate::{CommunityError, CommunityStore};

/// Creates a community on behalf of `caller_id`.
///
/// The creator defaults to the caller when the request does not name one.
///
/// # Errors
///
/// * [`CommunityError::InvalidInput`] if the name is blank or the geometry
///   has no usable centroid.
/// * [`CommunityError::Store`] if the insert fails.
pub async fn create(
    store: &dyn CommunityStore,
    request: &CreateCommunityRequest,
    caller_id: i64,
) -> Result<CommunityRecord, CommunityError> {
    let community = NewCommunity {
        name: required_name(&request.name)?,
        description: request.description.clone(),
        category: request.category.clone(),
        geometry: checked_geometry(request.geometry.as_ref())?,
        neighborhood_id: request.neighborhood_id,
        creator_id: request.creator_id.unwrap_or(caller_id),
        category_ids: request.category_ids.clone(),
    };

    let created = store.insert_community(&community).await?;
    log::info!(
        "Account {caller_id} created community {} ({})",
        created.id,
        created.name
    );
    Ok(created)
}

/// Applies a partial update to a live community.
///
/// An empty patch returns the community unchanged.
///
/// # Errors
///
/// * [`CommunityError::NotFound`] if the community is missing or not live.
/// * [`CommunityError::InvalidInput`] if the new name is blank or the new
///   geometry has no usable centroid.
/// * [`CommunityError::Store`] if a store call fails.
pub async fn update(
    store: &dyn CommunityStore,
    id: i64,
    patch: &CommunityPatch,
) -> Result<CommunityRecord, CommunityError> {
    let current = store
        .find_live(id)
        .await?
        .ok_or(CommunityError::NotFound { id })?;

    if patch.is_empty() {
        return Ok(current);
    }

    let patch = CommunityPatch {
        name: patch.name.as_deref().map(required_name).transpose()?,
        geometry: checked_geometry(patch.geometry.as_ref())?,
        ..patch.clone()
    };

    let updated = store.update_community(id, &patch).await?;
    log::info!("Updated community {id}");
    Ok(updated)
}

fn required_name(name: &str) -> Result<String, CommunityError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CommunityError::invalid_input("name must not be empty"));
    }
    Ok(name.to_string())
}

/// Rejects geometry the map and recommendation paths could not use. A JSON
/// `null` counts as no geometry.
fn checked_geometry(geometry: Option<&Value>) -> Result<Option<Value>, CommunityError> {
    let Some(geometry) = geometry.filter(|g| !g.is_null()) else {
        return Ok(None);
    };
    centroid_of(geometry).map_err(|e| {
        CommunityError::invalid_input(format!(
            "invalid or unsupported geometry (use Point/Polygon/MultiPolygon): {e}"
        ))
    })?;
    Ok(Some(geometry.clone()))
}

/// Adds `account_id` to a live community.
///
/// A previous membership that was deactivated is reactivated instead of
/// duplicated.
///
/// # Errors
///
/// * [`CommunityError::NotFound`] if the community is missing or not live.
/// * [`CommunityError::AlreadyMember`] if the account is an active member.
/// * [`CommunityError::Store`] if a store call fails.
pub async fn join(
    store: &dyn CommunityStore,
    community_id: i64,
    account_id: i64,
) -> Result<JoinOutcome, CommunityError> {
    if store.find_live(community_id).await?.is_none() {
        return Err(CommunityError::NotFound { id: community_id });
    }

    match store.find_membership(community_id, account_id).await? {
        Some(existing) if existing.is_live() => Err(CommunityError::AlreadyMember { community_id }),
        Some(existing) => {
            let membership = store.reactivate_membership(existing.id).await?;
            log::info!("Reactivated membership of account {account_id} in community {community_id}");
            Ok(JoinOutcome {
                status: JoinStatus::Reactivated,
                membership,
            })
        }
        None => {
            let membership = store.create_membership(community_id, account_id).await?;
            log::info!("Account {account_id} joined community {community_id}");
            Ok(JoinOutcome {
                status: JoinStatus::Created,
                membership,
            })
        }
    }
}

/// Soft-deletes a live community.
///
/// # Errors
///
/// * [`CommunityError::NotFound`] if the community is missing or already
///   removed.
/// * [`CommunityError::Store`] if a store call fails.
pub async fn remove(
    store: &dyn CommunityStore,
    id: i64,
) -> Result<CommunityRecord, CommunityError> {
    if store.find_live(id).await?.is_none() {
        return Err(CommunityError::NotFound { id });
    }

    let removed = store.soft_delete(id).await?;
    log::info!("Removed community {id}");
    Ok(removed)
}
