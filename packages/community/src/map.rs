//! Cursor-paginated map features.

use std::collections::BTreeSet;

use civic_map_community_models::{
    CallerRelation, CommunityDetail, CommunityRecord, FeatureType, MapFeature, MapFeaturePage,
    MapFeatureProperties, MapFilter, MapRequest,
};
use civic_map_geometry::to_geojson;

use crate::{CommunityError, CommunityStore};

/// Page size when `limit` is not given.
pub const DEFAULT_LIMIT: usize = 100;

/// Upper bound on the page size.
pub const MAX_LIMIT: usize = 1000;

/// Clamps a requested page size to `[1, MAX_LIMIT]`.
#[must_use]
#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn clamp_limit(limit: Option<i64>) -> usize {
    limit
        .unwrap_or(DEFAULT_LIMIT as i64)
        .clamp(1, MAX_LIMIT as i64) as usize
}

/// Parses a page cursor (the ID of the last community already returned).
///
/// # Errors
///
/// Returns [`CommunityError::InvalidInput`] if the cursor is not an integer.
pub fn parse_cursor(cursor: Option<&str>) -> Result<Option<i64>, CommunityError> {
    let Some(cursor) = cursor.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(None);
    };
    cursor
        .parse()
        .map(Some)
        .map_err(|_| CommunityError::invalid_input(format!("invalid cursor: {cursor}")))
}

/// Returns one page of mappable communities as `GeoJSON` features.
///
/// Fetches `limit + 1` rows to learn whether another page exists; the extra
/// row is dropped and the ID of the last kept row becomes the next cursor.
/// With a caller, memberships for the whole page are looked up in a single
/// store call and each feature carries the caller flags; without one the
/// flags are left out entirely.
///
/// # Errors
///
/// * [`CommunityError::InvalidInput`] for an unparseable cursor.
/// * [`CommunityError::Store`] if either store call fails.
pub async fn map_features(
    store: &dyn CommunityStore,
    request: &MapRequest,
) -> Result<MapFeaturePage, CommunityError> {
    let limit = clamp_limit(request.limit);
    let after_id = parse_cursor(request.cursor.as_deref())?;
    let filter = map_filter(request);

    let mut rows = store.find_map_page(&filter, after_id, limit + 1).await?;
    let has_more = rows.len() > limit;
    rows.truncate(limit);

    let next_cursor = if has_more {
        rows.last().map(|c| c.id.to_string())
    } else {
        None
    };

    let members = match request.caller_id {
        Some(caller_id) if !rows.is_empty() => {
            let ids: Vec<i64> = rows.iter().map(|c| c.id).collect();
            Some(store.active_memberships(caller_id, &ids).await?)
        }
        _ => None,
    };

    let data: Vec<MapFeature> = rows
        .iter()
        .filter(|c| c.is_live() && c.is_mappable())
        .map(|c| project(c, request.caller_id, members.as_ref()))
        .collect();

    log::debug!(
        "Map page after {after_id:?}: {} features, has_more={has_more}",
        data.len()
    );

    Ok(MapFeaturePage {
        count: data.len(),
        data,
        next_cursor,
        has_more,
    })
}

/// Returns a single live community with its map feature.
///
/// Unlike the map page, a community without geometry is still returned,
/// with a `null` feature geometry.
///
/// # Errors
///
/// * [`CommunityError::NotFound`] if no live community has this ID.
/// * [`CommunityError::Store`] if a store call fails.
pub async fn community_detail(
    store: &dyn CommunityStore,
    id: i64,
    caller_id: Option<i64>,
) -> Result<CommunityDetail, CommunityError> {
    let community = store
        .find_live(id)
        .await?
        .ok_or(CommunityError::NotFound { id })?;

    let members = match caller_id {
        Some(caller_id) => Some(store.active_memberships(caller_id, &[community.id]).await?),
        None => None,
    };

    let feature = project(&community, caller_id, members.as_ref());

    Ok(CommunityDetail {
        id: community.id,
        name: community.name,
        description: community.description,
        category: community.category,
        categories: community.categories,
        creator_id: community.creator_id,
        feature,
    })
}

fn map_filter(request: &MapRequest) -> MapFilter {
    MapFilter {
        region_id: request.region_id,
        neighborhood_id: request.neighborhood_id,
        creator_id: request.creator_id,
        name: request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        categories: request
            .categories
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

fn project(
    community: &CommunityRecord,
    caller_id: Option<i64>,
    members: Option<&BTreeSet<i64>>,
) -> MapFeature {
    let caller = caller_id.map(|caller_id| {
        CallerRelation::new(
            community.creator_id == caller_id,
            members.is_some_and(|m| m.contains(&community.id)),
        )
    });

    MapFeature {
        feature_type: FeatureType::Feature,
        properties: MapFeatureProperties {
            id: community.id,
            name: community.name.clone(),
            region: community.region_name.clone(),
            neighborhood_id: community.neighborhood_id,
            category: community.category.clone(),
            caller,
        },
        geometry: community
            .geometry
            .as_ref()
            .map_or(serde_json::Value::Null, to_geojson),
    }
}
