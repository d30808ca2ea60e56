//! K-nearest community recommendation by centroid distance.

use civic_map_community_models::{
    CandidateFilter, CommunityRecord, RecommendRequest, RecommendedCommunity,
};
use civic_map_geometry::{Position, centroid_of, haversine_km, to_geojson};
use serde_json::Value;

use crate::{CommunityError, CommunityStore};

/// Number of recommendations when `k` is not given.
pub const DEFAULT_K: usize = 10;

/// Upper bound on `k`.
pub const MAX_K: usize = 100;

/// Floors and clamps a requested `k` to `[1, MAX_K]`.
///
/// Missing or NaN values fall back to [`DEFAULT_K`].
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn clamp_k(k: Option<f64>) -> usize {
    let k = k
        .filter(|k| !k.is_nan())
        .map_or(DEFAULT_K as f64, f64::floor);
    k.clamp(1.0, MAX_K as f64) as usize
}

/// Returns up to `k` communities ordered by ascending distance between the
/// query geometry's centroid and each community's centroid.
///
/// Candidates whose stored geometry has no usable centroid, or whose
/// distance is not finite, are dropped. Equal distances keep the store's
/// order.
///
/// # Errors
///
/// * [`CommunityError::InvalidInput`] if the query geometry is missing, is
///   not a tagged `GeoJSON` object, or has no usable centroid.
/// * [`CommunityError::Store`] if candidate retrieval fails.
pub async fn recommend(
    store: &dyn CommunityStore,
    request: &RecommendRequest,
) -> Result<Vec<RecommendedCommunity>, CommunityError> {
    let k = clamp_k(request.k);
    let origin = query_centroid(request.geometry.as_ref())?;

    let filter = CandidateFilter {
        region_id: request.region_id,
        neighborhood_id: request.neighborhood_id,
        creator_id: request.creator_id,
        category: request
            .category
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    };

    let candidates = store.find_candidates(&filter).await?;
    let candidate_count = candidates.len();

    let mut ranked = rank(origin, candidates);
    log::debug!(
        "Ranked {} of {candidate_count} candidates around ({}, {}), keeping {k}",
        ranked.len(),
        origin.x,
        origin.y,
    );
    ranked.truncate(k);

    Ok(ranked)
}

/// Resolves the query geometry to a centroid.
fn query_centroid(geometry: Option<&Value>) -> Result<Position, CommunityError> {
    let Some(geometry) = geometry.filter(|g| !g.is_null()) else {
        return Err(CommunityError::invalid_input("geometry (GeoJSON) is required"));
    };

    if !geometry.get("type").is_some_and(Value::is_string) {
        return Err(CommunityError::invalid_input(
            "geometry must be a GeoJSON object with a type",
        ));
    }

    centroid_of(geometry).map_err(|e| {
        CommunityError::invalid_input(format!(
            "invalid or unsupported geometry (use Point/Polygon/MultiPolygon): {e}"
        ))
    })
}

/// Scores every usable candidate and sorts by ascending distance.
///
/// The sort is stable, so ties stay in retrieval order.
#[must_use]
pub fn rank(origin: Position, candidates: Vec<CommunityRecord>) -> Vec<RecommendedCommunity> {
    let mut scored: Vec<RecommendedCommunity> = candidates
        .into_iter()
        .filter_map(|community| score(origin, community))
        .collect();
    scored.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    scored
}

fn score(origin: Position, community: CommunityRecord) -> Option<RecommendedCommunity> {
    if !community.is_live() || !community.is_mappable() {
        return None;
    }
    let geometry = community.geometry?;

    let centroid = match centroid_of(&geometry) {
        Ok(centroid) => centroid,
        Err(e) => {
            log::warn!("Skipping community {} with unusable geometry: {e}", community.id);
            return None;
        }
    };

    let distance_km = haversine_km(origin, centroid);
    if !distance_km.is_finite() {
        log::warn!(
            "Skipping community {} with non-finite distance",
            community.id
        );
        return None;
    }

    Some(RecommendedCommunity {
        id: community.id,
        name: community.name,
        region_id: community.region_id,
        neighborhood_id: community.neighborhood_id,
        distance_km,
        geometry: to_geojson(&geometry),
    })
}
