#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Community record, filter, and API types.
//!
//! Record types mirror what the persistence layer returns. Request and
//! response types are serialized as camelCase JSON and are kept separate
//! from the records so the API contract can evolve on its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A community as stored.
///
/// `geometry` is the raw stored boundary, either a tagged `GeoJSON`
/// geometry or a bare coordinate array. `None` means the community is not
/// mappable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityRecord {
    /// Primary key.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: Option<String>,
    /// Single free-text category.
    pub category: Option<String>,
    /// Names from the associated category collection.
    pub categories: Vec<String>,
    /// Stored boundary geometry.
    pub geometry: Option<Value>,
    /// Neighborhood the community is bound to.
    pub neighborhood_id: Option<i64>,
    /// Region (municipality) that contains the neighborhood.
    pub region_id: Option<i64>,
    /// Region display name.
    pub region_name: Option<String>,
    /// Account that created the community.
    pub creator_id: i64,
    /// Active flag.
    pub is_active: bool,
    /// Soft-delete timestamp.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl CommunityRecord {
    /// Whether the community is active and not soft-deleted.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }

    /// Whether the community has a stored boundary.
    ///
    /// A JSON `null` counts as no boundary.
    #[must_use]
    pub fn is_mappable(&self) -> bool {
        self.geometry.as_ref().is_some_and(|g| !g.is_null())
    }
}

/// A membership of an account in a community.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipRecord {
    /// Primary key.
    pub id: i64,
    /// Community the account belongs to.
    pub community_id: i64,
    /// Member account.
    pub account_id: i64,
    /// Active flag.
    pub is_active: bool,
    /// Soft-delete timestamp.
    pub deleted_at: Option<DateTime<Utc>>,
    /// When the membership was first created.
    pub created_at: DateTime<Utc>,
}

impl MembershipRecord {
    /// Whether the membership is active and not soft-deleted.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }
}

/// Narrowing criteria for recommendation candidates.
///
/// The base restriction (live, mappable) always applies; these fields
/// narrow it further. `category` is compared case-insensitively against
/// the single category field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateFilter {
    /// Region (municipality) ID.
    pub region_id: Option<i64>,
    /// Neighborhood ID.
    pub neighborhood_id: Option<i64>,
    /// Creator account ID.
    pub creator_id: Option<i64>,
    /// Category name.
    pub category: Option<String>,
}

/// Narrowing criteria for map feature pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapFilter {
    /// Region (municipality) ID.
    pub region_id: Option<i64>,
    /// Neighborhood ID.
    pub neighborhood_id: Option<i64>,
    /// Creator account ID.
    pub creator_id: Option<i64>,
    /// Case-insensitive substring of the community name, already trimmed.
    pub name: Option<String>,
    /// Category names. A community matches if its single category field or
    /// any entry of its category collection equals one of these,
    /// case-insensitively. Empty means no category filter.
    pub categories: Vec<String>,
}

/// Input for the recommendation operation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendRequest {
    /// Query geometry (Point, Polygon or `MultiPolygon`).
    #[serde(default)]
    pub geometry: Option<Value>,
    /// Number of results wanted. Floored and clamped to `[1, 100]`.
    pub k: Option<f64>,
    /// Region (municipality) ID filter.
    pub region_id: Option<i64>,
    /// Neighborhood ID filter.
    pub neighborhood_id: Option<i64>,
    /// Creator account ID filter.
    pub creator_id: Option<i64>,
    /// Category filter (case-insensitive).
    pub category: Option<String>,
}

/// A community ranked by distance from the query geometry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedCommunity {
    /// Community ID.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Region (municipality) ID.
    pub region_id: Option<i64>,
    /// Neighborhood ID.
    pub neighborhood_id: Option<i64>,
    /// Great-circle distance between centroids, in kilometres.
    pub distance_km: f64,
    /// Stored boundary, as stored.
    pub geometry: Value,
}

/// Input for the map feature operation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapRequest {
    /// Region (municipality) ID filter.
    pub region_id: Option<i64>,
    /// Neighborhood ID filter.
    pub neighborhood_id: Option<i64>,
    /// Creator account ID filter.
    pub creator_id: Option<i64>,
    /// Case-insensitive name substring.
    pub name: Option<String>,
    /// Page size. Defaults to 100, clamped to `[1, 1000]`.
    pub limit: Option<i64>,
    /// ID of the last community of the previous page.
    pub cursor: Option<String>,
    /// Category names (OR-matched).
    #[serde(default)]
    pub categories: Vec<String>,
    /// Authenticated caller, if any. Supplied by the identity layer, never
    /// by the query string.
    #[serde(skip)]
    pub caller_id: Option<i64>,
}

/// `GeoJSON` feature type tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureType {
    /// Always `"Feature"`.
    #[default]
    Feature,
}

/// A community as a map-ready `GeoJSON` feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapFeature {
    /// Feature type tag.
    #[serde(rename = "type")]
    pub feature_type: FeatureType,
    /// Feature properties.
    pub properties: MapFeatureProperties,
    /// Tagged `GeoJSON` geometry.
    pub geometry: Value,
}

/// Properties attached to each map feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapFeatureProperties {
    /// Community ID.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Region (municipality) name.
    pub region: Option<String>,
    /// Neighborhood ID.
    pub neighborhood_id: Option<i64>,
    /// Single free-text category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Caller relationship flags, only present for authenticated callers.
    #[serde(flatten)]
    pub caller: Option<CallerRelation>,
}

/// How the authenticated caller relates to a community.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerRelation {
    /// Caller created the community.
    pub caller_is_creator: bool,
    /// Caller holds an active membership.
    pub caller_is_member: bool,
    /// Caller is neither creator nor member.
    pub caller_can_join: bool,
}

impl CallerRelation {
    /// Builds the flags, deriving `caller_can_join` from the other two.
    #[must_use]
    pub const fn new(is_creator: bool, is_member: bool) -> Self {
        Self {
            caller_is_creator: is_creator,
            caller_is_member: is_member,
            caller_can_join: !(is_creator || is_member),
        }
    }
}

/// One page of map features.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapFeaturePage {
    /// Features on this page, ordered by ID.
    pub data: Vec<MapFeature>,
    /// Cursor for the next page (`null` on the last page).
    pub next_cursor: Option<String>,
    /// Whether another page exists.
    pub has_more: bool,
    /// Number of features on this page.
    pub count: usize,
}

/// A single community with its map feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityDetail {
    /// Community ID.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: Option<String>,
    /// Single free-text category.
    pub category: Option<String>,
    /// Category collection names.
    pub categories: Vec<String>,
    /// Creator account ID.
    pub creator_id: i64,
    /// Map feature, including caller flags when authenticated.
    pub feature: MapFeature,
}

/// Result of joining a community.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStatus {
    /// A new membership was created.
    Created,
    /// A previously inactive membership was reactivated.
    Reactivated,
}

/// Outcome of a successful join.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOutcome {
    /// Whether the membership is new or reactivated.
    pub status: JoinStatus,
    /// The resulting membership.
    pub membership: MembershipRecord,
}

/// Input for creating a community.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommunityRequest {
    /// Display name. Trimmed; must not be empty.
    pub name: String,
    /// Free-text description.
    pub description: Option<String>,
    /// Single free-text category.
    pub category: Option<String>,
    /// Boundary geometry (Point, Polygon or `MultiPolygon`).
    #[serde(default)]
    pub geometry: Option<Value>,
    /// Neighborhood the community is bound to.
    pub neighborhood_id: Option<i64>,
    /// Creator account. Defaults to the caller.
    pub creator_id: Option<i64>,
    /// IDs of categories to associate.
    #[serde(default)]
    pub category_ids: Vec<i64>,
}

/// A validated community ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCommunity {
    /// Display name, trimmed.
    pub name: String,
    /// Free-text description.
    pub description: Option<String>,
    /// Single free-text category.
    pub category: Option<String>,
    /// Boundary geometry, already checked to be usable.
    pub geometry: Option<Value>,
    /// Neighborhood the community is bound to.
    pub neighborhood_id: Option<i64>,
    /// Creator account.
    pub creator_id: i64,
    /// IDs of categories to associate.
    pub category_ids: Vec<i64>,
}

/// Partial update of a community. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityPatch {
    /// New display name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New single category.
    pub category: Option<String>,
    /// New boundary geometry.
    #[serde(default)]
    pub geometry: Option<Value>,
    /// New neighborhood.
    pub neighborhood_id: Option<i64>,
    /// Replacement set of category IDs.
    pub category_ids: Option<Vec<i64>>,
}

impl CommunityPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.geometry.is_none()
            && self.neighborhood_id.is_none()
            && self.category_ids.is_none()
    }
}

/// Narrowing criteria for the plain community listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilter {
    /// Neighborhood ID.
    pub neighborhood_id: Option<i64>,
    /// Creator account ID.
    pub creator_id: Option<i64>,
    /// Case-insensitive name substring.
    pub name: Option<String>,
}

/// ID and name of a live community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunitySummary {
    /// Community ID.
    pub id: i64,
    /// Display name.
    pub name: String,
}

/// Listing metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ListMeta {
    /// Number of communities matching the filter.
    pub total: usize,
}

/// Community listing with its total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommunityList {
    /// Matching communities, newest first.
    pub data: Vec<CommunitySummary>,
    /// Listing metadata.
    pub meta: ListMeta,
}
