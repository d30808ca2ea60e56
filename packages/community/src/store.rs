//! Persistence interface consumed by the community operations.

use std::collections::BTreeSet;

use async_trait::async_trait;
use civic_map_community_models::{
    CandidateFilter, CommunityPatch, CommunityRecord, CommunitySummary, ListFilter, MapFilter,
    MembershipRecord, NewCommunity,
};

use crate::CommunityError;

/// Read and write access to communities and memberships.
///
/// Every query that feeds a geo operation returns only live (active, not
/// soft-deleted) communities with a non-null geometry, ordered by ID.
/// Implementations own retries; callers surface any error as
/// [`CommunityError::Store`].
#[async_trait]
pub trait CommunityStore: Send + Sync {
    /// All live, mappable communities matching `filter`, ordered by ID.
    async fn find_candidates(
        &self,
        filter: &CandidateFilter,
    ) -> Result<Vec<CommunityRecord>, CommunityError>;

    /// Up to `take` live, mappable communities matching `filter` whose ID
    /// is strictly greater than `after_id`, ordered by ID.
    async fn find_map_page(
        &self,
        filter: &MapFilter,
        after_id: Option<i64>,
        take: usize,
    ) -> Result<Vec<CommunityRecord>, CommunityError>;

    /// The subset of `community_ids` in which `account_id` holds a live
    /// membership, fetched in one query.
    async fn active_memberships(
        &self,
        account_id: i64,
        community_ids: &[i64],
    ) -> Result<BTreeSet<i64>, CommunityError>;

    /// A live community by ID, with or without geometry.
    async fn find_live(&self, id: i64) -> Result<Option<CommunityRecord>, CommunityError>;

    /// The membership row for an account in a community, in any state.
    async fn find_membership(
        &self,
        community_id: i64,
        account_id: i64,
    ) -> Result<Option<MembershipRecord>, CommunityError>;

    /// Inserts a new active membership.
    async fn create_membership(
        &self,
        community_id: i64,
        account_id: i64,
    ) -> Result<MembershipRecord, CommunityError>;

    /// Marks an existing membership active again and clears its deletion
    /// timestamp.
    async fn reactivate_membership(
        &self,
        membership_id: i64,
    ) -> Result<MembershipRecord, CommunityError>;

    /// Deactivates a community and stamps its deletion time.
    async fn soft_delete(&self, id: i64) -> Result<CommunityRecord, CommunityError>;

    /// Inserts a community with its category associations.
    async fn insert_community(
        &self,
        community: &NewCommunity,
    ) -> Result<CommunityRecord, CommunityError>;

    /// Applies `patch` to a live community. A `Some` category list replaces
    /// the existing associations.
    async fn update_community(
        &self,
        id: i64,
        patch: &CommunityPatch,
    ) -> Result<CommunityRecord, CommunityError>;

    /// Live communities matching `filter`, newest first. Geometry is not
    /// required.
    async fn list_summaries(
        &self,
        filter: &ListFilter,
    ) -> Result<Vec<CommunitySummary>, CommunityError>;
}
