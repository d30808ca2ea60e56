//! `PostgreSQL`-backed [`CommunityStore`].

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use civic_map_community::{CommunityError, CommunityStore};
use civic_map_community_models::{
    CandidateFilter, CommunityPatch, CommunityRecord, CommunitySummary, ListFilter, MapFilter,
    MembershipRecord, NewCommunity,
};
use switchy_database::Database;

use crate::queries;

/// Community store over a shared database connection.
#[derive(Clone)]
pub struct DatabaseCommunityStore {
    db: Arc<Box<dyn Database>>,
}

impl DatabaseCommunityStore {
    /// Wraps an open connection.
    #[must_use]
    pub fn new(db: Box<dyn Database>) -> Self {
        Self { db: Arc::new(db) }
    }

    /// The underlying connection.
    #[must_use]
    pub fn db(&self) -> &dyn Database {
        self.db.as_ref().as_ref()
    }
}

#[async_trait]
impl CommunityStore for DatabaseCommunityStore {
    async fn find_candidates(
        &self,
        filter: &CandidateFilter,
    ) -> Result<Vec<CommunityRecord>, CommunityError> {
        Ok(queries::find_candidates(self.db(), filter).await?)
    }

    async fn find_map_page(
        &self,
        filter: &MapFilter,
        after_id: Option<i64>,
        take: usize,
    ) -> Result<Vec<CommunityRecord>, CommunityError> {
        Ok(queries::find_map_page(self.db(), filter, after_id, take).await?)
    }

    async fn active_memberships(
        &self,
        account_id: i64,
        community_ids: &[i64],
    ) -> Result<BTreeSet<i64>, CommunityError> {
        Ok(queries::active_memberships(self.db(), account_id, community_ids).await?)
    }

    async fn find_live(&self, id: i64) -> Result<Option<CommunityRecord>, CommunityError> {
        Ok(queries::find_live(self.db(), id).await?)
    }

    async fn find_membership(
        &self,
        community_id: i64,
        account_id: i64,
    ) -> Result<Option<MembershipRecord>, CommunityError> {
        Ok(queries::find_membership(self.db(), community_id, account_id).await?)
    }

    async fn create_membership(
        &self,
        community_id: i64,
        account_id: i64,
    ) -> Result<MembershipRecord, CommunityError> {
        Ok(queries::create_membership(self.db(), community_id, account_id).await?)
    }

    async fn reactivate_membership(
        &self,
        membership_id: i64,
    ) -> Result<MembershipRecord, CommunityError> {
        Ok(queries::reactivate_membership(self.db(), membership_id).await?)
    }

    async fn soft_delete(&self, id: i64) -> Result<CommunityRecord, CommunityError> {
        Ok(queries::soft_delete(self.db(), id).await?)
    }

    async fn insert_community(
        &self,
        community: &NewCommunity,
    ) -> Result<CommunityRecord, CommunityError> {
        Ok(queries::insert_community(self.db(), community).await?)
    }

    async fn update_community(
        &self,
        id: i64,
        patch: &CommunityPatch,
    ) -> Result<CommunityRecord, CommunityError> {
        queries::update_community(self.db(), id, patch)
            .await?
            .ok_or(CommunityError::NotFound { id })
    }

    async fn list_summaries(
        &self,
        filter: &ListFilter,
    ) -> Result<Vec<CommunitySummary>, CommunityError> {
        Ok(queries::list_summaries(self.db(), filter).await?)
    }
}
