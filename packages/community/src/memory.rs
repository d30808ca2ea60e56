//! In-memory [`CommunityStore`] for tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use civic_map_community_models::{
    CandidateFilter, CommunityPatch, CommunityRecord, CommunitySummary, ListFilter, MapFilter,
    MembershipRecord, NewCommunity,
};
use serde_json::Value;

use crate::{CommunityError, CommunityStore};

#[derive(Default)]
pub struct MemoryStore {
    communities: Mutex<Vec<CommunityRecord>>,
    memberships: Mutex<Vec<MembershipRecord>>,
    category_names: BTreeMap<i64, String>,
    pub membership_lookups: AtomicUsize,
}

impl MemoryStore {
    pub fn new(communities: Vec<CommunityRecord>) -> Self {
        Self {
            communities: Mutex::new(communities),
            ..Self::default()
        }
    }

    pub fn with_membership(self, community_id: i64, account_id: i64, active: bool) -> Self {
        {
            let mut memberships = self.memberships.lock().unwrap();
            let id = i64::try_from(memberships.len()).unwrap() + 1;
            memberships.push(MembershipRecord {
                id,
                community_id,
                account_id,
                is_active: active,
                deleted_at: (!active).then(chrono::Utc::now),
                created_at: chrono::Utc::now(),
            });
        }
        self
    }

    pub fn with_category(mut self, id: i64, name: &str) -> Self {
        self.category_names.insert(id, name.to_string());
        self
    }

    pub fn get(&self, id: i64) -> Option<CommunityRecord> {
        self.communities
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    fn category_names(&self, ids: &[i64]) -> Result<Vec<String>, CommunityError> {
        let mut names = ids
            .iter()
            .map(|id| {
                self.category_names
                    .get(id)
                    .cloned()
                    .ok_or_else(|| CommunityError::Store(format!("unknown category {id}").into()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        names.sort();
        names.dedup();
        Ok(names)
    }

    pub fn lookups(&self) -> usize {
        self.membership_lookups.load(Ordering::SeqCst)
    }

    fn live_mappable(&self) -> Vec<CommunityRecord> {
        let mut rows: Vec<CommunityRecord> = self
            .communities
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.is_live() && c.is_mappable())
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.id);
        rows
    }
}

/// Builds a live community in region 1 / neighborhood 10, created by
/// account 100.
pub fn community(id: i64, geometry: Option<Value>) -> CommunityRecord {
    CommunityRecord {
        id,
        name: format!("Comunidad {id}"),
        description: None,
        category: None,
        categories: Vec::new(),
        geometry,
        neighborhood_id: Some(10),
        region_id: Some(1),
        region_name: Some("Guadalajara".to_string()),
        creator_id: 100,
        is_active: true,
        deleted_at: None,
    }
}

/// A tagged point geometry.
pub fn point(lng: f64, lat: f64) -> Option<Value> {
    Some(serde_json::json!({"type": "Point", "coordinates": [lng, lat]}))
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

fn matches_ids(
    c: &CommunityRecord,
    region_id: Option<i64>,
    neighborhood_id: Option<i64>,
    creator_id: Option<i64>,
) -> bool {
    region_id.is_none_or(|id| c.region_id == Some(id))
        && neighborhood_id.is_none_or(|id| c.neighborhood_id == Some(id))
        && creator_id.is_none_or(|id| c.creator_id == id)
}

#[async_trait]
impl CommunityStore for MemoryStore {
    async fn find_candidates(
        &self,
        filter: &CandidateFilter,
    ) -> Result<Vec<CommunityRecord>, CommunityError> {
        Ok(self
            .live_mappable()
            .into_iter()
            .filter(|c| matches_ids(c, filter.region_id, filter.neighborhood_id, filter.creator_id))
            .filter(|c| {
                filter.category.as_deref().is_none_or(|wanted| {
                    c.category
                        .as_deref()
                        .is_some_and(|category| eq_ignore_case(category, wanted))
                })
            })
            .collect())
    }

    async fn find_map_page(
        &self,
        filter: &MapFilter,
        after_id: Option<i64>,
        take: usize,
    ) -> Result<Vec<CommunityRecord>, CommunityError> {
        Ok(self
            .live_mappable()
            .into_iter()
            .filter(|c| after_id.is_none_or(|after| c.id > after))
            .filter(|c| matches_ids(c, filter.region_id, filter.neighborhood_id, filter.creator_id))
            .filter(|c| {
                filter.name.as_deref().is_none_or(|name| {
                    c.name.to_lowercase().contains(&name.to_lowercase())
                })
            })
            .filter(|c| {
                filter.categories.is_empty()
                    || filter.categories.iter().any(|wanted| {
                        c.category
                            .as_deref()
                            .is_some_and(|category| eq_ignore_case(category, wanted))
                            || c.categories.iter().any(|name| eq_ignore_case(name, wanted))
                    })
            })
            .take(take)
            .collect())
    }

    async fn active_memberships(
        &self,
        account_id: i64,
        community_ids: &[i64],
    ) -> Result<BTreeSet<i64>, CommunityError> {
        self.membership_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .memberships
            .lock()
            .unwrap()
            .iter()
            .filter(|m| {
                m.account_id == account_id && m.is_live() && community_ids.contains(&m.community_id)
            })
            .map(|m| m.community_id)
            .collect())
    }

    async fn find_live(&self, id: i64) -> Result<Option<CommunityRecord>, CommunityError> {
        Ok(self
            .communities
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id && c.is_live())
            .cloned())
    }

    async fn find_membership(
        &self,
        community_id: i64,
        account_id: i64,
    ) -> Result<Option<MembershipRecord>, CommunityError> {
        Ok(self
            .memberships
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.community_id == community_id && m.account_id == account_id)
            .cloned())
    }

    async fn create_membership(
        &self,
        community_id: i64,
        account_id: i64,
    ) -> Result<MembershipRecord, CommunityError> {
        let mut memberships = self.memberships.lock().unwrap();
        let membership = MembershipRecord {
            id: i64::try_from(memberships.len()).unwrap() + 1,
            community_id,
            account_id,
            is_active: true,
            deleted_at: None,
            created_at: chrono::Utc::now(),
        };
        memberships.push(membership.clone());
        Ok(membership)
    }

    async fn reactivate_membership(
        &self,
        membership_id: i64,
    ) -> Result<MembershipRecord, CommunityError> {
        let mut memberships = self.memberships.lock().unwrap();
        let membership = memberships
            .iter_mut()
            .find(|m| m.id == membership_id)
            .ok_or_else(|| CommunityError::Store("membership vanished".into()))?;
        membership.is_active = true;
        membership.deleted_at = None;
        Ok(membership.clone())
    }

    async fn soft_delete(&self, id: i64) -> Result<CommunityRecord, CommunityError> {
        let mut communities = self.communities.lock().unwrap();
        let community = communities
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(CommunityError::NotFound { id })?;
        community.is_active = false;
        community.deleted_at = Some(chrono::Utc::now());
        Ok(community.clone())
    }

    async fn insert_community(
        &self,
        community: &NewCommunity,
    ) -> Result<CommunityRecord, CommunityError> {
        let categories = self.category_names(&community.category_ids)?;
        let mut communities = self.communities.lock().unwrap();
        let id = communities.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        let record = CommunityRecord {
            id,
            name: community.name.clone(),
            description: community.description.clone(),
            category: community.category.clone(),
            categories,
            geometry: community.geometry.clone(),
            neighborhood_id: community.neighborhood_id,
            region_id: community.neighborhood_id.map(|_| 1),
            region_name: community.neighborhood_id.map(|_| "Guadalajara".to_string()),
            creator_id: community.creator_id,
            is_active: true,
            deleted_at: None,
        };
        communities.push(record.clone());
        Ok(record)
    }

    async fn update_community(
        &self,
        id: i64,
        patch: &CommunityPatch,
    ) -> Result<CommunityRecord, CommunityError> {
        let categories = patch
            .category_ids
            .as_deref()
            .map(|ids| self.category_names(ids))
            .transpose()?;
        let mut communities = self.communities.lock().unwrap();
        let community = communities
            .iter_mut()
            .find(|c| c.id == id && c.is_live())
            .ok_or(CommunityError::NotFound { id })?;
        if let Some(name) = &patch.name {
            community.name.clone_from(name);
        }
        if let Some(description) = &patch.description {
            community.description = Some(description.clone());
        }
        if let Some(category) = &patch.category {
            community.category = Some(category.clone());
        }
        if let Some(geometry) = &patch.geometry {
            community.geometry = Some(geometry.clone());
        }
        if let Some(neighborhood_id) = patch.neighborhood_id {
            community.neighborhood_id = Some(neighborhood_id);
        }
        if let Some(categories) = categories {
            community.categories = categories;
        }
        Ok(community.clone())
    }

    async fn list_summaries(
        &self,
        filter: &ListFilter,
    ) -> Result<Vec<CommunitySummary>, CommunityError> {
        let mut rows: Vec<CommunitySummary> = self
            .communities
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.is_live())
            .filter(|c| matches_ids(c, None, filter.neighborhood_id, filter.creator_id))
            .filter(|c| {
                filter.name.as_deref().is_none_or(|name| {
                    c.name.to_lowercase().contains(&name.to_lowercase())
                })
            })
            .map(|c| CommunitySummary {
                id: c.id,
                name: c.name.clone(),
            })
            .collect();
        rows.sort_by_key(|c| std::cmp::Reverse(c.id));
        Ok(rows)
    }
}

/// A store whose every call fails, for error propagation tests.
pub struct FailingStore;

fn offline() -> CommunityError {
    CommunityError::Store("database offline".into())
}

#[async_trait]
impl CommunityStore for FailingStore {
    async fn find_candidates(
        &self,
        _filter: &CandidateFilter,
    ) -> Result<Vec<CommunityRecord>, CommunityError> {
        Err(offline())
    }

    async fn find_map_page(
        &self,
        _filter: &MapFilter,
        _after_id: Option<i64>,
        _take: usize,
    ) -> Result<Vec<CommunityRecord>, CommunityError> {
        Err(offline())
    }

    async fn active_memberships(
        &self,
        _account_id: i64,
        _community_ids: &[i64],
    ) -> Result<BTreeSet<i64>, CommunityError> {
        Err(offline())
    }

    async fn find_live(&self, _id: i64) -> Result<Option<CommunityRecord>, CommunityError> {
        Err(offline())
    }

    async fn find_membership(
        &self,
        _community_id: i64,
        _account_id: i64,
    ) -> Result<Option<MembershipRecord>, CommunityError> {
        Err(offline())
    }

    async fn create_membership(
        &self,
        _community_id: i64,
        _account_id: i64,
    ) -> Result<MembershipRecord, CommunityError> {
        Err(offline())
    }

    async fn reactivate_membership(
        &self,
        _membership_id: i64,
    ) -> Result<MembershipRecord, CommunityError> {
        Err(offline())
    }

    async fn soft_delete(&self, _id: i64) -> Result<CommunityRecord, CommunityError> {
        Err(offline())
    }

    async fn insert_community(
        &self,
        _community: &NewCommunity,
    ) -> Result<CommunityRecord, CommunityError> {
        Err(offline())
    }

    async fn update_community(
        &self,
        _id: i64,
        _patch: &CommunityPatch,
    ) -> Result<CommunityRecord, CommunityError> {
        Err(offline())
    }

    async fn list_summaries(
        &self,
        _filter: &ListFilter,
    ) -> Result<Vec<CommunitySummary>, CommunityError> {
        Err(offline())
    }
}
