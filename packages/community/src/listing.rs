//! Plain community listings, without geometry.

use civic_map_community_models::{CommunityList, CommunitySummary, ListFilter, ListMeta};

use crate::{CommunityError, CommunityStore};

/// Lists live communities, newest first.
///
/// The name filter is trimmed and matched case-insensitively as a
/// substring; a blank name is ignored.
///
/// # Errors
///
/// Returns [`CommunityError::Store`] if the store call fails.
pub async fn list(
    store: &dyn CommunityStore,
    filter: &ListFilter,
) -> Result<Vec<CommunitySummary>, CommunityError> {
    let filter = ListFilter {
        name: filter
            .name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        ..filter.clone()
    };
    store.list_summaries(&filter).await
}

/// Same as [`list`], with the number of matches under `meta.total`.
///
/// # Errors
///
/// Returns [`CommunityError::Store`] if the store call fails.
pub async fn list_with_total(
    store: &dyn CommunityStore,
    filter: &ListFilter,
) -> Result<CommunityList, CommunityError> {
    let data = list(store, filter).await?;
    Ok(CommunityList {
        meta: ListMeta { total: data.len() },
        data,
    })
}
