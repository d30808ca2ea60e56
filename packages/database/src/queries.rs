//! Database query functions for communities and memberships.
//!
//! All queries use `query_raw_params()` with numbered placeholders. Stored
//! boundaries are `JSONB` and are selected as text so the community core
//! receives the exact stored JSON.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use civic_map_community_models::{
    CandidateFilter, CommunityPatch, CommunityRecord, CommunitySummary, ListFilter, MapFilter,
    MembershipRecord, NewCommunity,
};
use moosicbox_json_utils::database::ToValue as _;
use serde_json::Value;
use switchy_database::{Database, DatabaseValue, Row};

use crate::DbError;

const COMMUNITY_COLUMNS: &str = "SELECT c.id, c.name, c.description, c.category,
        c.geometry::text AS geometry_json,
        COALESCE(
            (SELECT json_agg(cat.name ORDER BY cat.name)::text
             FROM community_categories cc
             JOIN categories cat ON cat.id = cc.category_id
             WHERE cc.community_id = c.id),
            '[]'
        ) AS categories_json,
        c.neighborhood_id, n.region_id, r.name AS region_name,
        c.creator_id, c.is_active,
        (c.deleted_at AT TIME ZONE 'UTC') AS deleted_at
     FROM communities c
     LEFT JOIN neighborhoods n ON n.id = c.neighborhood_id
     LEFT JOIN regions r ON r.id = n.region_id";

/// Live and mappable: active, not soft-deleted, with a non-null boundary.
const LIVE_MAPPABLE: &str = " WHERE c.is_active AND c.deleted_at IS NULL
       AND c.geometry IS NOT NULL AND jsonb_typeof(c.geometry) <> 'null'";

const MEMBERSHIP_COLUMNS: &str = "id, community_id, account_id, is_active,
        (deleted_at AT TIME ZONE 'UTC') AS deleted_at,
        (created_at AT TIME ZONE 'UTC') AS created_at";

/// Accumulates SQL text and its positional parameters.
struct QueryBuilder {
    sql: String,
    params: Vec<DatabaseValue>,
}

impl QueryBuilder {
    fn new(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            params: Vec::new(),
        }
    }

    /// Records `value` and returns its `$n` placeholder.
    fn bind(&mut self, value: DatabaseValue) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    fn push(&mut self, fragment: &str) {
        self.sql.push_str(fragment);
    }

    /// Appends the region, neighborhood, and creator ID filters.
    fn push_id_filters(
        &mut self,
        region_id: Option<i64>,
        neighborhood_id: Option<i64>,
        creator_id: Option<i64>,
    ) {
        if let Some(id) = region_id {
            let p = self.bind(DatabaseValue::Int64(id));
            self.push(&format!(" AND n.region_id = {p}"));
        }
        if let Some(id) = neighborhood_id {
            let p = self.bind(DatabaseValue::Int64(id));
            self.push(&format!(" AND c.neighborhood_id = {p}"));
        }
        if let Some(id) = creator_id {
            let p = self.bind(DatabaseValue::Int64(id));
            self.push(&format!(" AND c.creator_id = {p}"));
        }
    }

    async fn fetch(self, db: &dyn Database) -> Result<Vec<Row>, DbError> {
        Ok(db.query_raw_params(&self.sql, &self.params).await?)
    }
}

fn conversion<E: std::fmt::Display>(column: &str) -> impl Fn(E) -> DbError + '_ {
    move |e| DbError::Conversion {
        message: format!("Failed to parse {column}: {e}"),
    }
}

fn to_utc(naive: Option<NaiveDateTime>) -> Option<DateTime<Utc>> {
    naive.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
}

/// Escapes `LIKE` wildcards so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn community_from_row(row: &Row) -> Result<CommunityRecord, DbError> {
    let geometry_json: Option<String> = row.to_value("geometry_json").unwrap_or(None);
    let geometry = geometry_json
        .map(|text| serde_json::from_str::<Value>(&text))
        .transpose()?;

    let categories_json: String = row.to_value("categories_json").unwrap_or_default();
    let categories: Vec<String> = if categories_json.is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(&categories_json)?
    };

    let deleted_at: Option<NaiveDateTime> = row.to_value("deleted_at").unwrap_or(None);

    Ok(CommunityRecord {
        id: row.to_value("id").map_err(conversion("community id"))?,
        name: row.to_value("name").map_err(conversion("community name"))?,
        description: row.to_value("description").unwrap_or(None),
        category: row.to_value("category").unwrap_or(None),
        categories,
        geometry,
        neighborhood_id: row.to_value("neighborhood_id").unwrap_or(None),
        region_id: row.to_value("region_id").unwrap_or(None),
        region_name: row.to_value("region_name").unwrap_or(None),
        creator_id: row.to_value("creator_id").map_err(conversion("creator_id"))?,
        is_active: row.to_value("is_active").map_err(conversion("is_active"))?,
        deleted_at: to_utc(deleted_at),
    })
}

fn membership_from_row(row: &Row) -> Result<MembershipRecord, DbError> {
    let deleted_at: Option<NaiveDateTime> = row.to_value("deleted_at").unwrap_or(None);
    let created_at: NaiveDateTime = row
        .to_value("created_at")
        .map_err(conversion("membership created_at"))?;

    Ok(MembershipRecord {
        id: row.to_value("id").map_err(conversion("membership id"))?,
        community_id: row.to_value("community_id").map_err(conversion("community_id"))?,
        account_id: row.to_value("account_id").map_err(conversion("account_id"))?,
        is_active: row.to_value("is_active").map_err(conversion("is_active"))?,
        deleted_at: to_utc(deleted_at),
        created_at: DateTime::from_naive_utc_and_offset(created_at, Utc),
    })
}

fn first_membership(rows: &[Row], action: &str) -> Result<MembershipRecord, DbError> {
    let row = rows.first().ok_or_else(|| DbError::Conversion {
        message: format!("No membership row returned from {action}"),
    })?;
    membership_from_row(row)
}

/// Loads every live, mappable community that satisfies `filter`, ordered by
/// ID.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row cannot be converted.
pub async fn find_candidates(
    db: &dyn Database,
    filter: &CandidateFilter,
) -> Result<Vec<CommunityRecord>, DbError> {
    let mut query = QueryBuilder::new(COMMUNITY_COLUMNS);
    query.push(LIVE_MAPPABLE);
    query.push_id_filters(filter.region_id, filter.neighborhood_id, filter.creator_id);

    if let Some(category) = &filter.category {
        let p = query.bind(DatabaseValue::String(category.to_lowercase()));
        query.push(&format!(" AND LOWER(c.category) = {p}"));
    }

    query.push(" ORDER BY c.id");

    let rows = query.fetch(db).await?;
    log::debug!("Loaded {} recommendation candidates", rows.len());
    rows.iter().map(community_from_row).collect()
}

/// Loads up to `take` live, mappable communities with IDs greater than
/// `after_id`, ordered by ID.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row cannot be converted.
pub async fn find_map_page(
    db: &dyn Database,
    filter: &MapFilter,
    after_id: Option<i64>,
    take: usize,
) -> Result<Vec<CommunityRecord>, DbError> {
    let mut query = QueryBuilder::new(COMMUNITY_COLUMNS);
    query.push(LIVE_MAPPABLE);
    query.push_id_filters(filter.region_id, filter.neighborhood_id, filter.creator_id);

    if let Some(name) = &filter.name {
        let p = query.bind(DatabaseValue::String(format!("%{}%", escape_like(name))));
        query.push(&format!(" AND c.name ILIKE {p}"));
    }

    if !filter.categories.is_empty() {
        let placeholders: Vec<String> = filter
            .categories
            .iter()
            .map(|name| query.bind(DatabaseValue::String(name.to_lowercase())))
            .collect();
        let list = placeholders.join(", ");
        query.push(&format!(
            " AND (LOWER(c.category) IN ({list})
                   OR EXISTS (
                       SELECT 1 FROM community_categories cc
                       JOIN categories cat ON cat.id = cc.category_id
                       WHERE cc.community_id = c.id AND LOWER(cat.name) IN ({list})))"
        ));
    }

    if let Some(after) = after_id {
        let p = query.bind(DatabaseValue::Int64(after));
        query.push(&format!(" AND c.id > {p}"));
    }

    let limit = i64::try_from(take).unwrap_or(i64::MAX);
    let p = query.bind(DatabaseValue::Int64(limit));
    query.push(&format!(" ORDER BY c.id LIMIT {p}"));

    let rows = query.fetch(db).await?;
    rows.iter().map(community_from_row).collect()
}

/// Returns the subset of `community_ids` in which `account_id` holds an
/// active membership, using a single query.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn active_memberships(
    db: &dyn Database,
    account_id: i64,
    community_ids: &[i64],
) -> Result<BTreeSet<i64>, DbError> {
    if community_ids.is_empty() {
        return Ok(BTreeSet::new());
    }

    let mut query = QueryBuilder::new("SELECT community_id FROM community_members WHERE is_active AND deleted_at IS NULL");
    let p = query.bind(DatabaseValue::Int64(account_id));
    query.push(&format!(" AND account_id = {p}"));

    let placeholders: Vec<String> = community_ids
        .iter()
        .map(|&id| query.bind(DatabaseValue::Int64(id)))
        .collect();
    query.push(&format!(" AND community_id IN ({})", placeholders.join(", ")));

    let rows = query.fetch(db).await?;
    rows.iter()
        .map(|row| {
            row.to_value::<i64>("community_id")
                .map_err(conversion("community_id"))
        })
        .collect()
}

/// Loads a community by ID if it is live. The boundary may be absent.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or the row cannot be converted.
pub async fn find_live(db: &dyn Database, id: i64) -> Result<Option<CommunityRecord>, DbError> {
    let mut query = QueryBuilder::new(COMMUNITY_COLUMNS);
    let p = query.bind(DatabaseValue::Int64(id));
    query.push(&format!(
        " WHERE c.id = {p} AND c.is_active AND c.deleted_at IS NULL"
    ));

    let rows = query.fetch(db).await?;
    rows.first().map(community_from_row).transpose()
}

/// Loads the membership of `account_id` in `community_id`, live or not.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or the row cannot be converted.
pub async fn find_membership(
    db: &dyn Database,
    community_id: i64,
    account_id: i64,
) -> Result<Option<MembershipRecord>, DbError> {
    let rows = db
        .query_raw_params(
            &format!(
                "SELECT {MEMBERSHIP_COLUMNS} FROM community_members
                 WHERE community_id = $1 AND account_id = $2
                 ORDER BY id LIMIT 1"
            ),
            &[
                DatabaseValue::Int64(community_id),
                DatabaseValue::Int64(account_id),
            ],
        )
        .await?;

    rows.first().map(membership_from_row).transpose()
}

/// Inserts a new active membership.
///
/// # Errors
///
/// Returns [`DbError`] if the insert fails.
pub async fn create_membership(
    db: &dyn Database,
    community_id: i64,
    account_id: i64,
) -> Result<MembershipRecord, DbError> {
    let rows = db
        .query_raw_params(
            &format!(
                "INSERT INTO community_members (community_id, account_id)
                 VALUES ($1, $2)
                 RETURNING {MEMBERSHIP_COLUMNS}"
            ),
            &[
                DatabaseValue::Int64(community_id),
                DatabaseValue::Int64(account_id),
            ],
        )
        .await?;

    first_membership(&rows, "membership insert")
}

/// Marks an existing membership active again and clears its deletion
/// timestamp.
///
/// # Errors
///
/// Returns [`DbError`] if the update fails or the membership is missing.
pub async fn reactivate_membership(
    db: &dyn Database,
    membership_id: i64,
) -> Result<MembershipRecord, DbError> {
    let rows = db
        .query_raw_params(
            &format!(
                "UPDATE community_members
                 SET is_active = TRUE, deleted_at = NULL
                 WHERE id = $1
                 RETURNING {MEMBERSHIP_COLUMNS}"
            ),
            &[DatabaseValue::Int64(membership_id)],
        )
        .await?;

    first_membership(&rows, "membership reactivation")
}

/// Deactivates a community and stamps its deletion time, returning the
/// updated record.
///
/// # Errors
///
/// Returns [`DbError`] if the update fails or the community is missing.
pub async fn soft_delete(db: &dyn Database, id: i64) -> Result<CommunityRecord, DbError> {
    let updated = db
        .exec_raw_params(
            "UPDATE communities
             SET is_active = FALSE, deleted_at = NOW()
             WHERE id = $1",
            &[DatabaseValue::Int64(id)],
        )
        .await?;

    if updated == 0 {
        return Err(DbError::Conversion {
            message: format!("Community {id} disappeared before soft delete"),
        });
    }

    find_by_id(db, id)
        .await?
        .ok_or_else(|| DbError::Conversion {
            message: format!("Community {id} missing after soft delete"),
        })
}

/// Loads a community by ID in any state.
async fn find_by_id(db: &dyn Database, id: i64) -> Result<Option<CommunityRecord>, DbError> {
    let mut query = QueryBuilder::new(COMMUNITY_COLUMNS);
    let p = query.bind(DatabaseValue::Int64(id));
    query.push(&format!(" WHERE c.id = {p}"));

    let rows = query.fetch(db).await?;
    rows.first().map(community_from_row).transpose()
}

fn optional_string(value: Option<&str>) -> DatabaseValue {
    value.map_or(DatabaseValue::Null, |v| DatabaseValue::String(v.to_string()))
}

fn optional_int(value: Option<i64>) -> DatabaseValue {
    value.map_or(DatabaseValue::Null, DatabaseValue::Int64)
}

/// Links `community_id` to each category, ignoring links that already
/// exist.
async fn link_categories(
    db: &dyn Database,
    community_id: i64,
    category_ids: &[i64],
) -> Result<(), DbError> {
    for &category_id in category_ids {
        db.exec_raw_params(
            "INSERT INTO community_categories (community_id, category_id)
             VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
            &[
                DatabaseValue::Int64(community_id),
                DatabaseValue::Int64(category_id),
            ],
        )
        .await?;
    }
    Ok(())
}

/// Inserts a community and its category links, returning the stored
/// record.
///
/// # Errors
///
/// Returns [`DbError`] if an insert fails or the new row cannot be read
/// back.
pub async fn insert_community(
    db: &dyn Database,
    community: &NewCommunity,
) -> Result<CommunityRecord, DbError> {
    let geometry = community
        .geometry
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let rows = db
        .query_raw_params(
            "INSERT INTO communities
                 (name, description, category, geometry, neighborhood_id, creator_id)
             VALUES ($1, $2, $3, $4::text::jsonb, $5, $6)
             RETURNING id",
            &[
                DatabaseValue::String(community.name.clone()),
                optional_string(community.description.as_deref()),
                optional_string(community.category.as_deref()),
                optional_string(geometry.as_deref()),
                optional_int(community.neighborhood_id),
                DatabaseValue::Int64(community.creator_id),
            ],
        )
        .await?;

    let row = rows.first().ok_or_else(|| DbError::Conversion {
        message: "Failed to get community id from insert".to_string(),
    })?;
    let id: i64 = row.to_value("id").map_err(conversion("community id"))?;

    link_categories(db, id, &community.category_ids).await?;

    find_by_id(db, id).await?.ok_or_else(|| DbError::Conversion {
        message: format!("Community {id} missing after insert"),
    })
}

/// Applies `patch` to a live community. Returns `None` if no live
/// community has this ID.
///
/// # Errors
///
/// Returns [`DbError`] if a statement fails or the row cannot be read back.
pub async fn update_community(
    db: &dyn Database,
    id: i64,
    patch: &CommunityPatch,
) -> Result<Option<CommunityRecord>, DbError> {
    let mut query = QueryBuilder::new("UPDATE communities SET ");
    let mut assignments = Vec::new();

    if let Some(name) = &patch.name {
        let p = query.bind(DatabaseValue::String(name.clone()));
        assignments.push(format!("name = {p}"));
    }
    if let Some(description) = &patch.description {
        let p = query.bind(DatabaseValue::String(description.clone()));
        assignments.push(format!("description = {p}"));
    }
    if let Some(category) = &patch.category {
        let p = query.bind(DatabaseValue::String(category.clone()));
        assignments.push(format!("category = {p}"));
    }
    if let Some(geometry) = &patch.geometry {
        let p = query.bind(DatabaseValue::String(serde_json::to_string(geometry)?));
        assignments.push(format!("geometry = {p}::text::jsonb"));
    }
    if let Some(neighborhood_id) = patch.neighborhood_id {
        let p = query.bind(DatabaseValue::Int64(neighborhood_id));
        assignments.push(format!("neighborhood_id = {p}"));
    }

    if assignments.is_empty() {
        if find_live(db, id).await?.is_none() {
            return Ok(None);
        }
    } else {
        query.push(&assignments.join(", "));
        let p = query.bind(DatabaseValue::Int64(id));
        query.push(&format!(
            " WHERE id = {p} AND is_active AND deleted_at IS NULL"
        ));

        let updated = db.exec_raw_params(&query.sql, &query.params).await?;
        if updated == 0 {
            return Ok(None);
        }
    }

    if let Some(category_ids) = &patch.category_ids {
        db.exec_raw_params(
            "DELETE FROM community_categories WHERE community_id = $1",
            &[DatabaseValue::Int64(id)],
        )
        .await?;
        link_categories(db, id, category_ids).await?;
    }

    find_by_id(db, id).await
}

/// Lists live communities matching `filter`, newest first.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row cannot be converted.
pub async fn list_summaries(
    db: &dyn Database,
    filter: &ListFilter,
) -> Result<Vec<CommunitySummary>, DbError> {
    let mut query = QueryBuilder::new(
        "SELECT c.id, c.name FROM communities c
         WHERE c.is_active AND c.deleted_at IS NULL",
    );
    query.push_id_filters(None, filter.neighborhood_id, filter.creator_id);

    if let Some(name) = &filter.name {
        let p = query.bind(DatabaseValue::String(format!("%{}%", escape_like(name))));
        query.push(&format!(" AND c.name ILIKE {p}"));
    }

    query.push(" ORDER BY c.created_at DESC, c.id DESC");

    let rows = query.fetch(db).await?;
    rows.iter()
        .map(|row| {
            Ok(CommunitySummary {
                id: row.to_value("id").map_err(conversion("community id"))?,
                name: row.to_value("name").map_err(conversion("community name"))?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("Colinas"), "Colinas");
    }

    #[test]
    fn builder_numbers_placeholders_in_order() {
        let mut query = QueryBuilder::new(COMMUNITY_COLUMNS);
        query.push(LIVE_MAPPABLE);
        query.push_id_filters(Some(1), None, Some(7));
        let p = query.bind(DatabaseValue::Int64(5));
        query.push(&format!(" AND c.id > {p}"));

        assert_eq!(query.params.len(), 3);
        assert!(query.sql.contains("n.region_id = $1"));
        assert!(query.sql.contains("c.creator_id = $2"));
        assert!(query.sql.ends_with("c.id > $3"));
        assert!(!query.sql.contains("c.neighborhood_id = $"));
    }

    #[test]
    fn utc_conversion_keeps_wall_time() {
        let naive = NaiveDateTime::parse_from_str("2025-03-01 12:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let utc = to_utc(Some(naive)).unwrap();
        assert_eq!(utc.naive_utc(), naive);
        assert!(to_utc(None).is_none());
    }

    fn community_row(is_active: Option<DatabaseValue>) -> Row {
        let mut columns = vec![
            ("id".to_string(), DatabaseValue::Int64(3)),
            ("name".to_string(), DatabaseValue::String("Oblatos".to_string())),
            ("creator_id".to_string(), DatabaseValue::Int64(100)),
        ];
        if let Some(value) = is_active {
            columns.push(("is_active".to_string(), value));
        }
        Row { columns }
    }

    #[test]
    fn community_row_requires_is_active() {
        assert!(matches!(
            community_from_row(&community_row(None)),
            Err(DbError::Conversion { message }) if message.contains("is_active")
        ));

        let record = community_from_row(&community_row(Some(DatabaseValue::Bool(true)))).unwrap();
        assert!(record.is_active);
        assert_eq!(record.name, "Oblatos");
        assert!(record.categories.is_empty());
        assert!(record.geometry.is_none());
    }

    #[test]
    fn optional_values_bind_null() {
        assert!(matches!(optional_int(None), DatabaseValue::Null));
        assert!(matches!(optional_string(None), DatabaseValue::Null));
        assert!(matches!(optional_int(Some(4)), DatabaseValue::Int64(4)));
    }
}
