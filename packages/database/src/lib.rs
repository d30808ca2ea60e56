#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Database connection, queries, and migrations for civic map.
//!
//! Uses `switchy_database` raw parameterized SQL against `PostgreSQL` and
//! `switchy_schema` for embedded SQL migrations. Community boundaries live
//! in a `JSONB` column and are handed to the community core untouched.

pub mod db;
pub mod queries;
pub mod store;

pub use store::DatabaseCommunityStore;

use civic_map_community::CommunityError;
use include_dir::{Dir, include_dir};
use switchy_database::Database;
use switchy_schema::discovery::embedded::EmbeddedMigrationSource;
use switchy_schema::runner::MigrationRunner;

/// Embedded SQL migrations from the `migrations/` directory.
static MIGRATIONS_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/../../migrations");

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] switchy_schema::MigrationError),

    /// Stored JSON could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

impl From<DbError> for CommunityError {
    fn from(e: DbError) -> Self {
        log::error!("Community store query failed: {e}");
        Self::Store(Box::new(e))
    }
}

/// Runs all pending database migrations.
///
/// # Errors
///
/// Returns [`DbError`] if any migration fails to apply.
pub async fn run_migrations(db: &dyn Database) -> Result<(), DbError> {
    let source = EmbeddedMigrationSource::new(&MIGRATIONS_DIR);
    let runner = MigrationRunner::new(Box::new(source));
    runner.run(db).await?;
    log::info!("Database migrations completed successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn store_error_keeps_database_error() {
        let err = CommunityError::from(DbError::Conversion {
            message: "bad is_active".to_string(),
        });

        let CommunityError::Store(inner) = &err else {
            panic!("expected Store, got {err:?}");
        };
        assert!(matches!(
            inner.downcast_ref::<DbError>(),
            Some(DbError::Conversion { message }) if message == "bad is_active"
        ));

        let source = err.source().expect("Store exposes its source");
        assert!(source.downcast_ref::<DbError>().is_some());
    }
}
