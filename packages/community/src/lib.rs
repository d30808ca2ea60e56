#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Community recommendation, map features, listings, and lifecycle.
//!
//! The geo-analysis operations ([`recommend::recommend`] and
//! [`map::map_features`]) read community records through the
//! [`CommunityStore`] trait, compute centroids with `civic_map_geometry`,
//! and return serializable results for whatever transport sits in front.
//! Each call is independent; nothing is cached between requests.

pub mod lifecycle;
pub mod listing;
pub mod map;
pub mod recommend;
pub mod store;

#[cfg(test)]
mod memory;

pub use store::CommunityStore;

use thiserror::Error;

/// Errors returned by community operations.
#[derive(Debug, Error)]
pub enum CommunityError {
    /// The request itself is unusable (missing or invalid geometry, bad
    /// cursor). Not retryable.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of what went wrong.
        message: String,
    },

    /// No active community with this ID.
    #[error("Community not found: {id}")]
    NotFound {
        /// Requested community ID.
        id: i64,
    },

    /// The account already holds an active membership.
    #[error("Already a member of community {community_id}")]
    AlreadyMember {
        /// Community that was joined.
        community_id: i64,
    },

    /// The persistence layer failed. Passed through unchanged.
    #[error("Store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CommunityError {
    /// Builds an [`CommunityError::InvalidInput`].
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}
