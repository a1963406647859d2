//! Backing-store trait used by the content repository.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::posts::{Post, PostId};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("post `{id}` already exists")]
    Duplicate { id: String },
    #[error("post `{id}` not found")]
    NotFound { id: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn not_found(id: &PostId) -> Self {
        Self::NotFound {
            id: id.to_string(),
        }
    }

    pub fn duplicate(id: &PostId) -> Self {
        Self::Duplicate {
            id: id.to_string(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Cheap summary of a store's contents used to skip full reloads.
///
/// Only the newest `modified_at` and the row count are compared. A writer that
/// changes content without moving `modified_at` past the current maximum, or
/// that swaps one post for another, leaves the probe equal and the change is
/// not seen until some later write moves it. Writes through the repository
/// always stamp `modified_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreProbe {
    pub latest_modified: Option<OffsetDateTime>,
    pub count: u64,
}

/// A source of posts the content repository can poll.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Short label for logs, e.g. `postgres` or `filesystem`.
    fn kind(&self) -> &'static str;

    /// Every stored post, fingerprints included, in no particular order.
    async fn list_all(&self) -> Result<Vec<Post>, RepoError>;

    /// Cheap change probe. `None` means the store cannot answer it and every
    /// refresh performs a full load.
    async fn probe(&self) -> Result<Option<StoreProbe>, RepoError> {
        Ok(None)
    }

    async fn insert(&self, post: &Post) -> Result<(), RepoError>;

    async fn update_content(&self, post: &Post) -> Result<(), RepoError>;
}
