use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};
use uuid::Uuid;

use super::fingerprint::Fingerprint;

pub const DAY_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Opaque, stable post identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PostId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PostId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PostId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored post as held by the content snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub markdown: String,
    pub fingerprint: Fingerprint,
    pub created_at: OffsetDateTime,
    pub modified_at: OffsetDateTime,
    pub owner: UserId,
}

impl Post {
    /// A blank post owned by `owner`, stamped with the current time.
    pub fn blank(owner: UserId) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: PostId::generate(),
            title: String::new(),
            markdown: String::new(),
            fingerprint: Fingerprint::empty(),
            created_at: now,
            modified_at: now,
            owner,
        }
    }

    /// Recompute the fingerprint from the current markdown.
    pub fn refresh_fingerprint(&mut self) {
        self.fingerprint = Fingerprint::of(self.markdown.as_bytes());
    }

    /// Placeholder title used when neither the caller nor the front matter supply one.
    pub fn untitled_label(&self) -> String {
        let day = self
            .created_at
            .format(DAY_FORMAT)
            .unwrap_or_else(|_| self.created_at.date().to_string());
        format!("Untitled - {day}")
    }
}

/// Listing view of a post, used by the HTTP surface.
#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    pub id: PostId,
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub modified_at: OffsetDateTime,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            title: post.title.clone(),
            created_at: post.created_at,
            modified_at: post.modified_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn blank_posts_get_unique_ids_and_equal_timestamps() {
        let a = Post::blank(UserId::new("owner"));
        let b = Post::blank(UserId::new("owner"));
        assert_ne!(a.id, b.id);
        assert_eq!(a.created_at, a.modified_at);
        assert!(a.fingerprint.is_empty());
    }

    #[test]
    fn untitled_label_uses_creation_day() {
        let mut post = Post::blank(UserId::new("owner"));
        post.created_at = datetime!(2024-03-09 18:30 UTC);
        assert_eq!(post.untitled_label(), "Untitled - 2024-03-09");
    }

    #[test]
    fn refresh_fingerprint_tracks_markdown() {
        let mut post = Post::blank(UserId::new("owner"));
        post.markdown = "# one".into();
        post.refresh_fingerprint();
        let first = post.fingerprint.clone();
        post.markdown = "# two".into();
        post.refresh_fingerprint();
        assert_ne!(first, post.fingerprint);
    }
}
