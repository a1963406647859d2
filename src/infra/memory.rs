//! Process-local post store. Backs the `memory` backend and the test suite.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::{
    application::repos::{PostStore, RepoError, StoreProbe},
    domain::posts::{Post, PostId},
};

#[derive(Default)]
pub struct MemoryPostStore {
    posts: RwLock<HashMap<PostId, Post>>,
}

impl MemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_posts(posts: impl IntoIterator<Item = Post>) -> Self {
        let posts = posts
            .into_iter()
            .map(|post| (post.id.clone(), post))
            .collect();
        Self {
            posts: RwLock::new(posts),
        }
    }

    /// Insert or overwrite without the duplicate check, as an external writer would.
    pub async fn upsert(&self, post: Post) {
        self.posts.write().await.insert(post.id.clone(), post);
    }

    pub async fn remove(&self, id: &str) -> Option<Post> {
        self.posts.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.posts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.posts.read().await.is_empty()
    }
}

#[async_trait]
impl PostStore for MemoryPostStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn list_all(&self) -> Result<Vec<Post>, RepoError> {
        Ok(self.posts.read().await.values().cloned().collect())
    }

    async fn probe(&self) -> Result<Option<StoreProbe>, RepoError> {
        let posts = self.posts.read().await;
        let latest_modified: Option<OffsetDateTime> =
            posts.values().map(|post| post.modified_at).max();
        Ok(Some(StoreProbe {
            latest_modified,
            count: posts.len() as u64,
        }))
    }

    async fn insert(&self, post: &Post) -> Result<(), RepoError> {
        let mut posts = self.posts.write().await;
        if posts.contains_key(&post.id) {
            return Err(RepoError::duplicate(&post.id));
        }
        posts.insert(post.id.clone(), post.clone());
        Ok(())
    }

    async fn update_content(&self, post: &Post) -> Result<(), RepoError> {
        let mut posts = self.posts.write().await;
        let stored = posts
            .get_mut(&post.id)
            .ok_or_else(|| RepoError::not_found(&post.id))?;
        stored.title = post.title.clone();
        stored.markdown = post.markdown.clone();
        stored.fingerprint = post.fingerprint.clone();
        stored.modified_at = post.modified_at;
        Ok(())
    }
}
