use std::{sync::Arc, time::Instant};

use metrics::histogram;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    application::content::ContentRepository, cache::RenderCache, domain::posts::PostId,
};

#[derive(Debug, Error)]
pub enum CacheWarmError {
    #[error("render warm task for `{post_id}` did not complete: {detail}")]
    Task { post_id: String, detail: String },
}

/// Pre-renders posts so the next page view is a cache hit.
#[derive(Clone)]
pub struct CacheWarmer {
    content: Arc<ContentRepository>,
    renders: Arc<RenderCache>,
}

impl CacheWarmer {
    pub fn new(content: Arc<ContentRepository>, renders: Arc<RenderCache>) -> Self {
        Self { content, renders }
    }

    /// Render the previous and next posts of `post_id` in the background.
    ///
    /// Returns immediately; the caller may drop the handle.
    pub fn warm_neighbours(&self, post_id: &PostId, theme: &str) -> JoinHandle<()> {
        let content = Arc::clone(&self.content);
        let renders = Arc::clone(&self.renders);
        let post_id = post_id.clone();
        let theme = theme.to_string();

        tokio::spawn(async move {
            let (previous, next) = content.adjacent(post_id.as_str());
            for neighbour in [previous, next].into_iter().flatten() {
                if renders.contains(&neighbour.fingerprint, &theme) {
                    continue;
                }
                debug!(
                    target = "the_archive::cache_warmer",
                    from = %post_id,
                    neighbour = %neighbour.id,
                    theme = %theme,
                    "warming neighbour render"
                );
                let task = renders.warm(
                    neighbour.markdown.clone(),
                    neighbour.fingerprint.clone(),
                    theme.clone(),
                );
                if let Err(err) = task.await {
                    warn!(
                        target = "the_archive::cache_warmer",
                        neighbour = %neighbour.id,
                        error = %err,
                        "neighbour warm task aborted"
                    );
                }
            }
        })
    }

    /// Render every post of the current snapshot for `theme`. Used at startup.
    pub async fn warm_snapshot(&self, theme: &str) -> Result<usize, CacheWarmError> {
        let started = Instant::now();
        let snapshot = self.content.all();
        info!(
            target = "the_archive::cache_warmer",
            posts = snapshot.len(),
            theme,
            "warming render cache"
        );

        let mut warmed = 0;
        for post in snapshot.posts() {
            self.renders
                .warm(
                    post.markdown.clone(),
                    post.fingerprint.clone(),
                    theme.to_string(),
                )
                .await
                .map_err(|err| CacheWarmError::Task {
                    post_id: post.id.to_string(),
                    detail: err.to_string(),
                })?;
            warmed += 1;
        }

        histogram!("archive_cache_warm_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        info!(
            target = "the_archive::cache_warmer",
            warmed,
            "render cache warmed"
        );
        Ok(warmed)
    }
}
