//! Memoized markdown rendering keyed by content fingerprint and theme.

use std::sync::{Arc, Mutex};

use metrics::counter;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    application::render::{MarkdownRenderer, RenderError, RenderedContent},
    domain::fingerprint::Fingerprint,
};

use super::{keys::RenderKey, lock, store::Cache};

const SOURCE: &str = "cache::render";

/// Render cache guaranteeing at most one computation per `(fingerprint, theme)`.
///
/// Hits are served under the store's shared lock only. Misses serialise on a
/// single cache-wide mutex and re-check the store once they hold it, so a
/// burst of requests for the same cold key renders exactly once.
pub struct RenderCache {
    renderer: Arc<dyn MarkdownRenderer>,
    entries: Cache<RenderKey, Arc<RenderedContent>>,
    render_gate: Mutex<()>,
}

impl RenderCache {
    pub fn new(renderer: Arc<dyn MarkdownRenderer>) -> Self {
        Self {
            renderer,
            entries: Cache::new(),
            render_gate: Mutex::new(()),
        }
    }

    /// Return the rendered form of `content`, computing it on first request.
    ///
    /// An empty fingerprint bypasses memoization entirely. Render failures are
    /// returned and never stored.
    pub fn render_cached(
        &self,
        content: &str,
        fingerprint: &Fingerprint,
        theme: &str,
    ) -> Result<Arc<RenderedContent>, RenderError> {
        if fingerprint.is_empty() {
            warn!(
                target = "the_archive::cache::render",
                theme, "content fingerprint is empty; rendering without cache"
            );
            counter!("archive_render_bypass_total").increment(1);
            return self.renderer.render(content, theme).map(Arc::new);
        }

        let key = RenderKey::new(fingerprint.clone(), theme);
        if let Some(hit) = self.entries.get(&key) {
            counter!("archive_render_cache_hit_total").increment(1);
            return Ok(hit);
        }

        let _gate = lock::exclusive(&self.render_gate, SOURCE, "render_cached");

        // Another caller may have rendered this key while we waited.
        if let Some(hit) = self.entries.get(&key) {
            counter!("archive_render_cache_hit_total").increment(1);
            return Ok(hit);
        }

        counter!("archive_render_cache_miss_total").increment(1);
        debug!(target = "the_archive::cache::render", key = %key, "rendering on cache miss");

        let rendered = Arc::new(self.renderer.render(content, theme)?);
        self.entries.set(key, Arc::clone(&rendered));
        Ok(rendered)
    }

    /// Render in the background so a later [`RenderCache::render_cached`] hits.
    ///
    /// Nothing needs to await the returned handle; failures are logged.
    pub fn warm(
        self: &Arc<Self>,
        content: String,
        fingerprint: Fingerprint,
        theme: String,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            match cache.render_cached(&content, &fingerprint, &theme) {
                Ok(_) => debug!(
                    target = "the_archive::cache::render",
                    fingerprint = %fingerprint,
                    theme = %theme,
                    "render cache warmed"
                ),
                Err(err) => warn!(
                    target = "the_archive::cache::render",
                    fingerprint = %fingerprint,
                    theme = %theme,
                    error = %err,
                    "render cache warm failed"
                ),
            }
        })
    }

    pub fn contains(&self, fingerprint: &Fingerprint, theme: &str) -> bool {
        self.entries
            .get(&RenderKey::new(fingerprint.clone(), theme))
            .is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
