//! Read-only HTTP surface over the content snapshot.

mod middleware;
mod public;

pub use public::build_router;

use std::sync::Arc;

use crate::{
    application::{content::ContentRepository, notify::ChangeNotifier},
    cache::{RenderCache, SyntaxStylesheets},
    infra::cache_warmer::CacheWarmer,
};

/// Shared handles every handler reads from.
#[derive(Clone)]
pub struct HttpState {
    pub content: Arc<ContentRepository>,
    pub renders: Arc<RenderCache>,
    pub notifier: Arc<ChangeNotifier>,
    pub warmer: CacheWarmer,
    pub stylesheets: Arc<SyntaxStylesheets>,
    pub default_theme: Arc<str>,
}

impl HttpState {
    pub fn new(
        content: Arc<ContentRepository>,
        renders: Arc<RenderCache>,
        notifier: Arc<ChangeNotifier>,
        default_theme: impl Into<Arc<str>>,
    ) -> Self {
        let warmer = CacheWarmer::new(Arc::clone(&content), Arc::clone(&renders));
        Self {
            content,
            renders,
            notifier,
            warmer,
            stylesheets: Arc::new(SyntaxStylesheets::new()),
            default_theme: default_theme.into(),
        }
    }
}
