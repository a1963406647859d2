//! Markdown rendering.
//!
//! The pipeline is pure: it accepts markdown and a highlighting theme and
//! produces HTML plus title-block metadata. Memoization lives in
//! [`crate::cache::RenderCache`], not here.

mod service;
mod types;

pub use service::{ComrakRenderService, DEFAULT_THEME};
pub(crate) use service::theme_by_name;
pub use types::{MarkdownRenderer, PostMeta, RenderError, RenderedContent};
