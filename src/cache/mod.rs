//! In-process caches.
//!
//! - [`Cache`]: a generic reader/writer-locked map with wholesale replacement.
//! - [`RenderCache`]: memoized markdown rendering keyed by `(fingerprint, theme)`.
//! - [`SyntaxStylesheets`]: generated highlighting CSS per theme.
//!
//! None of these expire entries on their own.

mod keys;
pub(crate) mod lock;
mod render;
mod store;
mod syntax;

pub use keys::RenderKey;
pub use render::RenderCache;
pub use store::Cache;
pub use syntax::{Stylesheet, SyntaxStylesheets};
