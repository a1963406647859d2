use serde::Serialize;
use thiserror::Error;

/// Metadata recovered from a post's title block, with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostMeta {
    pub title: String,
    pub language: String,
    /// RFC 3339 rendering of the declared date, when one was given.
    pub date: Option<String>,
    pub author: Option<String>,
}

impl Default for PostMeta {
    fn default() -> Self {
        Self {
            title: crate::domain::front_matter::DEFAULT_TITLE.to_string(),
            language: crate::domain::front_matter::DEFAULT_LANGUAGE.to_string(),
            date: None,
            author: None,
        }
    }
}

/// Output of a single render: the HTML fragment and the metadata extracted on the way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedContent {
    pub html: String,
    pub meta: PostMeta,
    /// True when at least one fenced code block was highlighted.
    pub contains_code: bool,
}

/// Structured errors surfaced by the rendering pipeline.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("markdown rendering failed: {message}")]
    Markdown { message: String },
    #[error("syntax highlighting failed: {language}: {message}")]
    Highlighting { language: String, message: String },
    #[error("render task failed: {message}")]
    Task { message: String },
}

impl RenderError {
    pub fn task(message: impl Into<String>) -> Self {
        Self::Task {
            message: message.into(),
        }
    }
}

/// Pure markdown-to-HTML function. Implementations must be deterministic:
/// identical `(markdown, theme)` inputs yield identical outputs or errors.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, markdown: &str, theme: &str) -> Result<RenderedContent, RenderError>;
}
