mod config;
mod highlight;

use comrak::{Arena, format_html, parse_document};
use once_cell::sync::Lazy;
use syntect::{
    dumps::from_uncompressed_data,
    highlighting::{Theme, ThemeSet},
    parsing::SyntaxSet,
};
use tracing::{debug, warn};

use crate::{
    application::render::types::{MarkdownRenderer, PostMeta, RenderError, RenderedContent},
    domain::front_matter,
};

use config::{build_sanitizer, default_options};
use highlight::highlight_blocks;

/// Highlighting theme used when the requested one is unknown.
pub const DEFAULT_THEME: &str = "base16-ocean.dark";

static THEMES: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

pub(crate) fn theme_by_name(name: &str) -> Option<&'static Theme> {
    THEMES.themes.get(name)
}

pub(crate) fn packed_syntax_set() -> SyntaxSet {
    let syntax_bytes = include_bytes!(env!("SYNTAX_PACK_FILE"));
    from_uncompressed_data(syntax_bytes).expect("syntax pack must be valid")
}

/// Comrak-based renderer with Syntect highlighting and Ammonia sanitisation.
pub struct ComrakRenderService {
    options: comrak::Options<'static>,
    syntax_set: SyntaxSet,
    sanitizer: ammonia::Builder<'static>,
}

impl ComrakRenderService {
    pub fn new() -> Self {
        Self {
            options: default_options(),
            syntax_set: packed_syntax_set(),
            sanitizer: build_sanitizer(),
        }
    }

    fn resolve_theme(&self, requested: &str) -> Result<&'static Theme, RenderError> {
        if let Some(theme) = theme_by_name(requested) {
            return Ok(theme);
        }
        debug!(
            target = "the_archive::render",
            requested,
            fallback = DEFAULT_THEME,
            "unknown highlighting theme"
        );
        theme_by_name(DEFAULT_THEME).ok_or_else(|| RenderError::Highlighting {
            language: String::new(),
            message: format!("default theme `{DEFAULT_THEME}` is not bundled"),
        })
    }
}

impl Default for ComrakRenderService {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer for ComrakRenderService {
    fn render(&self, markdown: &str, theme: &str) -> Result<RenderedContent, RenderError> {
        let (meta, body) = split_meta(markdown);
        let theme = self.resolve_theme(theme)?;

        let arena = Arena::new();
        let root = parse_document(&arena, body, &self.options);
        let contains_code = highlight_blocks(root, &self.syntax_set, theme)?;

        let mut html = String::new();
        format_html(root, &self.options, &mut html).map_err(|err| RenderError::Markdown {
            message: err.to_string(),
        })?;

        Ok(RenderedContent {
            html: self.sanitizer.clean(&html).to_string(),
            meta,
            contains_code,
        })
    }
}

fn split_meta(markdown: &str) -> (PostMeta, &str) {
    match front_matter::split(markdown) {
        Ok(Some(split)) => {
            let fm = split.front_matter;
            let meta = PostMeta {
                title: fm.title().unwrap_or(front_matter::DEFAULT_TITLE).to_string(),
                language: fm.language().to_string(),
                date: fm.date.as_ref().map(ToString::to_string),
                author: fm.author.clone(),
            };
            (meta, split.body)
        }
        Ok(None) => (PostMeta::default(), markdown),
        Err(err) => {
            warn!(
                target = "the_archive::render",
                error = %err,
                "ignoring malformed title block"
            );
            (PostMeta::default(), markdown)
        }
    }
}
