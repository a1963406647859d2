use std::sync::Arc;

use syntect::html::{ClassStyle, css_for_theme_with_class_style};
use tracing::warn;

use crate::{application::render::theme_by_name, domain::fingerprint::Fingerprint};

use super::store::Cache;

/// A generated stylesheet and the entity tag derived from its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stylesheet {
    pub css: String,
    pub etag: Fingerprint,
}

/// Per-theme highlighting stylesheets, generated once and kept for the process lifetime.
#[derive(Default)]
pub struct SyntaxStylesheets {
    entries: Cache<String, Arc<Stylesheet>>,
}

impl SyntaxStylesheets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stylesheet for `theme`, or `None` when no such theme is bundled.
    pub fn stylesheet(&self, theme: &str) -> Option<Arc<Stylesheet>> {
        if let Some(hit) = self.entries.get(theme) {
            return Some(hit);
        }

        let definition = theme_by_name(theme)?;
        let css = match css_for_theme_with_class_style(definition, ClassStyle::Spaced) {
            Ok(css) => css,
            Err(err) => {
                warn!(
                    target = "the_archive::cache::syntax",
                    theme,
                    error = %err,
                    "failed to generate theme stylesheet"
                );
                return None;
            }
        };

        let sheet = Arc::new(Stylesheet {
            etag: Fingerprint::of(css.as_bytes()),
            css,
        });
        self.entries.set(theme.to_string(), Arc::clone(&sheet));
        Some(sheet)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stylesheet_is_generated_once_per_theme() {
        let sheets = SyntaxStylesheets::new();
        let first = sheets.stylesheet("base16-ocean.dark").expect("bundled theme");
        let second = sheets.stylesheet("base16-ocean.dark").expect("cached");

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!first.css.is_empty());
        assert_eq!(first.etag, Fingerprint::of(first.css.as_bytes()));
        assert_eq!(sheets.len(), 1);
    }

    #[test]
    fn unknown_theme_is_absent() {
        let sheets = SyntaxStylesheets::new();
        assert!(sheets.stylesheet("nope").is_none());
        assert!(sheets.is_empty());
    }
}
