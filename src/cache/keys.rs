//! Cache key definitions.

use std::fmt;

use crate::domain::fingerprint::Fingerprint;

/// Identity of one rendered document: the content fingerprint and the
/// highlighting theme it was rendered with.
///
/// Kept as two fields instead of a joined string so that a theme containing
/// the separator cannot alias another entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderKey {
    fingerprint: Fingerprint,
    theme: String,
}

impl RenderKey {
    pub fn new(fingerprint: Fingerprint, theme: impl Into<String>) -> Self {
        Self {
            fingerprint,
            theme: theme.into(),
        }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }
}

impl fmt::Display for RenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.fingerprint, self.theme)
    }
}
