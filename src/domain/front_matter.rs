//! `%%%`-delimited TOML title blocks at the head of a post.

use serde::Deserialize;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use toml::value::{Datetime, Offset};

use super::error::DomainError;

pub const DELIMITER: &str = "%%%";
pub const DEFAULT_TITLE: &str = "Untitled";
pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub language: Option<String>,
    pub date: Option<Datetime>,
    pub author: Option<String>,
}

impl FrontMatter {
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    pub fn language(&self) -> &str {
        self.language
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_LANGUAGE)
    }

    /// The declared `date` as an instant. A bare date means midnight, a
    /// missing offset means UTC. `None` when absent or out of range.
    pub fn timestamp(&self) -> Option<OffsetDateTime> {
        let declared = self.date.as_ref()?;
        let day = declared.date?;
        let date = Date::from_calendar_date(
            i32::from(day.year),
            Month::try_from(day.month).ok()?,
            day.day,
        )
        .ok()?;
        let time = match declared.time {
            Some(t) => Time::from_hms_nano(t.hour, t.minute, t.second.unwrap_or(0), t.nanosecond.unwrap_or(0)).ok()?,
            None => Time::MIDNIGHT,
        };
        let offset = match declared.offset {
            Some(Offset::Custom { minutes }) => {
                UtcOffset::from_whole_seconds(i32::from(minutes) * 60).ok()?
            }
            Some(Offset::Z) | None => UtcOffset::UTC,
        };
        Some(PrimitiveDateTime::new(date, time).assume_offset(offset))
    }
}

/// A parsed title block plus the markdown that follows it.
#[derive(Debug, Clone, PartialEq)]
pub struct Split<'a> {
    pub front_matter: FrontMatter,
    pub body: &'a str,
}

/// Split a leading title block off `markdown`.
///
/// Returns `Ok(None)` when the document does not open with the delimiter
/// (leading whitespace is ignored). An opened but unterminated block, or one
/// whose contents are not valid TOML, is an error.
pub fn split(markdown: &str) -> Result<Option<Split<'_>>, DomainError> {
    let trimmed = markdown.trim_start();
    let Some(after_open) = trimmed.strip_prefix(DELIMITER) else {
        return Ok(None);
    };

    let Some(close) = after_open.find(DELIMITER) else {
        return Err(DomainError::front_matter("missing closing delimiter"));
    };

    let raw = &after_open[..close];
    let rest = &after_open[close + DELIMITER.len()..];
    let body = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let front_matter: FrontMatter =
        toml::from_str(raw).map_err(|err| DomainError::front_matter(err.to_string()))?;

    Ok(Some(Split { front_matter, body }))
}

/// Title declared in the front matter, if any. Malformed blocks count as absent.
pub fn declared_title(markdown: &str) -> Option<String> {
    match split(markdown) {
        Ok(Some(split)) => split.front_matter.title().map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_title_and_date() {
        let md = "%%%\ntitle = \"Hello World\"\ndate = 2025-01-01T00:00:00Z\n%%%\n# Content";
        let split = split(md).expect("valid").expect("present");
        assert_eq!(split.front_matter.title(), Some("Hello World"));
        assert!(split.front_matter.date.is_some());
        assert_eq!(split.front_matter.language(), DEFAULT_LANGUAGE);
        assert_eq!(split.body, "# Content");
    }

    #[test]
    fn date_resolves_to_an_instant() {
        let md = "%%%\ndate = 2024-03-05T10:30:00+02:00\n%%%\n";
        let split = split(md).expect("valid").expect("present");
        let at = split.front_matter.timestamp().expect("timestamp");
        assert_eq!(at.to_offset(UtcOffset::UTC).hour(), 8);

        let md = "%%%\ndate = 2024-03-05\n%%%\n";
        let split = super::split(md).expect("valid").expect("present");
        let at = split.front_matter.timestamp().expect("timestamp");
        assert_eq!((at.year(), at.day(), at.hour()), (2024, 5, 0));
    }

    #[test]
    fn missing_block_is_not_an_error() {
        assert!(split("# Just content\nNo title block.").expect("ok").is_none());
        assert!(split("").expect("ok").is_none());
    }

    #[test]
    fn content_before_block_means_no_block() {
        let md = "\n# Heading first\n%%%\ntitle = \"x\"\n%%%\n";
        assert!(split(md).expect("ok").is_none());
    }

    #[test]
    fn leading_whitespace_is_ignored() {
        let md = "\n\n\n%%%\n\ntitle = \"Hello World\"\n\n%%%\n# Content";
        let split = split(md).expect("valid").expect("present");
        assert_eq!(split.front_matter.title(), Some("Hello World"));
    }

    #[test]
    fn unterminated_block_is_rejected() {
        let md = "%%%\ntitle = \"Incomplete\n# Content";
        assert!(split(md).is_err());
        assert_eq!(declared_title(md), None);
    }

    #[test]
    fn blank_title_counts_as_absent() {
        let md = "%%%\ntitle = \"   \"\nlanguage = \"pt\"\n%%%\nbody";
        let split = split(md).expect("valid").expect("present");
        assert_eq!(split.front_matter.title(), None);
        assert_eq!(split.front_matter.language(), "pt");
    }
}
