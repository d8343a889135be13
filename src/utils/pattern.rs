//! Anchored pattern matching.
//!
//! Patterns match from the start of the subject (not necessarily to its end), so
//! `.*-auto$` matches `job-auto` and `web` matches `web-frontend`.

use regex::Regex;

use crate::error::{Error, Result};

/// A compiled pattern anchored at the start of the subject.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{})", source)).map_err(|e| {
            Error::validation_invalid_argument("pattern", e.to_string(), Some(source.to_string()), None)
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, subject: &str) -> bool {
        self.regex.is_match(subject)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Compile an optional pattern. `None` means "match everything".
pub fn compile(source: Option<&str>) -> Result<Option<Pattern>> {
    source.map(Pattern::new).transpose()
}

/// Match `subject` against an optional pattern; an absent pattern matches everything.
pub fn matches(pattern: Option<&Pattern>, subject: &str) -> bool {
    pattern.is_none_or(|p| p.is_match(subject))
}
