//! Monitor name syntax and name patterns.

use std::fmt;

use crate::error::{Error, Result};

/// Separator between name segments.
pub const SEPARATOR: char = '.';

/// Name of the root monitor.
pub const ROOT_NAME: &str = "";

/// Checks that `name` is a valid non-root monitor name.
///
/// Valid names are printable ASCII without spaces, split by dots into
/// non-empty segments.
pub fn validate(name: &str) -> Result<()> {
    let well_formed = !name.is_empty()
        && name.bytes().all(|b| b.is_ascii_graphic())
        && name.split(SEPARATOR).all(|segment| !segment.is_empty());

    if well_formed {
        Ok(())
    } else {
        Err(Error::BadName(name.to_string()))
    }
}

/// Last segment of `name`.
pub(crate) fn local_name(name: &str) -> &str {
    match name.rfind(SEPARATOR) {
        Some(index) => &name[index + 1..],
        None => name,
    }
}

/// Matches monitor names with an optional `*` wildcard.
///
/// Supported forms: `exact.name`, `prefix.*`, `*.suffix`, `*infix*` and `*`.
///
/// ```rust
/// use simon_core::SimonPattern;
///
/// let pattern = SimonPattern::new("app.db.*");
/// assert!(pattern.matches("app.db.query"));
/// assert!(!pattern.matches("app.web.request"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimonPattern {
    raw: String,
    matcher: Matcher,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Matcher {
    All,
    Exact(String),
    Prefix(String),
    Suffix(String),
    Infix(String),
}

impl SimonPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        let raw = pattern.into();
        let starts = raw.starts_with('*');
        let ends = raw.len() > 1 && raw.ends_with('*');

        let matcher = match (starts, ends) {
            _ if raw == "*" => Matcher::All,
            (true, true) => Matcher::Infix(raw[1..raw.len() - 1].to_string()),
            (true, false) => Matcher::Suffix(raw[1..].to_string()),
            (false, true) => Matcher::Prefix(raw[..raw.len() - 1].to_string()),
            (false, false) => Matcher::Exact(raw.clone()),
        };

        Self { raw, matcher }
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.matcher {
            Matcher::All => true,
            Matcher::Exact(exact) => name == exact,
            Matcher::Prefix(prefix) => name.starts_with(prefix.as_str()),
            Matcher::Suffix(suffix) => name.ends_with(suffix.as_str()),
            Matcher::Infix(infix) => name.contains(infix.as_str()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for SimonPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
