//! `$`-placeholder substitution.
//!
//! `$name` and `${name}` are replaced when `name` is known; unknown placeholders are
//! left exactly as written. `$$` renders a literal `$`.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(\$)|([_A-Za-z][_A-Za-z0-9]*)|\{([_A-Za-z][_A-Za-z0-9]*)\})").unwrap()
});

/// Substitute placeholders using `lookup`. Never fails.
pub fn substitute<'a, F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<&'a str>,
{
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            if caps.get(1).is_some() {
                return "$".to_string();
            }
            let name = caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str());
            match name.and_then(&lookup) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

pub fn render_map(template: &str, variables: &BTreeMap<String, String>) -> String {
    substitute(template, |name| variables.get(name).map(String::as_str))
}
