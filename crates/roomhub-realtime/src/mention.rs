//! `@name` mention extraction.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// An `@` followed by one or more ASCII word characters. Any other
/// character, accented letters included, ends the name.
pub static MENTION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([A-Za-z0-9_]+)").expect("Invalid regex"));

/// Returns the usernames mentioned in `content`, first occurrence order,
/// without duplicates.
pub fn extract_mentions(content: &str) -> Vec<&str> {
    let mut seen = HashSet::new();
    MENTION_REGEX
        .captures_iter(content)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .filter(|name| seen.insert(*name))
        .collect()
}
