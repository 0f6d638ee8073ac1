//! Redis-style key patterns (`*` matches any run of characters)

use regex::Regex;

use crate::domain::CacheError;

/// Compile a `*` pattern into an anchored regex; every other character is literal
pub fn pattern_regex(pattern: &str) -> Result<Regex, CacheError> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");

    Regex::new(&format!("^{}$", body))
        .map_err(|e| CacheError::validation(format!("Invalid pattern '{}': {}", pattern, e)))
}
