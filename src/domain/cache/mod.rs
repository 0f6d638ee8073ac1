//! Key/value cache abstraction backing the durable content tier

mod pattern;
mod repository;

pub use pattern::pattern_regex;
pub use repository::Cache;

#[cfg(test)]
pub use repository::mock::MockCache;
