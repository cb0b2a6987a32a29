//! Cache client contract.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// No expiration.
pub const TTL_FOREVER: Duration = Duration::ZERO;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache encoding error: {0}")]
    Encoding(String),
}

impl CacheError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Minimal key/value cache. Values are opaque bytes (JSON by convention;
/// see [`get_json`]/[`set_json`]). A miss is `Ok(None)`, never an error.
/// A `ttl` of zero means no expiration.
///
/// Tags are a secondary index: `set_with_tags` records the key under each
/// tag, and `invalidate_by_tags` deletes every key a tag references along
/// with the tag itself.
///
/// The counter operations back the fixed-window rate limiter and follow
/// INCR/EXPIRE semantics: `incr` atomically creates-at-one, `expire`
/// returns whether a deadline was set.
///
/// All operations are safe under concurrent callers.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError>;

    async fn set_with_tags(
        &self,
        key: &str,
        value: Bytes,
        ttl: Duration,
        tags: &[&str],
    ) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Delete every key matching a shell-style glob (`*`, `?`).
    async fn delete_pattern(&self, pattern: &str) -> Result<(), CacheError>;

    async fn invalidate_by_tags(&self, tags: &[&str]) -> Result<(), CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;

    async fn incr(&self, key: &str) -> Result<i64, CacheError>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError>;
}

/// Read a JSON-encoded value. An entry that fails to decode is treated as
/// a backend error, not a miss, so callers can distinguish corruption from
/// absence.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn CacheStore,
    key: &str,
) -> Result<Option<T>, CacheError> {
    match store.get(key).await? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| CacheError::Encoding(err.to_string())),
        None => Ok(None),
    }
}

/// Write a JSON-encoded value, optionally under tags.
pub async fn set_json<T: Serialize>(
    store: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl: Duration,
    tags: &[&str],
) -> Result<(), CacheError> {
    let bytes = serde_json::to_vec(value).map_err(|err| CacheError::Encoding(err.to_string()))?;
    if tags.is_empty() {
        store.set(key, Bytes::from(bytes), ttl).await
    } else {
        store.set_with_tags(key, Bytes::from(bytes), ttl, tags).await
    }
}

/// Shell-style glob match supporting `*` (any run) and `?` (any single
/// character). Both backends use this semantics for `delete_pattern`.
pub(crate) fn glob_match(pattern: &str, candidate: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();
    glob_match_at(&pattern, &candidate)
}

fn glob_match_at(pattern: &[char], candidate: &[char]) -> bool {
    match pattern.split_first() {
        None => candidate.is_empty(),
        Some((&'*', rest)) => {
            (0..=candidate.len()).any(|skip| glob_match_at(rest, &candidate[skip..]))
        }
        Some((&'?', rest)) => match candidate.split_first() {
            Some((_, tail)) => glob_match_at(rest, tail),
            None => false,
        },
        Some((&ch, rest)) => match candidate.split_first() {
            Some((&first, tail)) if first == ch => glob_match_at(rest, tail),
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_star_matches_any_run() {
        assert!(glob_match("tasks_page_*", "tasks_page_1_limit_10_order_desc"));
        assert!(glob_match("tasks_page_*", "tasks_page_"));
        assert!(!glob_match("tasks_page_*", "tasks_cursor_abc"));
    }

    #[test]
    fn glob_question_mark_matches_one_character() {
        assert!(glob_match("tasks_id_?", "tasks_id_7"));
        assert!(!glob_match("tasks_id_?", "tasks_id_42"));
    }

    #[test]
    fn glob_literal_requires_exact_match() {
        assert!(glob_match("tasks_id_42", "tasks_id_42"));
        assert!(!glob_match("tasks_id_42", "tasks_id_421"));
    }

    #[test]
    fn glob_interior_star() {
        assert!(glob_match("tasks_*_order_desc", "tasks_page_2_limit_10_order_desc"));
        assert!(!glob_match("tasks_*_order_asc", "tasks_page_2_limit_10_order_desc"));
    }
}
