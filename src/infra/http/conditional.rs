//! ETag generation and conditional-request handling.

use axum::http::{HeaderMap, HeaderValue, header};
use serde::Serialize;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::domain::tasks::TaskRecord;

/// SHA-256 over the canonical JSON of `value`, emitted as a quoted hex
/// string. A value that cannot be serialized still yields a usable opaque
/// tag derived from the current time.
pub fn generate_etag<T: Serialize>(value: &T) -> String {
    match serde_json::to_vec(value) {
        Ok(canonical) => quoted_hex(&Sha256::digest(&canonical)),
        Err(_) => format!("\"{:x}\"", OffsetDateTime::now_utc().unix_timestamp_nanos()),
    }
}

/// Hash of the `id-title-done-updated_nanos` concatenation in iteration
/// order. Reordering the list changes the tag.
pub fn etag_from_tasks(tasks: &[TaskRecord]) -> String {
    let mut hasher = Sha256::new();
    for task in tasks {
        hasher.update(format!(
            "{}-{}-{}-{}",
            task.id,
            task.title,
            task.done,
            task.updated_at.unix_timestamp_nanos()
        ));
    }
    quoted_hex(&hasher.finalize())
}

fn quoted_hex(digest: impl AsRef<[u8]>) -> String {
    format!("\"{}\"", hex::encode(digest))
}

/// Emit the ETag header; an empty tag emits nothing.
pub fn set_etag(headers: &mut HeaderMap, tag: &str) {
    if tag.is_empty() {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(tag) {
        headers.insert(header::ETAG, value);
    }
}

/// Cache-Control policy: mutating responses must never be cached; reads
/// are privately cacheable and vary on the caller.
pub fn add_cache_control(headers: &mut HeaderMap, mutating: bool, max_age_secs: u64) {
    if mutating {
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        );
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    } else {
        if let Ok(value) = HeaderValue::from_str(&format!("private, max-age={max_age_secs}")) {
            headers.insert(header::CACHE_CONTROL, value);
        }
        headers.insert(header::VARY, HeaderValue::from_static("Authorization"));
    }
}

/// True iff If-None-Match equals the tag or its weak `W/<tag>` form.
/// Comparison is exact and case-sensitive; no wildcard support.
pub fn is_not_modified(headers: &HeaderMap, tag: &str) -> bool {
    if tag.is_empty() {
        return false;
    }
    let Some(candidate) = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };
    if candidate.is_empty() {
        return false;
    }
    candidate == tag || candidate == format!("W/{tag}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: i64, title: &str, done: bool) -> TaskRecord {
        TaskRecord {
            id,
            title: title.to_string(),
            description: None,
            done,
            owner: 1,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
            deleted_at: None,
        }
    }

    #[test]
    fn etag_is_quoted_hex() {
        let tag = generate_etag(&task(1, "a", false));
        assert!(tag.starts_with('"') && tag.ends_with('"'));
        assert_eq!(tag.len(), 66);
        assert!(tag[1..65].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn identical_values_produce_identical_etags() {
        assert_eq!(
            generate_etag(&task(1, "a", false)),
            generate_etag(&task(1, "a", false))
        );
        assert_ne!(
            generate_etag(&task(1, "a", false)),
            generate_etag(&task(1, "a", true))
        );
    }

    #[test]
    fn task_list_etag_depends_on_order() {
        let first = task(1, "a", false);
        let second = task(2, "b", true);
        let forward = etag_from_tasks(&[first.clone(), second.clone()]);
        let reversed = etag_from_tasks(&[second, first]);
        assert_ne!(forward, reversed);
    }

    #[test]
    fn if_none_match_accepts_strong_and_weak_forms() {
        let tag = "\"abc\"";
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"abc\""));
        assert!(is_not_modified(&headers, tag));

        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("W/\"abc\""));
        assert!(is_not_modified(&headers, tag));

        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"other\""));
        assert!(!is_not_modified(&headers, tag));
    }

    #[test]
    fn wildcard_and_empty_inputs_never_match() {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("*"));
        assert!(!is_not_modified(&headers, "\"abc\""));
        assert!(!is_not_modified(&headers, ""));
        assert!(!is_not_modified(&HeaderMap::new(), "\"abc\""));
    }

    #[test]
    fn set_etag_skips_empty_tags() {
        let mut headers = HeaderMap::new();
        set_etag(&mut headers, "");
        assert!(headers.get(header::ETAG).is_none());

        set_etag(&mut headers, "\"abc\"");
        assert_eq!(headers.get(header::ETAG).unwrap(), "\"abc\"");
    }

    #[test]
    fn cache_control_for_reads_and_writes() {
        let mut headers = HeaderMap::new();
        add_cache_control(&mut headers, false, 300);
        assert_eq!(
            headers.get(header::CACHE_CONTROL).unwrap(),
            "private, max-age=300"
        );
        assert_eq!(headers.get(header::VARY).unwrap(), "Authorization");

        let mut headers = HeaderMap::new();
        add_cache_control(&mut headers, true, 300);
        assert_eq!(
            headers.get(header::CACHE_CONTROL).unwrap(),
            "no-cache, no-store, must-revalidate"
        );
        assert_eq!(headers.get(header::PRAGMA).unwrap(), "no-cache");
        assert_eq!(headers.get(header::EXPIRES).unwrap(), "0");
    }
}
