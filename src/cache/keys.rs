//! Cache key generation.
//!
//! Keys are hierarchical `name_value` segments under the `tasks` namespace,
//! joined by `_`. Values are emitted verbatim — callers must not feed
//! untrusted content through here.

pub const NAMESPACE: &str = "tasks";

/// Tag applied to every cached list variant.
pub const LIST_TAG: &str = "tasks:list";

/// Tag applied to a cached single task.
pub fn task_tag(id: i64) -> String {
    format!("task:{id}")
}

/// Compose a key from alternating `name, value` segments, in the order
/// given.
pub fn generate(segments: &[(&str, String)]) -> String {
    let mut key = String::from(NAMESPACE);
    for (name, value) in segments {
        key.push('_');
        key.push_str(name);
        key.push('_');
        key.push_str(value);
    }
    key
}

/// Compose a list key; parameter names are sorted lexicographically so the
/// key does not depend on caller argument order.
pub fn for_list(params: &[(&str, String)]) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by_key(|(name, _)| *name);
    let segments: Vec<(&str, String)> = sorted
        .into_iter()
        .map(|(name, value)| (*name, value.clone()))
        .collect();
    generate(&segments)
}

/// `tasks_id_<id>`
pub fn entity(id: i64) -> String {
    generate(&[("id", id.to_string())])
}

/// `tasks_cursor_<cursor>_limit_<n>_order_<o>`
pub fn cursor_list(cursor: &str, limit: i64, order: &str) -> String {
    for_list(&[
        ("cursor", cursor.to_string()),
        ("limit", limit.to_string()),
        ("order", order.to_string()),
    ])
}

/// `tasks_page_<p>_limit_<n>_order_<o>`
pub fn page_list(page: i64, limit: i64, order: &str) -> String {
    generate(&[
        ("page", page.to_string()),
        ("limit", limit.to_string()),
        ("order", order.to_string()),
    ])
}

/// Glob matching every page-mode list key.
pub const PAGE_LIST_PATTERN: &str = "tasks_page_*";

/// Glob matching every cursor-mode list key.
pub const CURSOR_LIST_PATTERN: &str = "tasks_cursor_*";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_key_shape() {
        assert_eq!(entity(42), "tasks_id_42");
    }

    #[test]
    fn cursor_list_key_shape() {
        assert_eq!(
            cursor_list("abc", 10, "desc"),
            "tasks_cursor_abc_limit_10_order_desc"
        );
    }

    #[test]
    fn page_list_key_shape() {
        assert_eq!(page_list(1, 10, "desc"), "tasks_page_1_limit_10_order_desc");
    }

    #[test]
    fn for_list_is_argument_order_independent() {
        let forward = for_list(&[
            ("cursor", "c".to_string()),
            ("limit", "3".to_string()),
            ("order", "asc".to_string()),
        ]);
        let shuffled = for_list(&[
            ("order", "asc".to_string()),
            ("cursor", "c".to_string()),
            ("limit", "3".to_string()),
        ]);
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn list_patterns_match_generated_keys() {
        assert!(page_list(3, 25, "asc").starts_with("tasks_page_"));
        assert!(cursor_list("", 10, "desc").starts_with("tasks_cursor_"));
    }
}
