//! The task entity and its validation rules.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::error::DomainError;

/// Upper bound on task titles, in characters.
pub const TITLE_MAX_CHARS: usize = 100;

/// A task row as stored. `deleted_at` marks soft deletion; a task with it
/// set is invisible to every read path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub done: bool,
    pub owner: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub deleted_at: Option<OffsetDateTime>,
}

/// Validate a client-supplied title: non-empty after trimming, at most
/// [`TITLE_MAX_CHARS`] characters.
pub fn validate_title(title: &str) -> Result<(), DomainError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("title must not be empty"));
    }
    if trimmed.chars().count() > TITLE_MAX_CHARS {
        return Err(DomainError::validation(format!(
            "title must be at most {TITLE_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_title_is_rejected() {
        assert!(validate_title("").is_err());
        assert!(validate_title("   ").is_err());
    }

    #[test]
    fn title_at_limit_is_accepted() {
        let title = "x".repeat(TITLE_MAX_CHARS);
        assert!(validate_title(&title).is_ok());
    }

    #[test]
    fn title_over_limit_is_rejected() {
        let title = "x".repeat(TITLE_MAX_CHARS + 1);
        let err = validate_title(&title).expect_err("over-limit title rejected");
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn multibyte_titles_count_characters_not_bytes() {
        let title = "ö".repeat(TITLE_MAX_CHARS);
        assert!(validate_title(&title).is_ok());
    }
}
