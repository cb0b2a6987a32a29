//! Shared pagination helpers: opaque cursor codec and query normalization.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;
pub const MAX_PAGE: i64 = 100;

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("invalid cursor options: {0}")]
    InvalidOptions(String),
}

/// Sort direction for the single ordering the list API exposes,
/// `(created_at, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Parse a client-supplied order string, case-insensitively. Anything
    /// outside {asc, desc} is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Options a cursor is encoded under: the timestamp column it was built
/// from and the direction of travel. Both are required; encoding validates
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorOptions {
    pub time_field: &'static str,
    pub order: SortOrder,
}

impl CursorOptions {
    pub fn new(time_field: &'static str, order: SortOrder) -> Self {
        Self { time_field, order }
    }

    fn validate(&self) -> Result<(), PaginationError> {
        if self.time_field.trim().is_empty() {
            return Err(PaginationError::InvalidOptions(
                "timestamp field name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// An id type a cursor can carry. Implemented for unsigned integers,
/// signed integers, and strings; anything else has no codec.
pub trait CursorId: Sized + Clone + Default + PartialEq {
    fn write_segment(&self) -> String;
    fn parse_segment(raw: &str) -> Result<Self, String>;
}

impl CursorId for u64 {
    fn write_segment(&self) -> String {
        self.to_string()
    }

    fn parse_segment(raw: &str) -> Result<Self, String> {
        raw.parse()
            .map_err(|_| format!("`{raw}` is not an unsigned integer id"))
    }
}

impl CursorId for i64 {
    fn write_segment(&self) -> String {
        self.to_string()
    }

    fn parse_segment(raw: &str) -> Result<Self, String> {
        raw.parse()
            .map_err(|_| format!("`{raw}` is not an integer id"))
    }
}

impl CursorId for String {
    fn write_segment(&self) -> String {
        self.clone()
    }

    fn parse_segment(raw: &str) -> Result<Self, String> {
        Ok(raw.to_string())
    }
}

/// A position in the `(created_at, id)` total order. The wire form is
/// base64 over the textual triple `id:unix_seconds:extra`; the empty
/// string is the zero cursor, "start from the beginning".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cursor<I> {
    pub id: I,
    pub timestamp: i64,
    pub extra: String,
}

impl<I: CursorId> Cursor<I> {
    pub fn new(id: I, timestamp: i64, extra: impl Into<String>) -> Self {
        Self {
            id,
            timestamp,
            extra: extra.into(),
        }
    }

    /// True for the zero cursor.
    pub fn is_start(&self) -> bool {
        *self == Self::default()
    }

    pub fn encode(&self, opts: &CursorOptions) -> Result<String, PaginationError> {
        opts.validate()?;
        let triple = format!(
            "{}:{}:{}",
            self.id.write_segment(),
            self.timestamp,
            self.extra
        );
        Ok(STANDARD.encode(triple))
    }

    pub fn decode(raw: &str) -> Result<Self, PaginationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        let bytes = STANDARD
            .decode(trimmed)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        let text = String::from_utf8(bytes)
            .map_err(|_| PaginationError::InvalidCursor("cursor is not valid UTF-8".to_string()))?;
        let parts: Vec<&str> = text.split(':').collect();
        if parts.len() != 3 {
            return Err(PaginationError::InvalidCursor(format!(
                "expected 3 segments, found {}",
                parts.len()
            )));
        }
        let id = I::parse_segment(parts[0]).map_err(PaginationError::InvalidCursor)?;
        let timestamp = parts[1].parse::<i64>().map_err(|_| {
            PaginationError::InvalidCursor(format!("`{}` is not a unix timestamp", parts[1]))
        })?;
        Ok(Self {
            id,
            timestamp,
            extra: parts[2].to_string(),
        })
    }
}

fn default_order() -> String {
    String::new()
}

/// Cursor-mode paging parameters as received from the client.
/// [`CursorQuery::normalize`] clamps them into the supported range and is
/// idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CursorQuery {
    #[serde(default)]
    pub cursor: String,
    #[serde(default)]
    pub limit: i64,
    #[serde(default = "default_order")]
    pub order: String,
}

impl CursorQuery {
    pub fn normalize(mut self) -> Self {
        self.limit = clamp_limit(self.limit);
        self.order = normalize_order(&self.order);
        self.cursor = self.cursor.trim().to_string();
        self
    }

    /// The normalized order. Call after [`normalize`](Self::normalize).
    pub fn sort_order(&self) -> SortOrder {
        SortOrder::parse(&self.order).unwrap_or_default()
    }
}

/// Page-mode paging parameters; same normalization contract as
/// [`CursorQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub limit: i64,
    #[serde(default = "default_order")]
    pub order: String,
}

impl PageQuery {
    pub fn normalize(mut self) -> Self {
        self.limit = clamp_limit(self.limit);
        self.order = normalize_order(&self.order);
        self.page = self.page.clamp(1, MAX_PAGE);
        self
    }

    pub fn sort_order(&self) -> SortOrder {
        SortOrder::parse(&self.order).unwrap_or_default()
    }
}

fn clamp_limit(limit: i64) -> i64 {
    if limit <= 0 {
        DEFAULT_LIMIT
    } else {
        limit.min(MAX_LIMIT)
    }
}

fn normalize_order(order: &str) -> String {
    match SortOrder::parse(order) {
        Some(order) => order.as_str().to_string(),
        None => SortOrder::default().as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> CursorOptions {
        CursorOptions::new("created_at", SortOrder::Desc)
    }

    #[test]
    fn cursor_round_trip_integer_id() {
        let cursor = Cursor::new(42i64, 1_700_000_000, "");
        let encoded = cursor.encode(&opts()).expect("encoded cursor");
        let decoded = Cursor::<i64>::decode(&encoded).expect("decoded cursor");
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn cursor_round_trip_unsigned_and_string_ids() {
        let unsigned = Cursor::new(7u64, 12, "tail");
        let decoded =
            Cursor::<u64>::decode(&unsigned.encode(&opts()).expect("encoded")).expect("decoded");
        assert_eq!(decoded, unsigned);

        let text = Cursor::new("task-9".to_string(), 0, "");
        let decoded =
            Cursor::<String>::decode(&text.encode(&opts()).expect("encoded")).expect("decoded");
        assert_eq!(decoded, text);
    }

    #[test]
    fn empty_input_decodes_to_zero_cursor() {
        let decoded = Cursor::<i64>::decode("").expect("decoded empty cursor");
        assert!(decoded.is_start());
        let decoded = Cursor::<i64>::decode("   ").expect("decoded blank cursor");
        assert!(decoded.is_start());
    }

    #[test]
    fn corrupt_base64_is_a_client_error() {
        let err = Cursor::<i64>::decode("!!not-base64!!").expect_err("corrupt input rejected");
        assert!(matches!(err, PaginationError::InvalidCursor(_)));
    }

    #[test]
    fn wrong_field_count_is_rejected() {
        let encoded = STANDARD.encode("1:2");
        let err = Cursor::<i64>::decode(&encoded).expect_err("two segments rejected");
        assert!(matches!(err, PaginationError::InvalidCursor(_)));

        let encoded = STANDARD.encode("1:2:3:4");
        assert!(Cursor::<i64>::decode(&encoded).is_err());
    }

    #[test]
    fn unparseable_timestamp_and_id_are_rejected() {
        let encoded = STANDARD.encode("1:soon:");
        assert!(Cursor::<i64>::decode(&encoded).is_err());

        let encoded = STANDARD.encode("nine:1700000000:");
        assert!(Cursor::<i64>::decode(&encoded).is_err());

        let encoded = STANDARD.encode("-3:1700000000:");
        assert!(Cursor::<u64>::decode(&encoded).is_err());
    }

    #[test]
    fn options_require_a_timestamp_field() {
        let cursor = Cursor::new(1i64, 0, "");
        let err = cursor
            .encode(&CursorOptions::new("", SortOrder::Asc))
            .expect_err("empty field rejected");
        assert!(matches!(err, PaginationError::InvalidOptions(_)));
    }

    #[test]
    fn cursor_query_normalization_clamps_and_defaults() {
        let query = CursorQuery {
            cursor: "  abc  ".to_string(),
            limit: 0,
            order: "DESC".to_string(),
        }
        .normalize();
        assert_eq!(query.limit, DEFAULT_LIMIT);
        assert_eq!(query.order, "desc");
        assert_eq!(query.cursor, "abc");

        let query = CursorQuery {
            cursor: String::new(),
            limit: 500,
            order: "sideways".to_string(),
        }
        .normalize();
        assert_eq!(query.limit, MAX_LIMIT);
        assert_eq!(query.order, "desc");
    }

    #[test]
    fn page_query_normalization_clamps_page() {
        let query = PageQuery {
            page: -2,
            limit: 20,
            order: "asc".to_string(),
        }
        .normalize();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 20);
        assert_eq!(query.order, "asc");

        let query = PageQuery {
            page: 10_000,
            limit: 20,
            order: "asc".to_string(),
        }
        .normalize();
        assert_eq!(query.page, MAX_PAGE);
    }

    #[test]
    fn normalization_is_idempotent() {
        let query = CursorQuery {
            cursor: " c ".to_string(),
            limit: -5,
            order: "ASC".to_string(),
        };
        let once = query.normalize();
        let twice = once.clone().normalize();
        assert_eq!(once, twice);

        let query = PageQuery {
            page: 0,
            limit: 1_000,
            order: "None".to_string(),
        };
        let once = query.normalize();
        let twice = once.clone().normalize();
        assert_eq!(once, twice);
    }
}
