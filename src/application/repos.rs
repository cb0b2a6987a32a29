//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::application::pagination::{Cursor, PaginationError, SortOrder};
use crate::domain::tasks::TaskRecord;

/// Cursor over the task ordering: id plus the unix-second `created_at`
/// tie-breaker.
pub type TaskCursor = Cursor<i64>;

/// Timestamp column task cursors are built from.
pub const CURSOR_TIME_FIELD: &str = "created_at";

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("task not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateTaskParams {
    pub title: String,
    pub description: Option<String>,
    pub done: bool,
    pub owner: i64,
}

/// Update payload. `owner` is carried so callers can submit it, but
/// implementations preserve the stored owner unconditionally.
#[derive(Debug, Clone)]
pub struct UpdateTaskParams {
    pub title: String,
    pub description: Option<String>,
    pub done: bool,
    pub owner: i64,
}

/// One keyset page: the visible rows plus opaque continuation cursors.
#[derive(Debug, Clone)]
pub struct TaskPage {
    pub items: Vec<TaskRecord>,
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
}

#[async_trait]
pub trait TasksRepo: Send + Sync {
    /// Assigns the id and both timestamps; `owner` is stored as given.
    async fn create(&self, params: CreateTaskParams) -> Result<TaskRecord, RepoError>;

    /// `Ok(None)` when absent or soft-deleted; errors are real failures.
    async fn find_by_id(&self, id: i64) -> Result<Option<TaskRecord>, RepoError>;

    /// Keyset page after `cursor`. Reads `limit + 1` rows to detect more;
    /// the next cursor is built from the last visible row.
    async fn list(
        &self,
        limit: i64,
        cursor: &TaskCursor,
        order: SortOrder,
    ) -> Result<TaskPage, RepoError>;

    /// Offset page `(page - 1) * limit` plus the non-deleted total.
    async fn list_by_page(
        &self,
        page: i64,
        limit: i64,
        order: SortOrder,
    ) -> Result<(Vec<TaskRecord>, i64), RepoError>;

    /// Preserves the stored `owner` and `created_at`; bumps `updated_at`.
    async fn update(&self, id: i64, params: UpdateTaskParams) -> Result<TaskRecord, RepoError>;

    /// Sets `done = true`; idempotent. Bumps `updated_at`.
    async fn mark_done(&self, id: i64) -> Result<TaskRecord, RepoError>;

    /// Soft delete. Deleting an already-deleted id is `NotFound`.
    async fn delete(&self, id: i64) -> Result<(), RepoError>;

    /// Count of non-deleted tasks.
    async fn total_count(&self) -> Result<i64, RepoError>;
}
