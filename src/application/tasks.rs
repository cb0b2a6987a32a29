//! Task service: look-aside reads and write-through invalidation over the
//! repository and the cache store.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::application::error::AppError;
use crate::application::error_sink::ErrorSink;
use crate::application::pagination::{CursorQuery, PageQuery};
use crate::application::repos::{CreateTaskParams, TaskCursor, TasksRepo, UpdateTaskParams};
use crate::cache::store::CacheError;
use crate::cache::{CacheStore, get_json, keys, set_json};
use crate::domain::tasks::{TaskRecord, validate_title};

/// Default time cached reads stay warm.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

const SERVICE: &str = "tasks";

/// Cursor-mode list response, also the cached payload for list variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskListing {
    pub items: Vec<TaskRecord>,
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
    pub total_count: i64,
}

/// Page-mode list response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPageListing {
    pub items: Vec<TaskRecord>,
    pub total_count: i64,
}

pub struct TaskService {
    repo: Arc<dyn TasksRepo>,
    cache: Arc<dyn CacheStore>,
    errors: Arc<dyn ErrorSink>,
    ttl: Duration,
}

impl TaskService {
    pub fn new(
        repo: Arc<dyn TasksRepo>,
        cache: Arc<dyn CacheStore>,
        errors: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            repo,
            cache,
            errors,
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub async fn list(&self, query: CursorQuery) -> Result<TaskListing, AppError> {
        let query = query.normalize();
        let cursor = TaskCursor::decode(&query.cursor)?;

        let key = keys::cursor_list(&query.cursor, query.limit, &query.order);
        if let Some(cached) = self.cache_read::<TaskListing>(&key).await {
            return Ok(cached);
        }

        let page = self
            .repo
            .list(query.limit, &cursor, query.sort_order())
            .await?;
        let total_count = self.repo.total_count().await?;
        let listing = TaskListing {
            items: page.items,
            next_cursor: page.next_cursor,
            prev_cursor: page.prev_cursor,
            total_count,
        };

        self.cache_write(&key, &listing, &[keys::LIST_TAG]).await;
        Ok(listing)
    }

    pub async fn list_by_page(&self, query: PageQuery) -> Result<TaskPageListing, AppError> {
        let query = query.normalize();

        let key = keys::page_list(query.page, query.limit, &query.order);
        if let Some(cached) = self.cache_read::<TaskPageListing>(&key).await {
            return Ok(cached);
        }

        let (items, total_count) = self
            .repo
            .list_by_page(query.page, query.limit, query.sort_order())
            .await?;
        let listing = TaskPageListing { items, total_count };

        self.cache_write(&key, &listing, &[keys::LIST_TAG]).await;
        Ok(listing)
    }

    pub async fn find(&self, id: i64) -> Result<TaskRecord, AppError> {
        let key = keys::entity(id);
        if let Some(cached) = self.cache_read::<TaskRecord>(&key).await {
            return Ok(cached);
        }

        let task = self.repo.find_by_id(id).await?.ok_or(AppError::NotFound)?;

        let tag = keys::task_tag(id);
        self.cache_write(&key, &task, &[tag.as_str()]).await;
        Ok(task)
    }

    pub async fn create(&self, params: CreateTaskParams) -> Result<TaskRecord, AppError> {
        validate_title(&params.title)?;
        let task = self.repo.create(params).await?;
        self.invalidate(task.id).await;
        Ok(task)
    }

    pub async fn update(&self, id: i64, params: UpdateTaskParams) -> Result<TaskRecord, AppError> {
        validate_title(&params.title)?;
        let task = self.repo.update(id, params).await?;
        self.invalidate(id).await;
        Ok(task)
    }

    pub async fn mark_done(&self, id: i64) -> Result<TaskRecord, AppError> {
        let task = self.repo.mark_done(id).await?;
        self.invalidate(id).await;
        Ok(task)
    }

    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        self.repo.delete(id).await?;
        self.invalidate(id).await;
        Ok(())
    }

    /// A cache failure on the read path is a miss: log and fall through to
    /// the repository.
    async fn cache_read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match get_json(self.cache.as_ref(), key).await {
            Ok(cached) => cached,
            Err(err) => {
                warn!(key, error = %err, "cache read failed, falling through to the repository");
                None
            }
        }
    }

    async fn cache_write<T: Serialize>(&self, key: &str, value: &T, tags: &[&str]) {
        if let Err(err) = set_json(self.cache.as_ref(), key, value, self.ttl, tags).await {
            warn!(key, error = %err, "cache write failed");
        }
    }

    /// Write-path invalidation: the entity key, everything tagged as a
    /// list, and both list-key globs. Failures go to the error sink and
    /// never fail the write.
    async fn invalidate(&self, id: i64) {
        let entity_key = keys::entity(id);
        if let Err(err) = self.cache.delete(&entity_key).await {
            self.report("invalidate.entity", id, &err).await;
        }
        if let Err(err) = self.cache.invalidate_by_tags(&[keys::LIST_TAG]).await {
            self.report("invalidate.tags", id, &err).await;
        }
        for pattern in [keys::PAGE_LIST_PATTERN, keys::CURSOR_LIST_PATTERN] {
            if let Err(err) = self.cache.delete_pattern(pattern).await {
                self.report("invalidate.pattern", id, &err).await;
            }
        }
    }

    async fn report(&self, operation: &str, id: i64, err: &CacheError) {
        let _ = self
            .errors
            .log_error(
                SERVICE,
                operation,
                &err.to_string(),
                serde_json::json!({ "task_id": id }),
            )
            .await;
    }
}
