use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::application::pagination::{CursorOptions, SortOrder};
use crate::application::repos::{
    CURSOR_TIME_FIELD, CreateTaskParams, RepoError, TaskCursor, TaskPage, TasksRepo,
    UpdateTaskParams,
};
use crate::domain::tasks::TaskRecord;

use super::PostgresRepositories;
use super::util::map_sqlx_error;

const TASK_COLUMNS: &str =
    "id, title, description, done, owner, created_at, updated_at, deleted_at";

/// Cursor predicates compare at second resolution to match the cursor wire
/// format; ids are monotonic, so the id tie-breaker resolves sub-second
/// neighbors consistently.
const EPOCH_SECONDS_EXPR: &str = "floor(extract(epoch FROM created_at))::bigint";

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: i64,
    title: String,
    description: Option<String>,
    done: bool,
    owner: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    deleted_at: Option<OffsetDateTime>,
}

impl From<TaskRow> for TaskRecord {
    fn from(row: TaskRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            done: row.done,
            owner: row.owner,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

fn push_order(qb: &mut QueryBuilder<'_, Postgres>, order: SortOrder) {
    match order {
        SortOrder::Desc => qb.push(" ORDER BY created_at DESC, id DESC "),
        SortOrder::Asc => qb.push(" ORDER BY created_at ASC, id ASC "),
    };
}

fn encode_row_cursor(row: &TaskRecord, order: SortOrder) -> Result<String, RepoError> {
    let opts = CursorOptions::new(CURSOR_TIME_FIELD, order);
    let cursor = TaskCursor::new(row.id, row.created_at.unix_timestamp(), "");
    cursor.encode(&opts).map_err(RepoError::from)
}

#[async_trait]
impl TasksRepo for PostgresRepositories {
    async fn create(&self, params: CreateTaskParams) -> Result<TaskRecord, RepoError> {
        let now = self.clock().now_utc();
        let row = sqlx::query_as::<_, TaskRow>(
            "INSERT INTO tasks (title, description, done, owner, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $5) \
             RETURNING id, title, description, done, owner, created_at, updated_at, deleted_at",
        )
        .bind(&params.title)
        .bind(&params.description)
        .bind(params.done)
        .bind(params.owner)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<TaskRecord>, RepoError> {
        let row = sqlx::query_as::<_, TaskRow>(
            "SELECT id, title, description, done, owner, created_at, updated_at, deleted_at \
             FROM tasks WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(TaskRecord::from))
    }

    async fn list(
        &self,
        limit: i64,
        cursor: &TaskCursor,
        order: SortOrder,
    ) -> Result<TaskPage, RepoError> {
        let limit = limit.clamp(1, 100);

        let mut qb = QueryBuilder::new(format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE deleted_at IS NULL "
        ));

        if !cursor.is_start() {
            qb.push(format!(" AND ({EPOCH_SECONDS_EXPR}, id)"));
            match order {
                SortOrder::Desc => qb.push(" < ("),
                SortOrder::Asc => qb.push(" > ("),
            };
            qb.push_bind(cursor.timestamp);
            qb.push(", ");
            qb.push_bind(cursor.id);
            qb.push(")");
        }

        push_order(&mut qb, order);
        qb.push(" LIMIT ");
        qb.push_bind(limit + 1);

        let mut rows = qb
            .build_query_as::<TaskRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let has_more = rows.len() as i64 > limit;
        if has_more {
            rows.pop();
        }

        let items: Vec<TaskRecord> = rows.into_iter().map(TaskRecord::from).collect();

        // The next cursor comes from the last visible row; the walk ends
        // when a page comes back empty.
        let next_cursor = match items.last() {
            Some(last) => Some(encode_row_cursor(last, order)?),
            None => None,
        };
        let prev_cursor = match (cursor.is_start(), items.first()) {
            (false, Some(first)) => Some(encode_row_cursor(first, order)?),
            _ => None,
        };

        Ok(TaskPage {
            items,
            next_cursor,
            prev_cursor,
        })
    }

    async fn list_by_page(
        &self,
        page: i64,
        limit: i64,
        order: SortOrder,
    ) -> Result<(Vec<TaskRecord>, i64), RepoError> {
        let limit = limit.clamp(1, 100);
        let offset = (page.max(1) - 1) * limit;

        let mut qb = QueryBuilder::new(format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE deleted_at IS NULL "
        ));
        push_order(&mut qb, order);
        qb.push(" LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<TaskRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let total = self.total_count().await?;

        Ok((rows.into_iter().map(TaskRecord::from).collect(), total))
    }

    async fn update(&self, id: i64, params: UpdateTaskParams) -> Result<TaskRecord, RepoError> {
        // `owner` and `created_at` are deliberately absent from the SET
        // list; the stored values win over whatever the caller sent.
        let now = self.clock().now_utc();
        let row = sqlx::query_as::<_, TaskRow>(
            "UPDATE tasks SET title = $1, description = $2, done = $3, updated_at = $4 \
             WHERE id = $5 AND deleted_at IS NULL \
             RETURNING id, title, description, done, owner, created_at, updated_at, deleted_at",
        )
        .bind(&params.title)
        .bind(&params.description)
        .bind(params.done)
        .bind(now)
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(TaskRecord::from).ok_or(RepoError::NotFound)
    }

    async fn mark_done(&self, id: i64) -> Result<TaskRecord, RepoError> {
        let now = self.clock().now_utc();
        let row = sqlx::query_as::<_, TaskRow>(
            "UPDATE tasks SET done = TRUE, updated_at = $1 \
             WHERE id = $2 AND deleted_at IS NULL \
             RETURNING id, title, description, done, owner, created_at, updated_at, deleted_at",
        )
        .bind(now)
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(TaskRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete(&self, id: i64) -> Result<(), RepoError> {
        let now = self.clock().now_utc();
        let result = sqlx::query(
            "UPDATE tasks SET deleted_at = $1 WHERE id = $2 AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn total_count(&self) -> Result<i64, RepoError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks WHERE deleted_at IS NULL")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}
