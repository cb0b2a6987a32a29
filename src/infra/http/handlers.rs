//! Task CRUD and listing handlers.
//!
//! Handlers own everything HTTP: parameter shapes, conditional-request
//! headers, and status codes. The service below them never sees the
//! framework.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::application::pagination::{CursorQuery, PageQuery};
use crate::application::repos::{CreateTaskParams, UpdateTaskParams};

use super::conditional;
use super::error::ApiError;
use super::state::AppState;

/// Raw list parameters. The presence of `page` selects page mode;
/// otherwise the cursor mode applies. Normalization happens in the
/// pagination validator, not here.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub cursor: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub order: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskBody {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub done: bool,
    pub owner: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskBody {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub done: bool,
    /// Accepted but ignored; the stored owner always wins.
    #[serde(default)]
    pub owner: i64,
}

pub async fn list_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    if let Some(page) = params.page {
        let query = PageQuery {
            page,
            limit: params.limit.unwrap_or_default(),
            order: params.order.unwrap_or_default(),
        };
        let listing = state.tasks.list_by_page(query).await?;
        let tag = conditional::etag_from_tasks(&listing.items);
        return Ok(conditional_read(&headers, &tag, &state, Json(listing)));
    }

    let query = CursorQuery {
        cursor: params.cursor.unwrap_or_default(),
        limit: params.limit.unwrap_or_default(),
        order: params.order.unwrap_or_default(),
    };
    let listing = state.tasks.list(query).await?;
    let tag = conditional::etag_from_tasks(&listing.items);
    Ok(conditional_read(&headers, &tag, &state, Json(listing)))
}

pub async fn get_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let task = state.tasks.find(id).await?;
    let tag = conditional::generate_etag(&task);
    Ok(conditional_read(&headers, &tag, &state, Json(task)))
}

pub async fn create_task(
    State(state): State<AppState>,
    Json(body): Json<CreateTaskBody>,
) -> Result<Response, ApiError> {
    let task = state
        .tasks
        .create(CreateTaskParams {
            title: body.title,
            description: body.description,
            done: body.done,
            owner: body.owner,
        })
        .await?;

    let mut response = (StatusCode::CREATED, Json(task)).into_response();
    conditional::add_cache_control(response.headers_mut(), true, 0);
    Ok(response)
}

pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateTaskBody>,
) -> Result<Response, ApiError> {
    let task = state
        .tasks
        .update(
            id,
            UpdateTaskParams {
                title: body.title,
                description: body.description,
                done: body.done,
                owner: body.owner,
            },
        )
        .await?;

    let mut response = Json(task).into_response();
    conditional::add_cache_control(response.headers_mut(), true, 0);
    Ok(response)
}

pub async fn mark_task_done(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let task = state.tasks.mark_done(id).await?;

    let mut response = Json(task).into_response();
    conditional::add_cache_control(response.headers_mut(), true, 0);
    Ok(response)
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    state.tasks.delete(id).await?;

    let mut response = StatusCode::NO_CONTENT.into_response();
    conditional::add_cache_control(response.headers_mut(), true, 0);
    Ok(response)
}

/// Assemble a read response: 304 with headers only when If-None-Match
/// matches, otherwise the body with ETag and private caching headers.
fn conditional_read(
    request_headers: &HeaderMap,
    tag: &str,
    state: &AppState,
    body: impl IntoResponse,
) -> Response {
    if conditional::is_not_modified(request_headers, tag) {
        let mut response = StatusCode::NOT_MODIFIED.into_response();
        conditional::set_etag(response.headers_mut(), tag);
        conditional::add_cache_control(response.headers_mut(), false, state.cache_max_age_secs);
        return response;
    }

    let mut response = body.into_response();
    conditional::set_etag(response.headers_mut(), tag);
    conditional::add_cache_control(response.headers_mut(), false, state.cache_max_age_secs);
    response
}
