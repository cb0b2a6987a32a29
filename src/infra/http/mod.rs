pub mod conditional;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod state;

pub use rate_limit::RateLimiter;
pub use state::AppState;

use axum::middleware;
use axum::routing::{get, patch};
use axum::Router;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/tasks",
            get(handlers::list_tasks).post(handlers::create_task),
        )
        .route(
            "/tasks/{id}",
            get(handlers::get_task)
                .put(handlers::update_task)
                .delete(handlers::delete_task),
        )
        .route("/tasks/{id}/done", patch(handlers::mark_task_done))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::enforce,
        ))
        .with_state(state)
}
