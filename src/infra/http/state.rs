use std::sync::Arc;

use crate::application::tasks::TaskService;

use super::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub tasks: Arc<TaskService>,
    pub rate_limiter: Arc<RateLimiter>,
    /// max-age for read responses, aligned with the service cache TTL.
    pub cache_max_age_secs: u64,
}
