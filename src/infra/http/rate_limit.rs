//! Fixed-window rate limiting over the shared key/value store.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use metrics::counter;
use tracing::warn;

use crate::cache::{CacheError, CacheStore};

use super::error::ApiError;
use super::state::AppState;

/// One counter per client key per window. INCR creates the counter at 1;
/// the expiry is set when the window opens. A boundary burst of up to
/// twice the limit is the accepted trade-off of the single counter.
pub struct RateLimiter {
    store: Arc<dyn CacheStore>,
    window: Duration,
    limit: i64,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CacheStore>, window: Duration, limit: i64) -> Self {
        Self {
            store,
            window,
            limit,
        }
    }

    pub async fn allow(&self, key: &str) -> Result<bool, CacheError> {
        let counter_key = format!("ratelimit_{key}");
        let count = self.store.incr(&counter_key).await?;
        if count == 1 {
            self.store.expire(&counter_key, self.window).await?;
        }
        Ok(count <= self.limit)
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }
}

/// Middleware: 429 with Retry-After when the window is exhausted, 503 when
/// the backing store cannot be reached (fail closed).
pub async fn enforce(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(request.headers());

    match state.rate_limiter.allow(&key).await {
        Ok(true) => next.run(request).await,
        Ok(false) => {
            counter!("tasknest_rate_limit_rejected_total").increment(1);
            ApiError::rate_limited(state.rate_limiter.retry_after_secs())
        }
        Err(err) => {
            warn!(error = %err, "rate limiter store unreachable, failing closed");
            ApiError::unavailable("Service temporarily unavailable").into_response()
        }
    }
}

fn client_key(headers: &HeaderMap) -> String {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|value| value.to_str().ok())
        })
        .unwrap_or("anonymous")
        .to_string()
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;
    use crate::cache::MemoryStore;
    use crate::util::clock::ManualClock;

    #[tokio::test]
    async fn window_admits_at_most_limit_calls() {
        let clock = Arc::new(ManualClock::new(OffsetDateTime::UNIX_EPOCH));
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let limiter = RateLimiter::new(store, Duration::from_secs(60), 3);

        assert!(limiter.allow("k").await.expect("first"));
        assert!(limiter.allow("k").await.expect("second"));
        assert!(limiter.allow("k").await.expect("third"));
        assert!(!limiter.allow("k").await.expect("fourth denied"));

        clock.advance(Duration::from_secs(60));
        assert!(limiter.allow("k").await.expect("new window"));
    }

    #[tokio::test]
    async fn keys_are_tracked_independently() {
        let clock = Arc::new(ManualClock::new(OffsetDateTime::UNIX_EPOCH));
        let store = Arc::new(MemoryStore::new(clock));
        let limiter = RateLimiter::new(store, Duration::from_secs(60), 1);

        assert!(limiter.allow("a").await.expect("a"));
        assert!(limiter.allow("b").await.expect("b unaffected"));
        assert!(!limiter.allow("a").await.expect("a exhausted"));
    }

    #[test]
    fn client_key_prefers_authorization() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer t".parse().unwrap());
        headers.insert("x-forwarded-for", "10.0.0.1".parse().unwrap());
        assert_eq!(client_key(&headers), "Bearer t");

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.1".parse().unwrap());
        assert_eq!(client_key(&headers), "10.0.0.1");

        assert_eq!(client_key(&HeaderMap::new()), "anonymous");
    }
}
