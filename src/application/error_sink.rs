//! Asynchronous error reporting sink.
//!
//! Cache invalidation failures and similar degradations are reported here
//! rather than surfaced to the caller.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("error sink closed")]
    Closed,
}

#[async_trait]
pub trait ErrorSink: Send + Sync {
    async fn log_error(
        &self,
        service: &str,
        operation: &str,
        message: &str,
        metadata: serde_json::Value,
    ) -> Result<(), SinkError>;

    async fn close(&self) -> Result<(), SinkError>;
}

/// Sink that emits through the tracing subscriber. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

#[async_trait]
impl ErrorSink for TracingErrorSink {
    async fn log_error(
        &self,
        service: &str,
        operation: &str,
        message: &str,
        metadata: serde_json::Value,
    ) -> Result<(), SinkError> {
        warn!(
            service,
            operation,
            metadata = %metadata,
            "{message}"
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
