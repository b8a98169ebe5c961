//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::IngestQueue;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Hand-off to the ingest worker.
    pub queue: IngestQueue,
    /// Expected `Authorization` header value; `None` disables the check.
    pub webhook_secret: Option<Arc<str>>,
}

impl AppState {
    /// Creates state for the given queue and optional shared secret.
    #[must_use]
    pub fn new(queue: IngestQueue, webhook_secret: Option<&str>) -> Self {
        Self {
            queue,
            webhook_secret: webhook_secret.filter(|s| !s.is_empty()).map(Arc::from),
        }
    }
}
