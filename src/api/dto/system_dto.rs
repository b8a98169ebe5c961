//! Health check body.

use serde::Serialize;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"healthy"` while the ingest worker is accepting work.
    pub status: &'static str,
    /// RFC 3339 server time.
    pub timestamp: String,
    /// Crate version.
    pub version: &'static str,
    /// Free slots in the ingest queue.
    pub queue_capacity: usize,
}
