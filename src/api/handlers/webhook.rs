//! Webhook receiver.
//!
//! The handler only authenticates, parses and enqueues; processing happens
//! on the ingest worker so the sender gets a fast acknowledgement.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use subtle::ConstantTimeEq;

use crate::api::dto::WebhookAck;
use crate::app_state::AppState;
use crate::domain::{IngestBatch, WebhookPayload};
use crate::error::RadarError;

/// `POST /webhook`: accepts one record or an array of records.
///
/// # Errors
///
/// - [`RadarError::Unauthorized`] when a secret is configured and the
///   `Authorization` header does not match it
/// - [`RadarError::InvalidPayload`] when the body is not a record or array
/// - [`RadarError::QueueFull`] when ingestion is saturated, so the sender
///   retries later
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, RadarError> {
    if let Some(secret) = state.webhook_secret.as_deref() {
        let provided = headers
            .get(header::AUTHORIZATION)
            .map(|v| v.as_bytes())
            .unwrap_or_default();
        if !secret_matches(secret.as_bytes(), provided) {
            tracing::warn!("webhook rejected: bad authorization");
            return Err(RadarError::Unauthorized);
        }
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| RadarError::InvalidPayload(e.to_string()))?;
    let events = payload.into_events();
    let count = events.len();
    state.queue.try_enqueue(IngestBatch::new(events))?;
    tracing::debug!(events = count, "webhook queued");

    Ok((StatusCode::ACCEPTED, Json(WebhookAck::accepted(count))))
}

fn secret_matches(expected: &[u8], provided: &[u8]) -> bool {
    expected.ct_eq(provided).into()
}
