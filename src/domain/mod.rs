//! Domain layer: core types, dedup cache, and the ingestion queue.
//!
//! This module contains the data model shared by every stage of the
//! event-to-alert pipeline: raw webhook records, normalized swap and pool
//! records, token entities, rolling metrics, score results and per-token
//! alert state.

pub mod alert;
pub mod dedup_cache;
pub mod ingest_queue;
pub mod metrics;
pub mod mint;
pub mod normalized;
pub mod raw_event;
pub mod score;
pub mod token;

pub use alert::{AlertDecision, AlertState, MessageHandle};
pub use dedup_cache::{DedupCache, DedupCapacities, KeySpace};
pub use ingest_queue::{IngestBatch, IngestQueue};
pub use metrics::{HolderSnapshot, MetricsSnapshot, WindowStats};
pub use mint::Mint;
pub use normalized::{
    NormalizedEvent, NormalizedPoolCreation, NormalizedSwap, Provenance, Side, TokenSighting,
};
pub use raw_event::{Instruction, NativeTransfer, RawEvent, TokenTransfer, WebhookPayload};
pub use score::{ComponentScore, Reason, RiskFlag, ScoreComponent, ScoreResult};
pub use token::{TokenEnrichment, TokenRecord, TokenStatus};
