//! # token-radar
//!
//! Webhook-driven monitor for newly traded tokens. Swap, pool-creation and
//! transfer notifications are normalized and stored, tokens are enriched
//! with on-chain facts, and a deterministic 0-100 risk score drives
//! operator alerts.
//!
//! ## Architecture
//!
//! ```text
//! Webhook sender
//!     │
//!     ├── POST /webhook (api/)
//!     ├── IngestQueue (domain/)
//!     │
//!     ├── IngestWorker → EventNormalizer + DedupCache (service/)
//!     │
//!     ├── Storage: PostgreSQL or in-memory (persistence/)
//!     │
//!     ├── EnrichmentJob ← EnrichmentSource (sources/)
//!     ├── ScoringJob → MetricsAggregator → ScoringEngine
//!     │       └── AlertStateMachine → AlertDispatcher
//!     │
//!     └── Notifier: Telegram or log (notify/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod notify;
pub mod persistence;
pub mod service;
pub mod sources;
