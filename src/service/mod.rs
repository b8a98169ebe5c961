//! Service layer: the ingestion, enrichment and scoring pipeline.
//!
//! [`IngestService`] turns webhook batches into stored swaps, pools and
//! tokens via [`EventNormalizer`]. Two [`PeriodicWorker`]s drive
//! [`EnrichmentJob`] and [`ScoringJob`]; the latter chains
//! [`MetricsAggregator`], [`ScoringEngine`] and [`AlertStateMachine`], and
//! hands alerts to [`AlertDispatcher`].

pub mod aggregator;
pub mod alerting;
pub mod enrichment;
pub mod ingest;
pub mod normalizer;
pub mod scoring;
pub mod scoring_job;
pub mod worker;

pub use aggregator::MetricsAggregator;
pub use alerting::{AlertDispatcher, AlertStateMachine, DispatchOutcome};
pub use enrichment::{EnrichmentJob, EnrichmentReport};
pub use ingest::{IngestService, IngestSummary, IngestWorker};
pub use normalizer::EventNormalizer;
pub use scoring::{ScoringEngine, ScoringInput};
pub use scoring_job::{ScoringJob, ScoringReport, TokenEvaluation};
pub use worker::{BatchJob, PeriodicWorker};
