//! token-radar server entry point.
//!
//! Wires storage, enrichment source, notifier and workers, then serves the
//! webhook endpoint until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use token_radar::api;
use token_radar::app_state::AppState;
use token_radar::config::RadarConfig;
use token_radar::domain::{DedupCache, IngestQueue};
use token_radar::notify::{LogNotifier, Notifier, TelegramNotifier};
use token_radar::persistence::{PostgresStorage, Storage};
use token_radar::service::{
    AlertDispatcher, AlertStateMachine, EnrichmentJob, EventNormalizer, IngestService,
    IngestWorker, PeriodicWorker, ScoringJob,
};
use token_radar::sources::{EnrichmentSource, HeliusSource, RetryPolicy, UnconfiguredSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = RadarConfig::from_env().context("invalid configuration")?;
    tracing::info!(addr = %config.listen_addr, "starting token-radar");

    let storage: Arc<dyn Storage> = Arc::new(
        PostgresStorage::connect(
            &config.database_url,
            config.database_max_connections,
            Duration::from_secs(config.database_connect_timeout_secs),
        )
        .await
        .context("database unavailable")?,
    );

    let source = build_source(&config)?;
    let notifier = build_notifier(&config)?;

    // Ingestion
    let dedup = Arc::new(DedupCache::new(config.dedup));
    let normalizer = EventNormalizer::new(dedup, config.sol_price_usd);
    let ingest = Arc::new(IngestService::new(
        Arc::clone(&storage),
        normalizer,
        config.store_raw_events,
    ));
    let (queue, receiver) = IngestQueue::new(config.ingest_queue_capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ingest_handle =
        IngestWorker::new(ingest, config.ingest_max_in_flight).spawn(receiver, shutdown_rx);

    // Periodic workers
    let enrichment = EnrichmentJob::new(
        Arc::clone(&storage),
        source,
        RetryPolicy::from(&config.retry),
        config.enrichment,
    );
    let dispatcher = AlertDispatcher::new(notifier, Arc::clone(&storage));
    let scoring = ScoringJob::new(
        Arc::clone(&storage),
        dispatcher,
        AlertStateMachine::new(config.alerts),
        config.scoring.batch_size,
    );
    let mut workers = vec![
        PeriodicWorker::new(Arc::new(enrichment), config.enrichment.interval),
        PeriodicWorker::new(Arc::new(scoring), config.scoring.interval),
    ];
    for worker in &mut workers {
        worker.start();
    }

    // HTTP
    let app = api::build_router(AppState::new(queue, config.webhook_secret.as_deref()));
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("cannot bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shutting down");
    for worker in &mut workers {
        worker.stop().await;
    }
    let _ = shutdown_tx.send(true);
    if let Err(e) = ingest_handle.await {
        tracing::error!(error = %e, "ingest worker panicked");
    }
    tracing::info!("shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_source(config: &RadarConfig) -> anyhow::Result<Arc<dyn EnrichmentSource>> {
    match config.helius_api_key.as_deref() {
        Some(key) => Ok(Arc::new(
            HeliusSource::new(&config.helius_rpc_url, key).context("enrichment client")?,
        )),
        None => {
            tracing::warn!("HELIUS_API_KEY not set, enrichment will record errors only");
            Ok(Arc::new(UnconfiguredSource))
        }
    }
}

fn build_notifier(config: &RadarConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    match (
        config.telegram_bot_token.as_deref(),
        config.telegram_chat_id.as_deref(),
    ) {
        (Some(token), Some(chat_id)) => Ok(Arc::new(
            TelegramNotifier::new(token, chat_id).context("telegram client")?,
        )),
        _ => {
            tracing::warn!("Telegram not configured, alerts will be logged only");
            Ok(Arc::new(LogNotifier::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
