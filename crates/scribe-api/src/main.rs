//! scribe-api - HTTP API server for scribe

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scribe_api::{router, AppState, ServerConfig, StorageBackend, UploadSettings};
use scribe_core::Repositories;
use scribe_db::{log_pool_metrics, Database, MemoryStore, PoolConfig};
use scribe_inference::{ChatSummarizer, Summarizer, Transcriber, WhisperBackend};
use scribe_jobs::{
    DeliveryConfig, ExtractionHandler, ExtractionPipeline, HandlerEnv, PipelineConfig,
    PopplerPdfExtractor, SummarizationHandler, TranscriptionHandler, WebhookNotifier,
    WorkerBuilder, WorkerConfig, YtDlpSource,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "scribe_api=debug,scribe_jobs=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("scribe-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            // no ANSI in files unless asked for
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let config = ServerConfig::from_env()?;
    let worker_config = WorkerConfig::from_env();
    let repos = connect_storage(&config, worker_config.worker_count).await?;

    // One process-wide shutdown signal for workers and webhook deliveries.
    let shutdown = CancellationToken::new();
    let notifier = WebhookNotifier::new(
        repos.webhooks.clone(),
        DeliveryConfig::from_env(),
        shutdown.clone(),
    );
    let env = HandlerEnv::new(repos.clone(), Arc::new(notifier.clone()));

    // Collaborators
    let transcriber: Option<Arc<dyn Transcriber>> = match WhisperBackend::from_env() {
        Some(backend) => {
            info!(model = backend.model_name(), "Audio transcription enabled");
            Some(Arc::new(backend))
        }
        None => {
            warn!("WHISPER_BASE_URL not set, audio transcription disabled");
            None
        }
    };
    let summarizer: Option<Arc<dyn Summarizer>> = match ChatSummarizer::from_env() {
        Some(backend) => {
            info!(model = backend.model_name(), "Summarization enabled");
            Some(Arc::new(backend))
        }
        None => {
            warn!("OPENAI_API_KEY/OPENAI_BASE_URL not set, summarization disabled");
            None
        }
    };

    let pipeline_config = PipelineConfig::from_env();
    let mut pipeline = ExtractionPipeline::new(
        Arc::new(YtDlpSource::new(pipeline_config.clone())),
        pipeline_config.clone(),
    );
    if let Some(ref t) = transcriber {
        pipeline = pipeline.with_transcriber(t.clone());
    }
    let pdf = PopplerPdfExtractor::new(&pipeline_config);

    // Worker pool
    let mut builder = WorkerBuilder::new()
        .with_config(worker_config.clone())
        .with_cancellation(shutdown.clone())
        .with_handler(ExtractionHandler::new(
            env.clone(),
            Arc::new(pipeline),
            Arc::new(pdf),
        ))
        .with_handler(TranscriptionHandler::new(env.clone(), transcriber));
    if let Some(ref s) = summarizer {
        builder = builder.with_handler(SummarizationHandler::new(env.clone(), s.clone()));
    }
    let pool = builder.build();
    pool.start();

    let state = AppState {
        repos,
        queue: pool.queue().clone(),
        notifier: notifier.clone(),
        uploads: UploadSettings {
            dir: config.upload_dir.clone(),
            max_bytes: config.max_upload_bytes,
        },
        worker_count: if worker_config.enabled {
            worker_config.worker_count
        } else {
            0
        },
        summaries_enabled: summarizer.is_some(),
    };
    let app = router(state);

    // Start server
    let addr = config.addr()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, draining workers");
    pool.stop().await;
    notifier.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}

async fn connect_storage(
    config: &ServerConfig,
    worker_count: usize,
) -> anyhow::Result<Repositories> {
    match config.storage {
        StorageBackend::Postgres => {
            info!("Connecting to database...");
            let pool_config = PoolConfig::from_env(worker_count);
            let db = Database::connect_with_config(&config.database_url, &pool_config).await?;
            info!("Database connected");
            log_pool_metrics(db.pool());

            info!("Running database migrations...");
            db.migrate().await?;
            info!("Database migrations complete");
            Ok(db.repositories())
        }
        StorageBackend::Memory => {
            warn!("STORAGE=memory: records are lost on restart");
            Ok(MemoryStore::new().repositories())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
