//! apollo-hv - Hermes Verifier microservice
//!
//! **Module Identity:**
//! - Name: apollo-hv (Hermes Verifier)
//! - Port: 5821
//!
//! Polls pending fire reports, classifies their media, records verdicts,
//! and streams notifications to the dashboard.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use apollo_hv::db::SqliteStore;
use apollo_hv::pipeline::classifier::DEFAULT_CLASSIFIER_URL;
use apollo_hv::pipeline::{FfmpegFrameReader, HttpClassifier};
use apollo_hv::{
    AppState, NotificationChannel, VerificationScheduler, VerificationToggle, VerifierConfig,
};

const DEFAULT_PORT: u16 = 5821;
const MODULE_NAME: &str = "apollo-hv";

/// Command-line arguments for apollo-hv
#[derive(Parser, Debug)]
#[command(name = "apollo-hv")]
#[command(about = "Hermes fire report verification microservice")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "APOLLO_HV_PORT")]
    port: Option<u16>,

    /// Root folder holding the database and scratch media
    #[arg(short, long, env = "APOLLO_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Bootstrap TOML file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = apollo_common::config::load_module_config(args.config.as_deref(), MODULE_NAME)
        .context("Failed to load bootstrap configuration")?;

    let level = toml_config.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("apollo_hv={0},apollo_common={0},tower_http={0}", level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "apollo-hv v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = apollo_common::config::resolve_root_folder(
        args.root_folder.as_deref(),
        "APOLLO_ROOT_FOLDER",
        &toml_config,
    );
    let db_path = apollo_common::config::prepare_root_folder(&root_folder)
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", root_folder.display());
    info!("Database: {}", db_path.display());

    let db_pool = apollo_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let config = VerifierConfig::from_database(&db_pool, &root_folder).await;
    info!(
        interval_secs = config.interval_secs,
        batch_size = config.batch_size,
        threshold = config.detection_threshold,
        scratch_dir = %config.scratch_dir.display(),
        "Verification config loaded"
    );

    let classifier_url = toml_config
        .classifier_url
        .clone()
        .unwrap_or_else(|| DEFAULT_CLASSIFIER_URL.to_string());
    let classifier = HttpClassifier::new(&classifier_url, config.inference_timeout())
        .context("Failed to build classifier client")?;
    info!("Classifier endpoint: {}", classifier.url());

    let toggle = Arc::new(VerificationToggle::new());
    let notifications = Arc::new(NotificationChannel::new(config.keepalive()));
    let store = Arc::new(SqliteStore::new(db_pool.clone()));

    let scheduler = Arc::new(VerificationScheduler::new(
        &config,
        Arc::clone(&toggle),
        store.clone(),
        store,
        Arc::new(classifier),
        Arc::new(FfmpegFrameReader::default()),
        Arc::clone(&notifications),
    ));
    let state = AppState::new(
        db_pool,
        config,
        toggle,
        notifications,
        scheduler.status(),
    );
    let scheduler_handle = scheduler.start();
    let shutdown = state.shutdown.clone();

    let app = apollo_hv::build_router(state);

    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Ends open notification streams so in-flight requests can drain
            shutdown.cancel();
        })
        .await
        .context("Server error")?;

    scheduler_handle.stop().await;
    info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
