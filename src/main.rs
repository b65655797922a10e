use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use hotel_concierge::api::{AppState, router};
use hotel_concierge::auth;
use hotel_concierge::config::{
    HotelInfo, LlmSettings, PipelineConfig, ServerConfig, StaffCredentials,
};
use hotel_concierge::llm::create_provider;
use hotel_concierge::store::LibSqlBackend;

/// How often expired sessions are swept.
const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("Warning: a rustls crypto provider was already installed");
    }

    let server = ServerConfig::from_env()?;
    let _log_guard = init_tracing(server.log_dir.as_deref());

    let hotel = HotelInfo::from_env();
    let llm_settings = LlmSettings::from_env()?;
    let staff = StaffCredentials::from_env()?;

    eprintln!("🏨 Hotel Concierge v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}", server.port);
    eprintln!("   Request feed: ws://0.0.0.0:{}/ws/requests", server.port);

    let llm = match llm_settings.llm_config() {
        Some(config) => {
            eprintln!(
                "   Model: {} ({})",
                config.model,
                config.backend.as_str()
            );
            Some(create_provider(&config)?)
        }
        None => {
            eprintln!(
                "   Model: none (no {} API key), using keyword matching only",
                llm_settings.backend.as_str()
            );
            None
        }
    };

    match &staff {
        Some(creds) => eprintln!("   Staff login: {}", creds.username),
        None => eprintln!("   Staff login: disabled (HOTEL_ADMIN_PASSWORD not set)"),
    }

    // ── Database ─────────────────────────────────────────────────────────
    let db = Arc::new(LibSqlBackend::new_local(&server.db_path).await.map_err(|e| {
        eprintln!(
            "Error: Failed to open database at {}: {}",
            server.db_path.display(),
            e
        );
        e
    })?);
    eprintln!("   Database: {}", server.db_path.display());

    // ── Services ─────────────────────────────────────────────────────────
    let state = AppState::build(
        db,
        llm,
        PipelineConfig::new(hotel, &llm_settings),
        staff,
        server.session_ttl,
    );
    let _prune_handle = auth::spawn_prune_task(Arc::clone(&state.auth), SESSION_PRUNE_INTERVAL);

    // ── HTTP ─────────────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", server.port)).await?;
    tracing::info!(port = server.port, "Concierge server started");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Concierge server stopped");
    Ok(())
}

/// Stderr logging, plus a daily-rolling file when `log_dir` is set.
///
/// The returned guard flushes the file writer on drop; hold it for the
/// lifetime of the process.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "concierge.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
