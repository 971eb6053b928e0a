use std::future::Future;

use axum::Router;
use common::utils::logging::init_logging_from_env;
use configs::AppConfig;
use dotenvy::dotenv;
use service::storage::selector;
use service::{NoteService, OpContext};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::errors::StartupError;
use crate::routes;
use crate::rpc::RpcServer;
use crate::state::AppState;

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Public entry: load configuration, then serve until Ctrl+C or SIGTERM.
pub async fn run() -> anyhow::Result<()> {
    run_until(shutdown_signal()).await
}

/// Like [`run`], stopping when `shutdown` resolves.
pub async fn run_until<F>(shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    dotenv().ok();
    init_logging_from_env();

    let cfg = AppConfig::load_and_validate().map_err(|e| StartupError::InvalidConfig(e.to_string()))?;
    let addr = cfg.server.rest_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind { addr: addr.clone(), source })?;
    serve(cfg, listener, shutdown).await
}

/// Wire storage, seed data, the RPC stub and the REST router onto `listener`.
/// Storage is closed once the HTTP server has drained, bounded by the
/// configured shutdown timeout.
pub async fn serve<F>(cfg: AppConfig, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let repo = selector::connect(&cfg.storage).await;
    let notes = NoteService::new(repo);

    if let Err(e) = RpcServer::new(notes.clone(), cfg.server.grpc_addr()).start().await {
        warn!(error = %e, service = "rpc", "RPC listener failed to start");
    }

    if cfg.server.seed_sample_notes {
        let ctx = OpContext::with_timeout(cfg.server.request_timeout());
        notes.seed_sample_notes(&ctx).await?;
    }

    let state = AppState::new(notes.clone(), cfg.server.request_timeout());
    let app: Router = routes::build_router(state, build_cors());

    let addr = listener.local_addr()?;
    info!(%addr, backend = %notes.backend(), service = "rest", event = "listening", "starting REST server");
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    info!(service = "rest", event = "shutdown", "REST server stopped, closing storage");
    let ctx = OpContext::with_timeout(cfg.server.shutdown_timeout());
    if let Err(e) = notes.close(&ctx).await {
        error!(error = %e, event = "storage_close_failed", "failed to close storage");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
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
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(event = "shutdown_signal", signal = "ctrl_c", "shutdown requested"),
        _ = terminate => info!(event = "shutdown_signal", signal = "sigterm", "shutdown requested"),
    }
}
