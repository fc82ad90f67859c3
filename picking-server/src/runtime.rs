use std::sync::Arc;

use tokio::net::TcpListener;

use picking_store::{BackupService, GitRepository, SnapshotRepository};

use crate::config::{AuthMode, Config};
use crate::error::{io_err, ServerError};
use crate::http::{app, AppState};

/// Start the server and block the current thread until it exits.
pub fn start_blocking(config: Config) -> Result<(), ServerError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Serve until ctrl-c.
pub async fn run(config: Config) -> Result<(), ServerError> {
    let auth = config.auth_mode()?;
    if auth == AuthMode::Disabled {
        tracing::warn!("AUTH_DISABLED=true: backup endpoints accept unauthenticated requests");
    }

    let service = Arc::new(open_service(&config)?);
    let state = AppState::new(service);
    let app = app(state, auth, &config.allowed_origins);

    let addr = config.server_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

    tracing::info!(
        %addr,
        repo = %config.repo_path.display(),
        file = %config.backup_path().display(),
        branch = %config.branch,
        remote = %config.remote,
        "picking backup server listening",
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

/// Open the repository named by `config` and build the service on top of it.
pub fn open_service(config: &Config) -> Result<BackupService, ServerError> {
    let git = GitRepository::open(&config.repo_path, config.git_settings())?;

    match git.current_branch() {
        Ok(Some(branch)) if branch != config.branch => tracing::warn!(
            checked_out = %branch,
            configured = %config.branch,
            "commits land on the checked-out branch but pushes target the configured one",
        ),
        Ok(None) => tracing::warn!("HEAD is detached; commits will not advance a branch"),
        Ok(Some(_)) => {}
        Err(err) => tracing::debug!(error = %err, "could not resolve checked-out branch"),
    }

    Ok(BackupService::new(
        SnapshotRepository::new(config.backup_path()),
        Box::new(git),
        config.service_settings(),
    ))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received ctrl-c, shutting down"),
        Err(err) => {
            tracing::error!(error = %err, "ctrl-c handler failed; serving until killed");
            std::future::pending::<()>().await;
        }
    }
}

/// Install the global subscriber (`RUST_LOG`, default `info`).
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
