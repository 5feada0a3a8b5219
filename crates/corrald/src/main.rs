//! corrald - Corral daemon.
//!
//! Serves the container lifecycle API over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use corral::runtime::Engine;
use corral::supervisor::{ProcessSupervisor, SimulatedSupervisor};
use corral_common::StatusPolicy;
use corrald::{AppState, DaemonConfig, LogFormat, SupervisorKind, create_router};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "CORRALD_LISTEN")]
    listen: Option<SocketAddr>,

    /// TOML config file
    #[arg(long, env = "CORRALD_CONFIG")]
    config: Option<PathBuf>,

    /// Process supervisor backing the engine
    #[arg(long, value_enum, env = "CORRALD_SUPERVISOR")]
    supervisor: Option<SupervisorKind>,

    /// How invalid transitions are reported: compat (500) or conflict (409)
    #[arg(long, env = "CORRALD_STATUS_POLICY")]
    status_policy: Option<StatusPolicy>,

    /// Default stop timeout in seconds
    #[arg(long, env = "CORRALD_STOP_TIMEOUT")]
    stop_timeout: Option<u64>,

    /// Log output format
    #[arg(long, value_enum, env = "CORRALD_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

impl Args {
    fn resolve(self) -> anyhow::Result<DaemonConfig> {
        let mut config = match &self.config {
            Some(path) => DaemonConfig::from_file(path)?,
            None => DaemonConfig::default(),
        };

        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(supervisor) = self.supervisor {
            config.supervisor = supervisor;
        }
        if let Some(policy) = self.status_policy {
            config.status_policy = policy;
        }
        if let Some(secs) = self.stop_timeout {
            config.stop_timeout = secs;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        Ok(config)
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("corral=info,corrald=info,tower_http=info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

fn supervisor(kind: SupervisorKind) -> anyhow::Result<Arc<dyn ProcessSupervisor>> {
    match kind {
        SupervisorKind::Simulated => Ok(Arc::new(SimulatedSupervisor::new())),
        #[cfg(unix)]
        SupervisorKind::Native => Ok(Arc::new(corral::supervisor::NativeSupervisor::new())),
        #[cfg(not(unix))]
        SupervisorKind::Native => {
            anyhow::bail!("the native supervisor is only available on Unix; use --supervisor simulated")
        }
    }
}

async fn shutdown_signal(token: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "cannot listen for ctrl-c");
            }
        }
        () = terminate => {}
    }

    tracing::info!("shutting down");
    token.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Args::parse().resolve()?;
    init_tracing(config.log_format);

    let engine = Engine::new(supervisor(config.supervisor)?, config.engine_config());
    let monitor = engine.start_exit_monitor();

    let shutdown = CancellationToken::new();
    let state = AppState::new(engine)
        .with_policy(config.status_policy)
        .with_shutdown(shutdown.clone());
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    tracing::info!(
        listen = %config.listen,
        supervisor = ?config.supervisor,
        status_policy = %config.status_policy,
        "corrald started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("HTTP server failed")?;

    if let Some(monitor) = monitor {
        monitor.abort();
    }
    Ok(())
}
