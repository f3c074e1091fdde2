use anyhow::{Context, Result};
use axum::serve;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use swarm_tracker::core::config::Config;
use swarm_tracker::core::routes::build_router;
use swarm_tracker::core::startup::{persist_state, restore_state, spawn_maintenance_tasks};
use swarm_tracker::core::state::AppState;
use swarm_tracker::core::tracing_init::init_tracing;
use swarm_tracker::udp::server::UdpServer;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tower::ServiceBuilder;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info, warn, Level};

fn main() -> Result<()> {
    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    // Load and validate configuration
    let config = Config::from_file(&config_path).context(format!(
        "Failed to load configuration from '{}'. \
        If this is your first time running the tracker, copy config.example.toml to config.toml and adjust the values.",
        config_path.display()
    ))?;

    init_tracing(&config.logging)?;

    // Build Tokio runtime with configured number of threads
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.num_threads)
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    runtime.block_on(async_main(config, config_path))
}

async fn async_main(config: Config, config_path: PathBuf) -> Result<()> {
    info!(
        config_path = %config_path.display(),
        udp_enabled = config.udp.enabled,
        udp_bind = %config.udp.bind,
        http_enabled = config.http.enabled,
        http_bind = %config.http.bind,
        num_threads = config.server.num_threads,
        log_level = %config.logging.level,
        log_format = %config.logging.format,
        "Swarm tracker starting"
    );

    let state = AppState::new(config.clone()).context("Failed to initialise backup backend")?;
    restore_state(&state);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let maintenance = spawn_maintenance_tasks(&state, shutdown_rx.clone());

    let mut servers: JoinSet<Result<()>> = JoinSet::new();

    if config.udp.enabled {
        let tracker = Arc::new(state.udp_tracker());
        let server = UdpServer::bind(config.udp.bind, tracker)
            .await
            .context(format!("Failed to bind UDP socket to {}", config.udp.bind))?;

        info!(address = ?server.local_addr().ok(), "UDP listener bound successfully");

        let workers = config.udp.workers;
        let shutdown = shutdown_rx.clone();
        servers.spawn(async move {
            server.serve(workers, shutdown).await;
            Ok(())
        });
    }

    if config.http.enabled {
        let app = build_router(Arc::new(state.clone())).layer(
            ServiceBuilder::new().layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                    .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
            ),
        );

        let listener = TcpListener::bind(config.http.bind)
            .await
            .context(format!("Failed to bind TCP listener to {}", config.http.bind))?;

        info!(address = %config.http.bind, "HTTP listener bound successfully");

        let mut shutdown = shutdown_rx.clone();
        servers.spawn(async move {
            serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = shutdown.wait_for(|stop| *stop).await;
                })
                .await
                .context("HTTP server error")
        });
    }

    info!(
        peers = state.peer_store.total_peers(),
        swarms = state.peer_store.active_swarms(),
        connections = state.connections.len(),
        "Swarm tracker startup complete"
    );

    tokio::select! {
        _ = shutdown_signal() => {}
        Some(result) = servers.join_next() => {
            match result {
                Ok(Ok(())) => warn!("Server stopped unexpectedly"),
                Ok(Err(e)) => error!(error = %e, "Server failed"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    let _ = shutdown_tx.send(true);

    while let Some(result) = servers.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Server failed during shutdown"),
            Err(e) => error!(error = %e, "Server task panicked"),
        }
    }

    for handle in maintenance {
        if let Err(e) = handle.await {
            error!(error = %e, "Maintenance task failed");
        }
    }

    persist_state(&state);

    info!("Shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM. SIGHUP and SIGUSR1 are logged and ignored.
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let handlers = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
        signal(SignalKind::user_defined1()),
    );

    match handlers {
        (Ok(mut interrupt), Ok(mut terminate), Ok(mut hangup), Ok(mut user1)) => loop {
            tokio::select! {
                _ = interrupt.recv() => {
                    info!("Received SIGINT signal");
                    break;
                }
                _ = terminate.recv() => {
                    info!("Received SIGTERM signal");
                    break;
                }
                _ = hangup.recv() => info!("Received SIGHUP signal, ignoring"),
                _ = user1.recv() => info!("Received SIGUSR1 signal, ignoring"),
            }
        },
        _ => {
            error!("Failed to install signal handlers, falling back to Ctrl+C only");
            ctrl_c().await;
        }
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    ctrl_c().await;
    info!("Shutdown signal received, starting graceful shutdown");
}

async fn ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C, shutdown requires SIGKILL");
        std::future::pending::<()>().await;
    }
}
