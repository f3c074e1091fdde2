use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backup::Backup;
use crate::core::state::AppState;
use crate::stores::{connection_cache::ConnectionCache, peer_store::PeerStore};
use crate::utils::time::current_timestamp;

// this runs at boot time
pub fn restore_state(state: &AppState) {
    match state.backup.load() {
        Ok(peers) => info!(
            peers,
            swarms = state.peer_store.active_swarms(),
            "Peer store restored from backup"
        ),
        Err(e) => error!(error = %e, "Failed to load backup, continuing with an empty peer store"),
    }

    if let Some(path) = &state.config.connections.persist_path {
        match restore_connections(&state.connections, path) {
            Ok(restored) => info!(path = %path.display(), restored, "Connection ids restored"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to restore connection ids"),
        }
    }
}

/// Best-effort final save on shutdown. Failures are logged, never fatal.
pub fn persist_state(state: &AppState) {
    match state.backup.save() {
        Ok(()) => info!(peers = state.peer_store.total_peers(), "Final peer store backup saved"),
        Err(e) => error!(error = %e, "Failed to save peer store backup on shutdown"),
    }

    if let Some(path) = &state.config.connections.persist_path {
        match persist_connections(&state.connections, path) {
            Ok(()) => info!(path = %path.display(), connections = state.connections.len(), "Connection ids saved"),
            Err(e) => error!(path = %path.display(), error = %e, "Failed to save connection ids"),
        }
    }
}

fn restore_connections(connections: &ConnectionCache, path: &Path) -> Result<usize> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e).context(format!("Failed to read {}", path.display())),
    };

    if data.is_empty() {
        return Ok(0);
    }

    connections
        .unmarshal(&data)
        .context("Failed to decode connection snapshot")
}

fn persist_connections(connections: &ConnectionCache, path: &Path) -> Result<()> {
    let data = connections.marshal().context("Failed to encode connection snapshot")?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context(format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, data).context(format!("Failed to write {}", path.display()))
}

/// Spawn the periodic sweeps and snapshotting. Every task exits when
/// `shutdown` flips to true or its sender is dropped.
pub fn spawn_maintenance_tasks(state: &AppState, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
    let config = &state.config;

    info!(
        trim_interval_seconds = config.peers.trim_interval,
        peer_ttl_seconds = config.peers.ttl,
        gc_interval_seconds = config.connections.gc_interval,
        connection_max_age_seconds = config.connections.max_age,
        backup_interval_seconds = config.backup.interval,
        "Starting maintenance tasks"
    );

    vec![
        spawn_trim_task(
            Arc::clone(&state.peer_store),
            config.peers.trim_interval,
            config.peers.ttl,
            shutdown.clone(),
        ),
        spawn_gc_task(
            Arc::clone(&state.connections),
            config.connections.gc_interval,
            shutdown.clone(),
        ),
        spawn_backup_task(Arc::clone(&state.backup), config.backup.interval, shutdown),
    ]
}

/// Run `tick` every `period` seconds until shutdown. The first tick fires one
/// full period after start.
fn spawn_periodic<F>(period: u64, mut shutdown: watch::Receiver<bool>, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() + Send + 'static,
{
    tokio::spawn(async move {
        let period = Duration::from_secs(period);
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = interval.tick() => tick(),
                _ = shutdown.changed() => break,
            }
        }
    })
}

fn spawn_trim_task(
    peer_store: Arc<PeerStore>,
    trim_interval: u64,
    ttl: i64,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    spawn_periodic(trim_interval, shutdown, move || {
        debug!("Running peer trim");
        let removed = peer_store.trim(current_timestamp(), ttl);

        if removed > 0 {
            info!(
                removed_peers = removed,
                active_peers = peer_store.total_peers(),
                active_swarms = peer_store.active_swarms(),
                "Peer trim completed"
            );
        } else {
            debug!("Peer trim completed, no stale peers found");
        }
    })
}

fn spawn_gc_task(connections: Arc<ConnectionCache>, gc_interval: u64, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    spawn_periodic(gc_interval, shutdown, move || {
        connections.garbage_collect(current_timestamp());
    })
}

fn spawn_backup_task(backup: Arc<dyn Backup>, interval: u64, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    spawn_periodic(interval, shutdown, move || {
        if let Err(e) = backup.save() {
            error!(error = %e, "Periodic peer store backup failed");
        }
    })
}
