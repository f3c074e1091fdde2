//! Pluggable snapshot persistence for the peer store.

pub mod file;
pub mod memory;

use crate::core::config::{BackupConfig, BackupKind};
use crate::core::error::BackupError;
use crate::stores::peer_store::PeerStore;
use std::sync::Arc;

pub use file::FileBackup;
pub use memory::MemoryBackup;

/// A snapshot backend bound to one peer store.
///
/// `save` and `load` are called at most once per backup interval, plus once on
/// boot and once on shutdown.
pub trait Backup: Send + Sync {
    fn init(&mut self, store: Arc<PeerStore>) -> Result<(), BackupError>;

    fn save(&self) -> Result<(), BackupError>;

    /// Restore the bound store, returning the number of peers loaded. A missing
    /// snapshot yields an empty store rather than an error.
    fn load(&self) -> Result<usize, BackupError>;
}

/// Build and initialise the backend selected by `config`.
pub fn from_config(config: &BackupConfig, store: Arc<PeerStore>) -> Result<Arc<dyn Backup>, BackupError> {
    let mut backup: Box<dyn Backup> = match (config.kind, &config.path) {
        (BackupKind::File, Some(path)) => Box::new(FileBackup::new(path.clone())),
        (BackupKind::File, None) => return Err(BackupError::MissingPath),
        (BackupKind::Memory, _) => Box::new(MemoryBackup::new()),
    };

    backup.init(store)?;
    Ok(Arc::from(backup))
}
