use crate::backup::Backup;
use crate::core::error::BackupError;
use crate::stores::peer_store::PeerStore;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Writes peer store snapshots to a single file.
///
/// Saves go to `<path>.tmp` first and are renamed into place, so a crash
/// mid-write leaves the previous snapshot intact.
pub struct FileBackup {
    path: PathBuf,
    store: Option<Arc<PeerStore>>,
}

impl FileBackup {
    pub fn new(path: PathBuf) -> Self {
        Self { path, store: None }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    fn store(&self) -> Result<&PeerStore, BackupError> {
        self.store.as_deref().ok_or(BackupError::NotInitialized)
    }
}

impl Backup for FileBackup {
    fn init(&mut self, store: Arc<PeerStore>) -> Result<(), BackupError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        self.store = Some(store);
        Ok(())
    }

    fn save(&self) -> Result<(), BackupError> {
        let store = self.store()?;
        let data = store.encode()?;

        let tmp_path = self.tmp_path();
        let mut file = File::create(&tmp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;

        info!(
            path = %self.path.display(),
            bytes = data.len(),
            peers = store.total_peers(),
            "Peer store snapshot written"
        );
        Ok(())
    }

    fn load(&self) -> Result<usize, BackupError> {
        let store = self.store()?;

        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No snapshot file found, starting with an empty peer store");
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        if data.is_empty() {
            info!(path = %self.path.display(), "Snapshot file is empty, starting with an empty peer store");
            return Ok(0);
        }

        let loaded = store.load(&data)?;
        info!(path = %self.path.display(), peers = loaded, "Peer store snapshot loaded");
        Ok(loaded)
    }
}
