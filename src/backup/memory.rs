use crate::backup::Backup;
use crate::core::error::BackupError;
use crate::stores::peer_store::PeerStore;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Keeps the latest snapshot in process memory. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryBackup {
    snapshot: Mutex<Option<Vec<u8>>>,
    store: Option<Arc<PeerStore>>,
}

impl MemoryBackup {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> Result<&PeerStore, BackupError> {
        self.store.as_deref().ok_or(BackupError::NotInitialized)
    }
}

impl Backup for MemoryBackup {
    fn init(&mut self, store: Arc<PeerStore>) -> Result<(), BackupError> {
        self.store = Some(store);
        Ok(())
    }

    fn save(&self) -> Result<(), BackupError> {
        let data = self.store()?.encode()?;
        debug!(bytes = data.len(), "Peer store snapshot kept in memory");

        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(data);
        Ok(())
    }

    fn load(&self) -> Result<usize, BackupError> {
        let store = self.store()?;
        let snapshot = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);

        match snapshot.as_deref() {
            Some(data) => Ok(store.load(data)?),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::peer::Peer;
    use std::net::{IpAddr, Ipv6Addr};

    #[test]
    fn test_save_then_load_restores_dropped_peers() {
        let store = Arc::new(PeerStore::new(4, 50));
        let peer = Peer::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 6881, false, 1000);
        store.save([1u8; 20], [1u8; 20], peer);

        let mut backup = MemoryBackup::new();
        backup.init(Arc::clone(&store)).unwrap();
        backup.save().unwrap();

        store.drop_peer(&[1u8; 20], &[1u8; 20]);
        assert_eq!(store.total_peers(), 0);

        assert_eq!(backup.load().unwrap(), 1);
        assert_eq!(store.hash_stats(&[1u8; 20]), (0, 1));
    }

    #[test]
    fn test_load_without_snapshot() {
        let mut backup = MemoryBackup::new();
        backup.init(Arc::new(PeerStore::new(4, 50))).unwrap();

        assert_eq!(backup.load().unwrap(), 0);
    }
}
