//! File-per-bundle body storage.
//!
//! Bodies are written atomically: data goes to a `.tmp` sibling, is
//! synced, and is renamed into place, so a crash never leaves a
//! half-written body under its final name.

use brant_bpa::{async_trait, storage, Bytes};
use std::{
    io::Write,
    path::{Path, PathBuf},
};
use tracing::warn;

pub struct Storage {
    store_root: PathBuf,
}

impl Storage {
    pub fn new(store_root: PathBuf) -> storage::Result<Self> {
        std::fs::create_dir_all(&store_root)?;
        Ok(Self { store_root })
    }

    fn path_of(&self, storage_name: &str) -> storage::Result<PathBuf> {
        // Storage names are hex digests; anything else does not belong
        // to us and must not escape the store root
        if storage_name.is_empty()
            || !storage_name.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(format!("invalid bundle storage name {storage_name}").into());
        }
        Ok(self.store_root.join(storage_name))
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut tmp_path = path.to_path_buf();
    tmp_path.set_extension("tmp");

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp_path)?;

    if let Err(e) = file.write_all(data).and_then(|_| file.sync_all()) {
        _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }
    drop(file);

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}

#[async_trait]
impl storage::BundleStorage for Storage {
    async fn load(&self, storage_name: &str) -> storage::Result<Option<Bytes>> {
        match tokio::fs::read(self.path_of(storage_name)?).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, storage_name: &str, data: Bytes) -> storage::Result<()> {
        let path = self.path_of(storage_name)?;
        tokio::task::spawn_blocking(move || write_atomic(&path, &data))
            .await
            .map_err(|e| storage::Error::from(e.to_string()))?
            .map_err(Into::into)
    }

    async fn remove(&self, storage_name: &str) -> storage::Result<()> {
        match tokio::fs::remove_file(self.path_of(storage_name)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("bundle body {storage_name} was already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
