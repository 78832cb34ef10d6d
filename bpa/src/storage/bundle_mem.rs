//! In-memory bundle body storage, primarily for tests and diskless nodes.

use super::{BundleStorage, Result};
use crate::{async_trait, Bytes};
use std::{collections::HashMap, sync::RwLock};

#[derive(Default)]
pub struct Storage {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BundleStorage for Storage {
    async fn load(&self, storage_name: &str) -> Result<Option<Bytes>> {
        Ok(self
            .entries
            .read()
            .expect("bundle map lock poisoned")
            .get(storage_name)
            .cloned())
    }

    async fn save(&self, storage_name: &str, data: Bytes) -> Result<()> {
        self.entries
            .write()
            .expect("bundle map lock poisoned")
            .insert(storage_name.to_string(), data);
        Ok(())
    }

    async fn remove(&self, storage_name: &str) -> Result<()> {
        self.entries
            .write()
            .expect("bundle map lock poisoned")
            .remove(storage_name);
        Ok(())
    }
}
