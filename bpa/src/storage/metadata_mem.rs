//! In-memory metadata storage, primarily for tests and diskless nodes.

use super::{MetadataStorage, Result};
use crate::{
    async_trait,
    store::{BundleDescriptor, Constraint},
};
use brant_bpv7::dtn_time::DtnTime;
use std::{collections::HashMap, sync::RwLock};

#[derive(Default)]
pub struct Storage {
    entries: RwLock<HashMap<String, BundleDescriptor>>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStorage for Storage {
    async fn load(&self, key: &str) -> Result<Option<BundleDescriptor>> {
        Ok(self
            .entries
            .read()
            .expect("metadata map lock poisoned")
            .get(key)
            .cloned())
    }

    async fn insert(&self, descriptor: &BundleDescriptor) -> Result<bool> {
        match self
            .entries
            .write()
            .expect("metadata map lock poisoned")
            .entry(descriptor.key())
        {
            std::collections::hash_map::Entry::Occupied(_) => Ok(false),
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(descriptor.clone());
                Ok(true)
            }
        }
    }

    async fn replace(&self, descriptor: &BundleDescriptor) -> Result<()> {
        match self
            .entries
            .write()
            .expect("metadata map lock poisoned")
            .get_mut(&descriptor.key())
        {
            None => Err(format!("no descriptor for bundle {}", descriptor.key()).into()),
            Some(entry) => {
                *entry = descriptor.clone();
                Ok(())
            }
        }
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries
            .write()
            .expect("metadata map lock poisoned")
            .remove(key);
        Ok(())
    }

    async fn get_with_constraint(
        &self,
        constraint: Constraint,
    ) -> Result<Vec<BundleDescriptor>> {
        Ok(self
            .entries
            .read()
            .expect("metadata map lock poisoned")
            .values()
            .filter(|d| d.has_constraint(constraint))
            .cloned()
            .collect())
    }

    async fn get_dispatchable(&self) -> Result<Vec<BundleDescriptor>> {
        Ok(self
            .entries
            .read()
            .expect("metadata map lock poisoned")
            .values()
            .filter(|d| d.dispatch())
            .cloned()
            .collect())
    }

    async fn get_expired(&self, now: DtnTime) -> Result<Vec<BundleDescriptor>> {
        Ok(self
            .entries
            .read()
            .expect("metadata map lock poisoned")
            .values()
            .filter(|d| !d.retain() && d.expires < now)
            .cloned()
            .collect())
    }

    async fn close(&self) {}
}
