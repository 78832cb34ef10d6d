/*!
Traits implemented by storage backends.

Bundle bodies and descriptor metadata are kept separately: metadata lives
in an indexed store that supports the constraint and dispatch scans the
pipeline needs, while bodies are opaque blobs keyed by a storage name the
[`Store`](crate::store::Store) derives from the bundle ID.
*/

use crate::{
    async_trait,
    store::{BundleDescriptor, Constraint},
    Bytes,
};
use brant_bpv7::dtn_time::DtnTime;

pub mod bundle_mem;
pub mod metadata_mem;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;

#[async_trait]
pub trait MetadataStorage: Send + Sync {
    /// Point lookup by bundle-ID key.
    async fn load(&self, key: &str) -> Result<Option<BundleDescriptor>>;

    /// Insert a new descriptor. Returns `false` without modifying
    /// anything if a descriptor with the same key already exists.
    async fn insert(&self, descriptor: &BundleDescriptor) -> Result<bool>;

    /// Atomically replace the descriptor with the same key.
    async fn replace(&self, descriptor: &BundleDescriptor) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;

    /// All descriptors whose retention constraints contain `constraint`.
    async fn get_with_constraint(&self, constraint: Constraint)
        -> Result<Vec<BundleDescriptor>>;

    /// All descriptors with `DispatchPending` set.
    async fn get_dispatchable(&self) -> Result<Vec<BundleDescriptor>>;

    /// All descriptors eligible for garbage collection: not retained and
    /// expired before `now`.
    async fn get_expired(&self, now: DtnTime) -> Result<Vec<BundleDescriptor>>;

    async fn close(&self);
}

#[async_trait]
pub trait BundleStorage: Send + Sync {
    async fn load(&self, storage_name: &str) -> Result<Option<Bytes>>;

    async fn save(&self, storage_name: &str, data: Bytes) -> Result<()>;

    /// Removing a missing body is not an error.
    async fn remove(&self, storage_name: &str) -> Result<()>;
}
