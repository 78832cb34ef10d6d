/*!
Durable storage backends for the node core.

Metadata lives in an SQLite database (`<store-path>/metadata.db`);
serialized bundles live as one file each under `<store-path>/bundles/`.
Bodies are deliberately kept out of the database so constraint and
dispatch scans stay cheap.
*/

use brant_bpa::storage;
use std::{path::Path, sync::Arc};

pub mod bundles;
pub mod metadata;

mod migrate;


/// Open (creating as needed) the durable backends under `path`.
pub fn init(
    path: &Path,
) -> storage::Result<(
    Arc<dyn storage::MetadataStorage>,
    Arc<dyn storage::BundleStorage>,
)> {
    std::fs::create_dir_all(path)?;
    let metadata: Arc<dyn storage::MetadataStorage> =
        Arc::new(metadata::Storage::open(&path.join("metadata.db"))?);
    let bundles: Arc<dyn storage::BundleStorage> =
        Arc::new(bundles::Storage::new(path.join("bundles"))?);
    Ok((metadata, bundles))
}
