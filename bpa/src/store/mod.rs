/*!
The bundle store: durable persistence of bundle bodies and per-bundle
metadata.

Bodies and descriptors form a pair: a body exists on disk iff a
descriptor exists for it. Insertion writes the descriptor first and
compensates by removing it again if the body write fails.
*/

use crate::{debug, error, storage, warn, Arc, Bytes};
use brant_bpv7::{bundle::Bundle, dtn_time::DtnTime, eid::EndpointId};
use sha2::Digest;

mod descriptor;

pub use descriptor::{BundleDescriptor, Constraint};

pub struct Store {
    node_id: EndpointId,
    metadata: Arc<dyn storage::MetadataStorage>,
    bundles: Arc<dyn storage::BundleStorage>,
}

impl Store {
    pub fn new(
        node_id: EndpointId,
        metadata: Arc<dyn storage::MetadataStorage>,
        bundles: Arc<dyn storage::BundleStorage>,
    ) -> Self {
        Self {
            node_id,
            metadata,
            bundles,
        }
    }

    /// Bodies are stored under the hex SHA-256 of the bundle-ID key.
    fn body_name(key: &str) -> String {
        let digest = sha2::Sha256::digest(key.as_bytes());
        let mut name = String::with_capacity(digest.len() * 2);
        for b in digest {
            name.push_str(&format!("{b:02x}"));
        }
        name
    }

    /// Insert a bundle, persisting its body and creating a descriptor
    /// with the initial `DispatchPending` constraint.
    ///
    /// Insertion is idempotent on the bundle ID: re-inserting merges the
    /// Previous Node hint into `already_sent_to` of the existing
    /// descriptor and changes nothing else.
    pub async fn insert(&self, bundle: &Bundle) -> storage::Result<BundleDescriptor> {
        let key = bundle.id().to_key();

        if let Some(existing) = self.metadata.load(&key).await? {
            debug!("bundle {key} already exists, updating metadata");
            return self.merge_previous_node(existing, bundle).await;
        }

        debug!("inserting new bundle {key}");

        let mut descriptor = BundleDescriptor {
            id: bundle.id(),
            source: bundle.primary.source.clone(),
            destination: bundle.primary.destination.clone(),
            report_to: bundle.primary.report_to.clone(),
            already_sent_to: vec![self.node_id.clone()],
            constraints: vec![Constraint::DispatchPending],
            expires: bundle.primary.expires(),
            body_name: Self::body_name(&key),
        };
        if let Some(previous) = bundle.previous_node() {
            descriptor.merge_already_sent(previous.clone());
        }

        if !self.metadata.insert(&descriptor).await? {
            // Raced with a concurrent insertion of the same bundle
            let Some(existing) = self.metadata.load(&key).await? else {
                return Err(format!("bundle {key} vanished during insertion").into());
            };
            return self.merge_previous_node(existing, bundle).await;
        }

        if let Err(e) = self
            .bundles
            .save(&descriptor.body_name, Bytes::from(bundle.to_cbor()))
            .await
        {
            error!("failed to store body of bundle {key}, removing metadata: {e}");
            if let Err(e) = self.metadata.remove(&key).await {
                error!("failed to remove metadata of bundle {key} after body write failure: {e}");
            }
            return Err(e);
        }

        Ok(descriptor)
    }

    async fn merge_previous_node(
        &self,
        mut descriptor: BundleDescriptor,
        bundle: &Bundle,
    ) -> storage::Result<BundleDescriptor> {
        if let Some(previous) = bundle.previous_node() {
            if descriptor.merge_already_sent(previous.clone()) {
                self.metadata.replace(&descriptor).await?;
            }
        }
        Ok(descriptor)
    }

    /// Point lookup of a descriptor by bundle ID.
    pub async fn load(
        &self,
        id: &brant_bpv7::bundle_id::BundleId,
    ) -> storage::Result<Option<BundleDescriptor>> {
        self.metadata.load(&id.to_key()).await
    }

    /// Load and decode the serialized bundle behind a descriptor.
    pub async fn load_body(&self, descriptor: &BundleDescriptor) -> storage::Result<Bundle> {
        let Some(data) = self.bundles.load(&descriptor.body_name).await? else {
            return Err(format!("body of bundle {} is missing", descriptor.key()).into());
        };
        Bundle::parse(&data).map_err(Into::into)
    }

    /// Atomically replace a descriptor record. The body is never touched
    /// by this path.
    pub async fn update_metadata(&self, descriptor: &BundleDescriptor) -> storage::Result<()> {
        self.metadata.replace(descriptor).await
    }

    /// Remove metadata record and body, aggregating failures so that one
    /// does not prevent the attempt at the other.
    pub async fn remove(&self, descriptor: &BundleDescriptor) -> storage::Result<()> {
        let mut errors = Vec::new();
        if let Err(e) = self.metadata.remove(&descriptor.key()).await {
            errors.push(format!("metadata: {e}"));
        }
        if let Err(e) = self.bundles.remove(&descriptor.body_name).await {
            errors.push(format!("body: {e}"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "failed to remove bundle {}: {}",
                descriptor.key(),
                errors.join("; ")
            )
            .into())
        }
    }

    pub async fn get_with_constraint(
        &self,
        constraint: Constraint,
    ) -> storage::Result<Vec<BundleDescriptor>> {
        self.metadata.get_with_constraint(constraint).await
    }

    pub async fn get_dispatchable(&self) -> storage::Result<Vec<BundleDescriptor>> {
        self.metadata.get_dispatchable().await
    }

    /// Delete every bundle that is not retained and has expired.
    pub async fn garbage_collect(&self, now: DtnTime) {
        let expired = match self.metadata.get_expired(now).await {
            Ok(expired) => expired,
            Err(e) => {
                error!("failed to scan for expired bundles: {e}");
                return;
            }
        };

        for descriptor in expired {
            debug!("garbage collecting bundle {}", descriptor.key());
            if let Err(e) = self.remove(&descriptor).await {
                warn!("{e}");
            }
        }
    }

    pub async fn close(&self) {
        self.metadata.close().await;
    }
}
