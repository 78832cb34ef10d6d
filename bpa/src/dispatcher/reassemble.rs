/*!
Local delivery, including reassembly of fragments addressed to this
node.
*/

use super::*;
use crate::store::BundleDescriptor;
use brant_bpv7::fragmentation;

impl Dispatcher {
    /// Deliver a freshly-stored bundle to local services, if any answer
    /// for its destination. Fragments are parked under
    /// `ReassemblyPending` until the whole set has arrived.
    pub(super) async fn deliver_locally(
        &self,
        descriptor: &BundleDescriptor,
        bundle: &Bundle,
    ) {
        if self.services.matching(&descriptor.destination).is_empty() {
            // Not addressed to us; this is the normal transit case
            return;
        }

        if bundle.is_fragment() {
            self.collect_fragment(descriptor.clone()).await;
            return;
        }

        if !self.services.deliver(descriptor).await {
            debug!(
                "no registered service for bundle {} destination {}",
                descriptor.key(),
                descriptor.destination
            );
        }
    }

    /// Park a fragment and attempt reassembly of its bundle.
    async fn collect_fragment(&self, mut descriptor: BundleDescriptor) {
        descriptor.add_constraint(Constraint::ReassemblyPending);
        if let Err(e) = self.store.update_metadata(&descriptor).await {
            error!("failed to persist constraints of {}: {e}", descriptor.key());
            return;
        }

        let pending = match self
            .store
            .get_with_constraint(Constraint::ReassemblyPending)
            .await
        {
            Ok(pending) => pending,
            Err(e) => {
                error!("failed to scan for reassembly-pending bundles: {e}");
                return;
            }
        };

        // The fragment set of one original bundle shares source and
        // creation timestamp
        let set: Vec<BundleDescriptor> = pending
            .into_iter()
            .filter(|d| {
                d.id.source == descriptor.id.source
                    && d.id.timestamp == descriptor.id.timestamp
            })
            .collect();

        let mut fragments = Vec::with_capacity(set.len());
        for d in &set {
            match self.store.load_body(d).await {
                Ok(bundle) => fragments.push(bundle),
                Err(e) => {
                    error!("failed to load fragment {}: {e}", d.key());
                    return;
                }
            }
        }

        if !fragmentation::is_reassemblable(&mut fragments) {
            trace!(
                "fragment set of {} is still incomplete ({} parts)",
                descriptor.key(),
                fragments.len()
            );
            return;
        }

        let reassembled = match fragmentation::reassemble(fragments) {
            Ok(reassembled) => reassembled,
            Err(e) => {
                warn!("failed to reassemble bundle {}: {e}", descriptor.key());
                return;
            }
        };
        info!(
            "reassembled bundle {} from {} fragments",
            reassembled.id(),
            set.len()
        );

        let reassembled_descriptor = match self.store.insert(&reassembled).await {
            Ok(d) => d,
            Err(e) => {
                error!("failed to store reassembled bundle {}: {e}", reassembled.id());
                return;
            }
        };
        if !self.services.deliver(&reassembled_descriptor).await {
            debug!(
                "no registered service for reassembled bundle {}",
                reassembled_descriptor.key()
            );
        }

        // Release the fragments to garbage collection
        for mut d in set {
            d.reset_constraints(Vec::new());
            if let Err(e) = self.store.update_metadata(&d).await {
                error!("failed to release fragment {}: {e}", d.key());
            }
        }
    }
}
