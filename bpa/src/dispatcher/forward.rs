/*!
The bundle forwarding procedure of RFC 9171 §5.4.
*/

use super::*;
use crate::store::BundleDescriptor;
use brant_bpv7::block::BlockData;

impl Dispatcher {
    /// Forward one bundle, following §5.4:
    ///
    /// 1. constraints gain `ForwardPending`, lose `DispatchPending`;
    /// 2. routing selects candidate senders;
    /// 3. no candidates contraindicates: back to `DispatchPending`,
    ///    retried on a later tick or when a peer appears;
    /// 4. the body is loaded and its Previous Node block replaced with
    ///    our own node ID;
    /// 5. transmission to all candidates runs concurrently;
    /// 6. every successful peer lands in `already_sent_to`;
    /// 7. `ForwardPending` is released.
    pub(super) async fn forward_bundle(&self, mut descriptor: BundleDescriptor) {
        descriptor.add_constraint(Constraint::ForwardPending);
        descriptor.remove_constraint(Constraint::DispatchPending);
        if let Err(e) = self.store.update_metadata(&descriptor).await {
            error!("failed to persist constraints of {}: {e}", descriptor.key());
            return;
        }

        let peers = self.routing.select_peers(&descriptor);
        if peers.is_empty() {
            trace!("no peers for bundle {}, contraindicated", descriptor.key());
            self.contraindicate(descriptor).await;
            return;
        }

        let mut bundle = match self.store.load_body(&descriptor).await {
            Ok(bundle) => bundle,
            Err(e) => {
                error!("failed to load body of {}: {e}", descriptor.key());
                self.contraindicate(descriptor).await;
                return;
            }
        };

        // Per-hop update: the Previous Node block now names us
        if let Some(block) = bundle.extension_block_by_type(brant_bpv7::block_type::BlockType::PreviousNode)
        {
            let number = block.number;
            bundle.remove_extension_block(number);
        }
        bundle.add_extension_block(
            Default::default(),
            bundle.primary.crc_type,
            BlockData::PreviousNode(self.node_id.clone()),
        );

        // Concurrent fan-out; results are collected and applied to the
        // descriptor in a single update after the join
        let mut transmissions = tokio::task::JoinSet::new();
        for sender in peers {
            let bundle = bundle.clone();
            transmissions.spawn(async move {
                let peer = sender.peer();
                let result = send_bundle(sender, bundle).await;
                (peer, result)
            });
        }

        while let Some(joined) = transmissions.join_next().await {
            match joined {
                Ok((peer, Ok(()))) => {
                    debug!("bundle {} sent to {peer}", descriptor.key());
                    descriptor.merge_already_sent(peer);
                }
                Ok((peer, Err(e))) => {
                    warn!("failed to send bundle {} to {peer}: {e}", descriptor.key());
                }
                Err(e) => {
                    error!("transmission task failed: {e}");
                }
            }
        }

        descriptor.remove_constraint(Constraint::ForwardPending);
        if let Err(e) = self.store.update_metadata(&descriptor).await {
            error!("failed to persist constraints of {}: {e}", descriptor.key());
        }
    }

    /// §5.4.2: do not forward now; leave the bundle dispatchable so a
    /// later tick or a new peer picks it up again.
    async fn contraindicate(&self, mut descriptor: BundleDescriptor) {
        descriptor.reset_constraints(vec![Constraint::DispatchPending]);
        if let Err(e) = self.store.update_metadata(&descriptor).await {
            error!("failed to persist constraints of {}: {e}", descriptor.key());
        }
    }
}

/// Ship a bundle through one sender, fragmenting it first when it
/// exceeds the sender's maximum bundle size.
async fn send_bundle(sender: Arc<dyn cla::Sender>, bundle: Bundle) -> cla::Result<()> {
    if let Some(mtu) = sender.max_bundle_size() {
        if bundle.to_cbor().len() > mtu {
            let fragments = bundle.fragment(mtu)?;
            trace!(
                "bundle {} fragmented into {} parts for {}",
                bundle.id(),
                fragments.len(),
                sender.address()
            );
            for fragment in fragments {
                sender.send(&fragment).await?;
            }
            return Ok(());
        }
    }
    sender.send(&bundle).await
}
