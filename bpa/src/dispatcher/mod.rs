/*!
The forwarding pipeline.

One dispatcher drives every bundle through reception, local delivery,
and the RFC 9171 §5.4 forwarding procedure. Forwarding itself runs on a
single dispatch task woken by a periodic tick, by fresh insertions, and
by newly-appeared peers, so constraint transitions of a descriptor are
totally ordered.
*/

use crate::{
    async_trait, cla, debug, error, info, routing, services,
    store::{Constraint, Store},
    trace, warn, Arc,
};
use brant_bpv7::{bundle::Bundle, dtn_time::DtnTime, eid::EndpointId};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

mod forward;
mod reassemble;

#[cfg(test)]
mod tests;

pub struct Dispatcher {
    node_id: EndpointId,
    store: Arc<Store>,
    routing: Arc<dyn routing::Algorithm>,
    services: Arc<services::Registry>,
    poke: Notify,
}

impl Dispatcher {
    pub fn new(
        node_id: EndpointId,
        store: Arc<Store>,
        routing: Arc<dyn routing::Algorithm>,
        services: Arc<services::Registry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            node_id,
            store,
            routing,
            services,
            poke: Notify::new(),
        })
    }

    /// Spawn the periodic drivers: the dispatch tick and the garbage
    /// collection scan. Both stop when `cancel` fires.
    pub fn start(
        self: &Arc<Self>,
        dispatch_period: std::time::Duration,
        gc_period: std::time::Duration,
        cancel: CancellationToken,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let dispatcher = self.clone();
        let dispatch_cancel = cancel.clone();
        let dispatch = tokio::spawn(async move {
            let mut tick = tokio::time::interval(dispatch_period);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = dispatch_cancel.cancelled() => break,
                    _ = tick.tick() => {}
                    _ = dispatcher.poke.notified() => {}
                }
                dispatcher.dispatch_pending().await;
            }
            debug!("dispatch task stopped");
        });

        let dispatcher = self.clone();
        let gc = tokio::spawn(async move {
            let mut tick = tokio::time::interval(gc_period);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {}
                }
                dispatcher.store.garbage_collect(DtnTime::now()).await;
            }
            debug!("garbage collection task stopped");
        });

        vec![dispatch, gc]
    }

    /// Wake the dispatch task ahead of its next tick.
    pub fn poke(&self) {
        self.poke.notify_one();
    }

    /// The reception path: store the bundle, attempt local delivery,
    /// notify routing, and schedule forwarding.
    pub async fn receive(&self, bundle: Bundle) {
        let descriptor = match self.store.insert(&bundle).await {
            Ok(descriptor) => descriptor,
            Err(e) => {
                error!("failed to store received bundle {}: {e}", bundle.id());
                return;
            }
        };

        self.deliver_locally(&descriptor, &bundle).await;

        self.routing.notify_new_bundle(&descriptor);

        if descriptor.dispatch() {
            self.poke();
        }
    }

    /// Run the forwarding procedure over every dispatchable bundle.
    pub async fn dispatch_pending(&self) {
        let dispatchable = match self.store.get_dispatchable().await {
            Ok(dispatchable) => dispatchable,
            Err(e) => {
                error!("failed to scan for dispatchable bundles: {e}");
                return;
            }
        };

        if !dispatchable.is_empty() {
            trace!("dispatching {} pending bundles", dispatchable.len());
        }
        for descriptor in dispatchable {
            self.forward_bundle(descriptor).await;
        }
    }
}

#[async_trait]
impl cla::NodeEvents for Dispatcher {
    async fn receive_bundle(&self, bundle: Bundle) {
        self.receive(bundle).await
    }

    async fn peer_appeared(&self, peer: &EndpointId) {
        info!("peer {peer} appeared");
        self.routing.notify_peer_appeared(peer);
        self.poke();
    }

    async fn peer_disappeared(&self, peer: &EndpointId) {
        info!("peer {peer} disappeared");
        self.routing.notify_peer_disappeared(peer);
    }
}
