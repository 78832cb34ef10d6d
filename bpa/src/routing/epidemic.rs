use super::*;
use crate::debug;
use std::collections::HashSet;

/// Flooding-based routing: forward every bundle to every reachable peer
/// not yet known to hold it.
pub struct EpidemicRouting {
    manager: Arc<cla::Manager>,
}

impl EpidemicRouting {
    pub fn new(manager: Arc<cla::Manager>) -> Self {
        debug!("initialised epidemic routing");
        Self { manager }
    }
}

impl Algorithm for EpidemicRouting {
    fn notify_new_bundle(&self, _descriptor: &BundleDescriptor) {}

    fn notify_peer_appeared(&self, _peer: &EndpointId) {}

    fn notify_peer_disappeared(&self, _peer: &EndpointId) {}

    fn select_peers(&self, descriptor: &BundleDescriptor) -> Vec<Arc<dyn cla::Sender>> {
        let mut seen = HashSet::new();
        let selected: Vec<Arc<dyn cla::Sender>> = self
            .manager
            .get_senders()
            .into_iter()
            .filter(|sender| {
                let peer = sender.peer();
                !descriptor.already_sent_to.contains(&peer) && seen.insert(peer)
            })
            .collect();

        debug!(
            "epidemic routing selected {} senders for bundle {}",
            selected.len(),
            descriptor.key()
        );
        selected
    }
}
