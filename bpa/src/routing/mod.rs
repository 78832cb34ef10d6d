/*!
The routing-policy seam.

The forwarding pipeline consults a routing [`Algorithm`] through this
narrow interface only, so alternative policies can be plugged in without
touching the pipeline.
*/

use crate::{cla, store::BundleDescriptor, Arc};
use brant_bpv7::eid::EndpointId;

mod epidemic;

pub use epidemic::EpidemicRouting;

/// The selectable routing algorithms.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmKind {
    #[default]
    Epidemic,
}

impl std::str::FromStr for AlgorithmKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "epidemic" => Ok(AlgorithmKind::Epidemic),
            s => Err(format!("{s} is not a valid algorithm name")),
        }
    }
}

/// A routing algorithm for delay-tolerant networks.
pub trait Algorithm: Send + Sync {
    /// Notification about a bundle new to this node, locally created or
    /// received from a peer. Whether an algorithm acts on this is an
    /// implementation matter.
    fn notify_new_bundle(&self, descriptor: &BundleDescriptor);

    /// Notification about a peer that became reachable.
    fn notify_peer_appeared(&self, peer: &EndpointId);

    /// Notification about a peer that became unreachable.
    fn notify_peer_disappeared(&self, peer: &EndpointId);

    /// The senders a bundle should be forwarded to right now. Excludes
    /// peers recorded in the descriptor's `already_sent_to` set. An
    /// empty result contraindicates forwarding.
    fn select_peers(&self, descriptor: &BundleDescriptor) -> Vec<Arc<dyn cla::Sender>>;
}

/// Instantiate the configured algorithm.
pub fn new(kind: AlgorithmKind, manager: Arc<cla::Manager>) -> Arc<dyn Algorithm> {
    match kind {
        AlgorithmKind::Epidemic => Arc::new(EpidemicRouting::new(manager)),
    }
}
