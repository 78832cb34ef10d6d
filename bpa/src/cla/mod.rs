/*!
Convergence-Layer Adapter (CLA) abstractions.

A CLA instance binds the bundle protocol to one wire transport and plays
one or both of two roles: a *receiver* takes bundles in from the wire, a
*sender* ships bundles out to a known peer. A *listener* is a passive
accept loop that creates new instances for inbound connections and hands
them to the [`Manager`].

CLAs talk back to the node core exclusively through the narrow
[`NodeEvents`] contract, which keeps the transport crates independent of
the pipeline internals.
*/

use crate::{async_trait, Arc};
use brant_bpv7::{bundle::Bundle, eid::EndpointId};
use thiserror::Error;

mod registry;

pub use registry::Manager;

#[cfg(test)]
pub(crate) mod dummy;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("The CLA has been closed")]
    Closed,

    #[error("The peer is not connected")]
    NotConnected,

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Listener for address {0} is already registered")]
    ListenerExists(String),

    #[error(transparent)]
    InvalidBundle(#[from] brant_bpv7::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// The supported convergence-layer types, used to resolve listener and
/// peer configuration entries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaType {
    Mtcp,
    Quicl,
}

impl std::str::FromStr for ClaType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mtcp" => Ok(ClaType::Mtcp),
            "quicl" => Ok(ClaType::Quicl),
            s => Err(format!("{s} is not a valid CLA type")),
        }
    }
}

impl std::fmt::Display for ClaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ClaType::Mtcp => "mtcp",
            ClaType::Quicl => "quicl",
        })
    }
}

/// Events a CLA surfaces to the node core. Implemented by the pipeline's
/// dispatcher; CLAs and the manager depend only on this contract.
#[async_trait]
pub trait NodeEvents: Send + Sync {
    /// A bundle was successfully received and decoded.
    async fn receive_bundle(&self, bundle: Bundle);

    /// A new peer became reachable.
    async fn peer_appeared(&self, peer: &EndpointId);

    /// A peer is no longer reachable.
    async fn peer_disappeared(&self, peer: &EndpointId);
}

/// Behaviour common to every CLA instance, whatever its roles.
#[async_trait]
pub trait Convergence: Send + Sync {
    /// A unique address identifying this instance, ensuring the same
    /// endpoint is not opened twice.
    fn address(&self) -> String;

    /// Bring the instance up: connect, perform any handshake, and start
    /// receive tasks. Called from the manager's activation task, so a
    /// slow handshake never stalls the registering caller.
    async fn activate(&self, events: Arc<dyn NodeEvents>) -> Result<()>;

    /// Tear the instance down. Must be idempotent.
    async fn close(&self);
}

/// A CLA instance able to transmit bundles to a single peer.
#[async_trait]
pub trait Sender: Convergence {
    /// The peer's node ID, if known. Anonymous senders return the null
    /// endpoint.
    fn peer(&self) -> EndpointId;

    /// Largest serialized bundle this sender can ship in one piece.
    /// Bundles beyond this are fragmented before transmission.
    fn max_bundle_size(&self) -> Option<usize> {
        None
    }

    /// Transmit one bundle. Safe to call from concurrent tasks.
    async fn send(&self, bundle: &Bundle) -> Result<()>;
}

/// A CLA instance receiving bundles on a local endpoint.
pub trait Receiver: Convergence {
    /// The local endpoint ID this receiver exposes.
    fn endpoint(&self) -> EndpointId;
}

/// A passive accept loop creating new CLA instances for inbound
/// connections and registering them with the manager.
#[async_trait]
pub trait Listener: Send + Sync {
    fn address(&self) -> String;

    async fn start(&self, manager: Arc<Manager>, events: Arc<dyn NodeEvents>) -> Result<()>;

    async fn close(&self);
}

/// The facets of one CLA instance handed to [`Manager::register`].
///
/// `sender` and `receiver` usually point at the same object as
/// `convergence`; capabilities are declared by which are present.
#[derive(Clone)]
pub struct RegisterHandle {
    pub convergence: Arc<dyn Convergence>,
    pub sender: Option<Arc<dyn Sender>>,
    pub receiver: Option<Arc<dyn Receiver>>,
}

impl RegisterHandle {
    pub fn address(&self) -> String {
        self.convergence.address()
    }
}
