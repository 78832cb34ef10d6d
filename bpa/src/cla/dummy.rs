//! A loopback CLA for exercising the manager and the pipeline in tests.

use super::*;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

/// Sink for nodes under test that do not care about events.
pub(crate) struct NullEvents;

#[async_trait]
impl NodeEvents for NullEvents {
    async fn receive_bundle(&self, _bundle: Bundle) {}
    async fn peer_appeared(&self, _peer: &EndpointId) {}
    async fn peer_disappeared(&self, _peer: &EndpointId) {}
}

pub(crate) struct DummyCla {
    address: String,
    peer: EndpointId,
    fail_activation: bool,
    max_bundle_size: Option<usize>,
    pub sent: Mutex<Vec<Bundle>>,
    closed: AtomicBool,
}

impl DummyCla {
    pub fn new(address: &str, peer: &str) -> Arc<Self> {
        Arc::new(Self {
            address: address.to_string(),
            peer: peer.parse().expect("bad peer EID"),
            fail_activation: false,
            max_bundle_size: None,
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn failing(address: &str) -> Arc<Self> {
        Arc::new(Self {
            address: address.to_string(),
            peer: EndpointId::Null,
            fail_activation: true,
            max_bundle_size: None,
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn with_max_bundle_size(address: &str, peer: &str, mtu: usize) -> Arc<Self> {
        Arc::new(Self {
            address: address.to_string(),
            peer: peer.parse().expect("bad peer EID"),
            fail_activation: false,
            max_bundle_size: Some(mtu),
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn handle(self: &Arc<Self>) -> RegisterHandle {
        RegisterHandle {
            convergence: self.clone(),
            sender: Some(self.clone()),
            receiver: Some(self.clone()),
        }
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn sent_bundles(&self) -> Vec<Bundle> {
        self.sent.lock().expect("sent lock poisoned").clone()
    }
}

#[async_trait]
impl Convergence for DummyCla {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn activate(&self, _events: Arc<dyn NodeEvents>) -> Result<()> {
        if self.fail_activation {
            Err(Error::Handshake("dummy activation failure".to_string()))
        } else {
            Ok(())
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Sender for DummyCla {
    fn peer(&self) -> EndpointId {
        self.peer.clone()
    }

    fn max_bundle_size(&self) -> Option<usize> {
        self.max_bundle_size
    }

    async fn send(&self, bundle: &Bundle) -> Result<()> {
        if self.closed() {
            return Err(Error::Closed);
        }
        self.sent
            .lock()
            .expect("sent lock poisoned")
            .push(bundle.clone());
        Ok(())
    }
}

impl Receiver for DummyCla {
    fn endpoint(&self) -> EndpointId {
        self.peer.clone()
    }
}
