use super::*;
use crate::{debug, info, warn};
use std::{
    collections::{HashMap, HashSet},
    sync::{OnceLock, RwLock},
};

/// Tracks every active CLA instance and listener.
///
/// Registration follows a small state machine: an address is *pending*
/// while its activation (connect + handshake) runs on a separate task,
/// then becomes *active* and enters the sender/receiver lists, or is
/// discarded if activation fails. Each address is in at most one of
/// {pending, active}; registering an address already present is a no-op.
#[derive(Default)]
pub struct Manager {
    state: RwLock<State>,
    events: OnceLock<Arc<dyn NodeEvents>>,
}

#[derive(Default)]
struct State {
    pending: HashSet<String>,
    active: HashMap<String, RegisterHandle>,
    senders: Vec<Arc<dyn Sender>>,
    receivers: Vec<Arc<dyn Receiver>>,
    listeners: HashMap<String, Arc<dyn Listener>>,
    shutdown: bool,
}

impl Manager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire the manager to the node core. Must happen before any
    /// registration; part of node construction.
    pub(crate) fn set_events(&self, events: Arc<dyn NodeEvents>) {
        if self.events.set(events).is_err() {
            panic!("CLA manager events wired twice");
        }
    }

    fn events(&self) -> Arc<dyn NodeEvents> {
        self.events
            .get()
            .expect("CLA manager used before node construction completed")
            .clone()
    }

    /// Register a CLA instance.
    ///
    /// Returns immediately; activation runs asynchronously so a blocking
    /// handshake never stalls the caller. On success the instance enters
    /// the sender and/or receiver lists and, for senders, the peer is
    /// announced to the core.
    pub fn register(self: &Arc<Self>, handle: RegisterHandle) {
        let address = handle.address();
        {
            let mut state = self.state.write().expect("CLA registry lock poisoned");
            if state.shutdown {
                debug!("rejecting CLA {address}: manager is shut down");
                return;
            }
            if state.pending.contains(&address) || state.active.contains_key(&address) {
                debug!("CLA {address} is already registered");
                return;
            }
            state.pending.insert(address.clone());
        }

        let manager = self.clone();
        tokio::spawn(async move {
            manager.activate(address, handle).await;
        });
    }

    async fn activate(self: Arc<Self>, address: String, handle: RegisterHandle) {
        let events = self.events();

        if let Err(e) = handle.convergence.activate(events.clone()).await {
            warn!("activation of CLA {address} failed: {e}");
            self.state
                .write()
                .expect("CLA registry lock poisoned")
                .pending
                .remove(&address);
            return;
        }

        let peer = {
            let mut state = self.state.write().expect("CLA registry lock poisoned");
            if !state.pending.remove(&address) {
                // Shut down while the handshake was in flight
                None
            } else {
                if let Some(sender) = &handle.sender {
                    state.senders.push(sender.clone());
                }
                if let Some(receiver) = &handle.receiver {
                    state.receivers.push(receiver.clone());
                }
                let peer = handle.sender.as_ref().map(|s| s.peer());
                state.active.insert(address.clone(), handle.clone());
                Some(peer)
            }
        };

        match peer {
            None => handle.convergence.close().await,
            Some(peer) => {
                info!("CLA {address} is active");
                if let Some(peer) = peer {
                    events.peer_appeared(&peer).await;
                }
            }
        }
    }

    /// Start a listener and track it for shutdown. Listening on an
    /// address twice is rejected.
    pub async fn register_listener(
        self: &Arc<Self>,
        listener: Arc<dyn Listener>,
    ) -> Result<()> {
        let address = listener.address();
        {
            let state = self.state.read().expect("CLA registry lock poisoned");
            if state.shutdown {
                return Err(Error::Closed);
            }
            if state.listeners.contains_key(&address) {
                return Err(Error::ListenerExists(address));
            }
        }

        listener.start(self.clone(), self.events()).await?;

        let replaced = self
            .state
            .write()
            .expect("CLA registry lock poisoned")
            .listeners
            .insert(address.clone(), listener);
        if replaced.is_some() {
            warn!("listener {address} was registered concurrently, replacing");
        } else {
            info!("listener {address} is up");
        }
        Ok(())
    }

    /// Remove a CLA instance after a failure or loss of its connection.
    ///
    /// The instance leaves all lists, its peer (if any) is announced as
    /// gone, and it is closed. Idempotent.
    pub async fn notify_disconnect(&self, address: &str) {
        let handle = {
            let mut state = self.state.write().expect("CLA registry lock poisoned");
            state.pending.remove(address);
            let handle = state.active.remove(address);
            if handle.is_some() {
                state.senders.retain(|s| s.address() != address);
                state.receivers.retain(|r| r.address() != address);
            }
            handle
        };

        let Some(handle) = handle else {
            return;
        };

        info!("CLA {address} disconnected");

        if let Some(sender) = &handle.sender {
            let peer = sender.peer();
            if !peer.is_null() {
                self.events().peer_disappeared(&peer).await;
            }
        }
        handle.convergence.close().await;
    }

    /// Snapshot of the current senders.
    pub fn get_senders(&self) -> Vec<Arc<dyn Sender>> {
        self.state
            .read()
            .expect("CLA registry lock poisoned")
            .senders
            .clone()
    }

    /// Snapshot of the current receivers.
    pub fn get_receivers(&self) -> Vec<Arc<dyn Receiver>> {
        self.state
            .read()
            .expect("CLA registry lock poisoned")
            .receivers
            .clone()
    }

    /// Close every listener and CLA instance and refuse any further
    /// registration. Idempotent.
    pub async fn shutdown(&self) {
        let (listeners, handles) = {
            let mut state = self.state.write().expect("CLA registry lock poisoned");
            state.shutdown = true;
            state.pending.clear();
            state.senders.clear();
            state.receivers.clear();
            (
                state.listeners.drain().collect::<Vec<_>>(),
                state.active.drain().collect::<Vec<_>>(),
            )
        };

        for (address, listener) in listeners {
            debug!("closing listener {address}");
            listener.close().await;
        }
        for (address, handle) in handles {
            debug!("closing CLA {address}");
            handle.convergence.close().await;
        }
    }
}
