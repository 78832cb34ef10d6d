use crate::{codec, KEEPALIVE_PERIOD};
use brant_bpa::cla::Convergence;
use brant_bpa::{async_trait, cla};
use brant_bpv7::{bundle::Bundle, eid::EndpointId};
use std::sync::{Arc, Weak};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

type SharedStream = Arc<tokio::sync::Mutex<Option<tokio::net::TcpStream>>>;

/// An MTCP sending instance connected to one remote listener.
///
/// The peer EID may be the null endpoint if the remote's identity is not
/// known, e.g. for a statically configured address. Sends are serialized
/// over the connection, and each is followed by an empty frame probing
/// that the remote is still there.
pub struct Client {
    remote_address: String,
    peer: EndpointId,
    max_bundle_size: Option<usize>,
    manager: Weak<cla::Manager>,
    stream: SharedStream,
    cancel: CancellationToken,
}

impl Client {
    pub fn new(
        remote_address: &str,
        peer: EndpointId,
        manager: &Arc<cla::Manager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            remote_address: remote_address.to_string(),
            peer,
            max_bundle_size: None,
            manager: Arc::downgrade(manager),
            stream: Arc::new(tokio::sync::Mutex::new(None)),
            cancel: CancellationToken::new(),
        })
    }

    /// A client without a known peer EID.
    pub fn new_anonymous(remote_address: &str, manager: &Arc<cla::Manager>) -> Arc<Self> {
        Self::new(remote_address, EndpointId::Null, manager)
    }

    /// Limit the size of serialized bundles shipped over this client;
    /// larger bundles are fragmented by the forwarding pipeline.
    pub fn with_max_bundle_size(
        remote_address: &str,
        peer: EndpointId,
        max_bundle_size: usize,
        manager: &Arc<cla::Manager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            remote_address: remote_address.to_string(),
            peer,
            max_bundle_size: Some(max_bundle_size),
            manager: Arc::downgrade(manager),
            stream: Arc::new(tokio::sync::Mutex::new(None)),
            cancel: CancellationToken::new(),
        })
    }

    pub fn handle(self: Arc<Self>) -> cla::RegisterHandle {
        cla::RegisterHandle {
            convergence: self.clone(),
            sender: Some(self),
            receiver: None,
        }
    }

    /// Tear down the connection and tell the manager this instance is
    /// gone.
    async fn disconnect(address: String, manager: Weak<cla::Manager>) {
        if let Some(manager) = manager.upgrade() {
            manager.notify_disconnect(&address).await;
        }
    }

    async fn keepalive_loop(
        address: String,
        stream: SharedStream,
        manager: Weak<cla::Manager>,
        cancel: CancellationToken,
    ) {
        let mut tick = tokio::time::interval(KEEPALIVE_PERIOD);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tick.tick() => {}
            }

            let result = {
                let mut guard = stream.lock().await;
                match guard.as_mut() {
                    None => return,
                    Some(stream) => stream.write_all(&codec::frame_header(0)).await,
                }
            };
            if let Err(e) = result {
                warn!("{address} keep-alive failed: {e}");
                Self::disconnect(address, manager).await;
                return;
            }
        }
    }
}

#[async_trait]
impl cla::Convergence for Client {
    fn address(&self) -> String {
        format!("mtcp://{}", self.remote_address)
    }

    async fn activate(&self, _events: Arc<dyn cla::NodeEvents>) -> cla::Result<()> {
        let stream = tokio::net::TcpStream::connect(&self.remote_address).await?;
        stream.set_nodelay(true)?;
        *self.stream.lock().await = Some(stream);

        tokio::spawn(Self::keepalive_loop(
            self.address(),
            self.stream.clone(),
            self.manager.clone(),
            self.cancel.clone(),
        ));

        debug!("mtcp client connected to {}", self.remote_address);
        Ok(())
    }

    async fn close(&self) {
        self.cancel.cancel();
        self.stream.lock().await.take();
    }
}

#[async_trait]
impl cla::Sender for Client {
    fn peer(&self) -> EndpointId {
        self.peer.clone()
    }

    fn max_bundle_size(&self) -> Option<usize> {
        self.max_bundle_size
    }

    async fn send(&self, bundle: &Bundle) -> cla::Result<()> {
        let data = bundle.to_cbor();

        let result = {
            let mut guard = self.stream.lock().await;
            let Some(stream) = guard.as_mut() else {
                return Err(cla::Error::NotConnected);
            };

            async {
                stream
                    .write_all(&codec::frame_header(data.len() as u64))
                    .await?;
                stream.write_all(&data).await?;
                // Probe that the connection is still alive
                stream.write_all(&codec::frame_header(0)).await?;
                stream.flush().await
            }
            .await
        };

        if let Err(e) = result {
            Self::disconnect(self.address(), self.manager.clone()).await;
            return Err(e.into());
        }
        debug!("mtcp sent bundle {} to {}", bundle.id(), self.remote_address);
        Ok(())
    }
}
