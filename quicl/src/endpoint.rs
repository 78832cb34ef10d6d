use crate::{codes, tls, varint, wire, MAX_BUNDLE_SIZE};
use brant_bpa::cla::{Convergence, Sender};
use brant_bpa::{async_trait, cla};
use brant_bpv7::{bundle::Bundle, eid::EndpointId};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

fn internal<E>(e: E) -> cla::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    cla::Error::Internal(Box::new(e))
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Side {
    Dialer,
    Accepted,
}

/// One QUICL connection, playing both the sender and the receiver role
/// once its handshake has completed.
pub struct Endpoint {
    local_id: EndpointId,
    peer_address: String,
    peer: RwLock<EndpointId>,
    side: Side,
    handshake_timeout: Duration,
    connection: Mutex<Option<quinn::Connection>>,
    quic: Mutex<Option<quinn::Endpoint>>,
    manager: Weak<cla::Manager>,
    cancel: CancellationToken,
}

impl Endpoint {
    /// An endpoint that dials out to a remote listener when activated.
    pub fn dial(
        peer_address: &str,
        local_id: EndpointId,
        manager: &Arc<cla::Manager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            local_id,
            peer_address: peer_address.to_string(),
            peer: RwLock::new(EndpointId::Null),
            side: Side::Dialer,
            handshake_timeout: Duration::ZERO,
            connection: Mutex::new(None),
            quic: Mutex::new(None),
            manager: Arc::downgrade(manager),
            cancel: CancellationToken::new(),
        })
    }

    /// An endpoint wrapping a connection accepted by a listener. The
    /// dialer must start the handshake within `handshake_timeout`.
    pub(crate) fn accepted(
        connection: quinn::Connection,
        local_id: EndpointId,
        handshake_timeout: Duration,
        manager: &Arc<cla::Manager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            local_id,
            peer_address: connection.remote_address().to_string(),
            peer: RwLock::new(EndpointId::Null),
            side: Side::Accepted,
            handshake_timeout,
            connection: Mutex::new(Some(connection)),
            quic: Mutex::new(None),
            manager: Arc::downgrade(manager),
            cancel: CancellationToken::new(),
        })
    }

    pub fn handle(self: Arc<Self>) -> cla::RegisterHandle {
        cla::RegisterHandle {
            convergence: self.clone(),
            sender: Some(self.clone()),
            receiver: Some(self),
        }
    }

    fn connection(&self) -> Option<quinn::Connection> {
        self.connection
            .lock()
            .expect("connection lock poisoned")
            .clone()
    }

    async fn connect(&self) -> cla::Result<quinn::Connection> {
        let remote = tokio::net::lookup_host(&self.peer_address)
            .await?
            .next()
            .ok_or_else(|| {
                cla::Error::Handshake(format!("cannot resolve {}", self.peer_address))
            })?;

        let bind: std::net::SocketAddr = if remote.is_ipv4() {
            "0.0.0.0:0".parse().expect("valid bind address")
        } else {
            "[::]:0".parse().expect("valid bind address")
        };

        let quic = quinn::Endpoint::client(bind)?;
        let connecting = quic
            .connect_with(tls::client_config()?, remote, tls::SERVER_NAME)
            .map_err(internal)?;
        let connection = connecting.await.map_err(internal)?;

        *self.quic.lock().expect("quic endpoint lock poisoned") = Some(quic);
        *self
            .connection
            .lock()
            .expect("connection lock poisoned") = Some(connection.clone());
        debug!("dialer established QUIC connection to {}", self.peer_address);
        Ok(connection)
    }

    /// The dialer opens the handshake stream, introduces itself, and
    /// expects the listener's ID in return.
    async fn handshake_dialer(&self, connection: &quinn::Connection) -> cla::Result<()> {
        let (mut send, mut recv) = connection.open_bi().await.map_err(internal)?;

        wire::write_endpoint_id(&mut send, &self.local_id).await?;
        let peer = wire::read_endpoint_id(&mut recv).await?;
        _ = send.finish();

        trace!("dialer handshake with {peer} complete");
        *self.peer.write().expect("peer lock poisoned") = peer;
        Ok(())
    }

    /// The listener waits (bounded) for the handshake stream, reads the
    /// dialer's ID, and answers with its own.
    async fn handshake_listener(&self, connection: &quinn::Connection) -> cla::Result<()> {
        let accepted =
            tokio::time::timeout(self.handshake_timeout, connection.accept_bi()).await;
        let (mut send, mut recv) = match accepted {
            Err(_) => {
                return Err(cla::Error::Handshake(
                    "dialer took too long to initiate handshake".to_string(),
                ));
            }
            Ok(result) => result.map_err(internal)?,
        };

        let peer = wire::read_endpoint_id(&mut recv).await?;
        wire::write_endpoint_id(&mut send, &self.local_id).await?;
        _ = send.finish();

        trace!("listener handshake with {peer} complete");
        *self.peer.write().expect("peer lock poisoned") = peer;
        Ok(())
    }

    /// Accept data streams, one bundle each, until the connection dies.
    async fn receive_loop(
        address: String,
        connection: quinn::Connection,
        events: Arc<dyn cla::NodeEvents>,
        manager: Weak<cla::Manager>,
        cancel: CancellationToken,
    ) {
        loop {
            let accepted = tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = connection.accept_bi() => accepted,
            };
            match accepted {
                Ok((_send, recv)) => {
                    let address = address.clone();
                    let events = events.clone();
                    tokio::spawn(async move {
                        Self::receive_bundle(address, recv, events).await;
                    });
                }
                Err(e) => {
                    debug!("{address} connection closed: {e}");
                    break;
                }
            }
        }

        if let Some(manager) = manager.upgrade() {
            manager.notify_disconnect(&address).await;
        }
    }

    async fn receive_bundle(
        address: String,
        mut recv: quinn::RecvStream,
        events: Arc<dyn cla::NodeEvents>,
    ) {
        let data = match recv.read_to_end(MAX_BUNDLE_SIZE).await {
            Ok(data) => data,
            Err(e) => {
                warn!("{address} failed to read bundle stream: {e}");
                return;
            }
        };
        match Bundle::parse(&data) {
            Ok(bundle) => {
                debug!("{address} received bundle {}", bundle.id());
                events.receive_bundle(bundle).await;
            }
            Err(e) => {
                warn!("{address} received an undecodable bundle: {e}");
            }
        }
    }
}

#[async_trait]
impl cla::Convergence for Endpoint {
    fn address(&self) -> String {
        format!("quicl://{}", self.peer_address)
    }

    async fn activate(&self, events: Arc<dyn cla::NodeEvents>) -> cla::Result<()> {
        let connection = match self.side {
            Side::Dialer => self.connect().await?,
            Side::Accepted => self.connection().ok_or(cla::Error::Closed)?,
        };

        let handshake = match self.side {
            Side::Dialer => self.handshake_dialer(&connection).await,
            Side::Accepted => self.handshake_listener(&connection).await,
        };
        if let Err(e) = handshake {
            let code = match &e {
                cla::Error::Handshake(_) => codes::HANDSHAKE_PEER_ERROR,
                _ => codes::HANDSHAKE_LOCAL_ERROR,
            };
            connection.close(varint(code), b"handshake failed");
            return Err(e);
        }

        info!(
            "quicl endpoint {} is connected to peer {}",
            self.address(),
            self.peer()
        );

        tokio::spawn(Self::receive_loop(
            self.address(),
            connection,
            events,
            self.manager.clone(),
            self.cancel.clone(),
        ));
        Ok(())
    }

    async fn close(&self) {
        self.cancel.cancel();
        if let Some(connection) = self
            .connection
            .lock()
            .expect("connection lock poisoned")
            .take()
        {
            connection.close(varint(codes::APPLICATION_SHUTDOWN), b"shutting down");
        }
        if let Some(quic) = self.quic.lock().expect("quic endpoint lock poisoned").take() {
            quic.close(varint(codes::APPLICATION_SHUTDOWN), b"shutting down");
        }
    }
}

#[async_trait]
impl cla::Sender for Endpoint {
    fn peer(&self) -> EndpointId {
        self.peer.read().expect("peer lock poisoned").clone()
    }

    async fn send(&self, bundle: &Bundle) -> cla::Result<()> {
        let Some(connection) = self.connection() else {
            return Err(cla::Error::NotConnected);
        };

        let (mut send, _recv) = match connection.open_bi().await {
            Ok(streams) => streams,
            Err(e) => {
                debug!("{} failed to open stream: {e}", self.address());
                let address = self.address();
                if let Some(manager) = self.manager.upgrade() {
                    manager.notify_disconnect(&address).await;
                }
                return Err(internal(e));
            }
        };

        let data = bundle.to_cbor();
        if let Err(e) = send.write_all(&data).await {
            _ = send.reset(varint(codes::STREAM_TRANSMISSION_ERROR));
            return Err(internal(e));
        }
        _ = send.finish();

        debug!("quicl sent bundle {} to {}", bundle.id(), self.peer());
        Ok(())
    }
}

impl cla::Receiver for Endpoint {
    fn endpoint(&self) -> EndpointId {
        self.local_id.clone()
    }
}
