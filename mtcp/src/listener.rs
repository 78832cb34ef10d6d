use crate::{codec, MAX_FRAME_SIZE};
use brant_bpa::{async_trait, cla};
use brant_bpv7::{bundle::Bundle, eid::EndpointId};
use std::sync::{Arc, Weak};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Accepts MTCP connections and registers a receiving CLA instance for
/// each with the manager.
pub struct Listener {
    listen_address: String,
    endpoint_id: EndpointId,
    cancel: CancellationToken,
}

impl Listener {
    pub fn new(listen_address: &str, endpoint_id: EndpointId) -> Arc<Self> {
        Arc::new(Self {
            listen_address: listen_address.to_string(),
            endpoint_id,
            cancel: CancellationToken::new(),
        })
    }
}

#[async_trait]
impl cla::Listener for Listener {
    fn address(&self) -> String {
        format!("mtcp://{}", self.listen_address)
    }

    async fn start(
        &self,
        manager: Arc<cla::Manager>,
        _events: Arc<dyn cla::NodeEvents>,
    ) -> cla::Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.listen_address).await?;
        info!("mtcp listener on {}", self.listen_address);

        let cancel = self.cancel.clone();
        let endpoint_id = self.endpoint_id.clone();
        let manager = Arc::downgrade(&manager);
        tokio::spawn(async move {
            loop {
                let accepted = tokio::select! {
                    _ = cancel.cancelled() => break,
                    accepted = listener.accept() => accepted,
                };
                match accepted {
                    Ok((stream, remote)) => {
                        debug!("mtcp connection accepted from {remote}");
                        let Some(manager) = manager.upgrade() else {
                            break;
                        };
                        manager.register(
                            Connection::new(
                                stream,
                                remote,
                                endpoint_id.clone(),
                                &manager,
                            )
                            .handle(),
                        );
                    }
                    Err(e) => {
                        warn!("mtcp accept failed: {e}");
                    }
                }
            }
            debug!("mtcp accept loop stopped");
        });

        Ok(())
    }

    async fn close(&self) {
        self.cancel.cancel();
    }
}

/// One accepted MTCP connection, playing the receiver role.
struct Connection {
    address: String,
    endpoint_id: EndpointId,
    manager: Weak<cla::Manager>,
    stream: std::sync::Mutex<Option<tokio::net::TcpStream>>,
    cancel: CancellationToken,
}

impl Connection {
    fn new(
        stream: tokio::net::TcpStream,
        remote: std::net::SocketAddr,
        endpoint_id: EndpointId,
        manager: &Arc<cla::Manager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            address: format!("mtcp://{remote}"),
            endpoint_id,
            manager: Arc::downgrade(manager),
            stream: std::sync::Mutex::new(Some(stream)),
            cancel: CancellationToken::new(),
        })
    }

    fn handle(self: Arc<Self>) -> cla::RegisterHandle {
        cla::RegisterHandle {
            convergence: self.clone(),
            sender: None,
            receiver: Some(self),
        }
    }

    /// Decode frames until the peer goes away or sends garbage.
    async fn read_loop(
        address: String,
        stream: tokio::net::TcpStream,
        events: Arc<dyn cla::NodeEvents>,
        manager: Weak<cla::Manager>,
        cancel: CancellationToken,
    ) {
        let mut reader = tokio::io::BufReader::new(stream);

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = Self::read_bundle(&mut reader) => result,
            };
            match result {
                Ok(None) => continue, // keep-alive
                Ok(Some(bundle)) => {
                    debug!("{address} received bundle {}", bundle.id());
                    events.receive_bundle(bundle).await;
                }
                Err(e) => {
                    if e.kind() != std::io::ErrorKind::UnexpectedEof {
                        warn!("{address} closing: {e}");
                    }
                    break;
                }
            }
        }

        if let Some(manager) = manager.upgrade() {
            manager.notify_disconnect(&address).await;
        }
    }

    async fn read_bundle(
        reader: &mut tokio::io::BufReader<tokio::net::TcpStream>,
    ) -> std::io::Result<Option<Bundle>> {
        let len = codec::read_frame_len(reader).await?;
        if len == 0 {
            return Ok(None);
        }
        if len > MAX_FRAME_SIZE {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("frame of {len} bytes exceeds the maximum"),
            ));
        }

        let mut data = vec![0u8; len as usize];
        reader.read_exact(&mut data).await?;

        Bundle::parse(&data)
            .map(Some)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[async_trait]
impl cla::Convergence for Connection {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn activate(&self, events: Arc<dyn cla::NodeEvents>) -> cla::Result<()> {
        let Some(stream) = self
            .stream
            .lock()
            .expect("connection stream lock poisoned")
            .take()
        else {
            return Err(cla::Error::Closed);
        };

        tokio::spawn(Self::read_loop(
            self.address.clone(),
            stream,
            events,
            self.manager.clone(),
            self.cancel.clone(),
        ));
        Ok(())
    }

    async fn close(&self) {
        self.cancel.cancel();
    }
}

impl cla::Receiver for Connection {
    fn endpoint(&self) -> EndpointId {
        self.endpoint_id.clone()
    }
}
