use crate::{codes, tls, varint, Endpoint};
use brant_bpa::{async_trait, cla};
use brant_bpv7::eid::EndpointId;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Accepts QUIC connections and registers a new [`Endpoint`] for each;
/// the handshake then runs as part of that endpoint's activation.
pub struct Listener {
    listen_address: String,
    endpoint_id: EndpointId,
    handshake_timeout: Duration,
    quic: Mutex<Option<quinn::Endpoint>>,
    cancel: CancellationToken,
}

impl Listener {
    pub fn new(
        listen_address: &str,
        endpoint_id: EndpointId,
        handshake_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            listen_address: listen_address.to_string(),
            endpoint_id,
            handshake_timeout,
            quic: Mutex::new(None),
            cancel: CancellationToken::new(),
        })
    }
}

#[async_trait]
impl cla::Listener for Listener {
    fn address(&self) -> String {
        format!("quicl://{}", self.listen_address)
    }

    async fn start(
        &self,
        manager: Arc<cla::Manager>,
        _events: Arc<dyn cla::NodeEvents>,
    ) -> cla::Result<()> {
        let bind = tokio::net::lookup_host(&self.listen_address)
            .await?
            .next()
            .ok_or_else(|| {
                cla::Error::Handshake(format!("cannot resolve {}", self.listen_address))
            })?;

        let quic = quinn::Endpoint::server(tls::server_config()?, bind)?;
        info!("quicl listener on {}", self.listen_address);

        let cancel = self.cancel.clone();
        let endpoint_id = self.endpoint_id.clone();
        let handshake_timeout = self.handshake_timeout;
        let manager = Arc::downgrade(&manager);
        let accept_quic = quic.clone();
        tokio::spawn(async move {
            loop {
                let incoming = tokio::select! {
                    _ = cancel.cancelled() => break,
                    incoming = accept_quic.accept() => incoming,
                };
                let Some(incoming) = incoming else {
                    // Endpoint closed
                    break;
                };

                let endpoint_id = endpoint_id.clone();
                let manager = manager.clone();
                tokio::spawn(async move {
                    match incoming.await {
                        Ok(connection) => {
                            debug!(
                                "quicl listener accepted connection from {}",
                                connection.remote_address()
                            );
                            let Some(manager) = manager.upgrade() else {
                                return;
                            };
                            manager.register(
                                Endpoint::accepted(
                                    connection,
                                    endpoint_id,
                                    handshake_timeout,
                                    &manager,
                                )
                                .handle(),
                            );
                        }
                        Err(e) => {
                            warn!("quicl connection attempt failed: {e}");
                        }
                    }
                });
            }
            debug!("quicl accept loop stopped");
        });

        *self.quic.lock().expect("quic endpoint lock poisoned") = Some(quic);
        Ok(())
    }

    async fn close(&self) {
        self.cancel.cancel();
        if let Some(quic) = self.quic.lock().expect("quic endpoint lock poisoned").take() {
            quic.close(varint(codes::APPLICATION_SHUTDOWN), b"shutting down");
        }
    }
}
