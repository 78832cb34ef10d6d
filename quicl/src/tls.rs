//! QUIC endpoint configuration.
//!
//! Connections are encrypted with a per-node self-signed certificate and
//! peers do not verify it; authentication of nodes is not part of this
//! layer. Identity comes from the endpoint-id handshake.

use brant_bpa::cla;
use quinn::crypto::rustls::{QuicClientConfig, QuicServerConfig};
use rustls::pki_types::{CertificateDer, PrivatePkcs8KeyDer, ServerName, UnixTime};
use std::{sync::Arc, time::Duration};

const ALPN: &[u8] = b"brant-quicl";

/// Any server name will do; certificates are not verified.
pub(crate) const SERVER_NAME: &str = "brant";

fn provider() -> Arc<rustls::crypto::CryptoProvider> {
    // First caller installs the process-default provider
    _ = rustls::crypto::CryptoProvider::install_default(rustls::crypto::ring::default_provider());
    rustls::crypto::CryptoProvider::get_default()
        .expect("crypto provider was just installed")
        .clone()
}

fn transport_config() -> quinn::TransportConfig {
    let mut transport = quinn::TransportConfig::default();
    transport.max_concurrent_uni_streams(0u8.into());
    transport.max_idle_timeout(Some(
        Duration::from_secs(30).try_into().expect("idle timeout in range"),
    ));
    transport.keep_alive_interval(Some(Duration::from_secs(5)));
    transport
}

pub(crate) fn server_config() -> cla::Result<quinn::ServerConfig> {
    let provider = provider();

    let cert = rcgen::generate_simple_self_signed(vec![SERVER_NAME.to_string()])
        .map_err(|e| cla::Error::Internal(e.into()))?;
    let certificate = CertificateDer::from(cert.cert);
    let key = PrivatePkcs8KeyDer::from(cert.signing_key.serialize_der());

    let mut tls = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| cla::Error::Internal(e.into()))?
        .with_no_client_auth()
        .with_single_cert(vec![certificate], key.into())
        .map_err(|e| cla::Error::Internal(e.into()))?;
    tls.alpn_protocols = vec![ALPN.to_vec()];

    let mut config = quinn::ServerConfig::with_crypto(Arc::new(
        QuicServerConfig::try_from(tls).map_err(|e| cla::Error::Internal(e.into()))?,
    ));
    config.transport_config(Arc::new(transport_config()));
    Ok(config)
}

pub(crate) fn client_config() -> cla::Result<quinn::ClientConfig> {
    let provider = provider();

    let mut tls = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| cla::Error::Internal(e.into()))?
        .dangerous()
        .with_custom_certificate_verifier(SkipServerVerification::new(provider))
        .with_no_client_auth();
    tls.alpn_protocols = vec![ALPN.to_vec()];

    let mut config = quinn::ClientConfig::new(Arc::new(
        QuicClientConfig::try_from(tls).map_err(|e| cla::Error::Internal(e.into()))?,
    ));
    config.transport_config(Arc::new(transport_config()));
    Ok(config)
}

/// Certificate verifier that accepts whatever the peer presents.
#[derive(Debug)]
struct SkipServerVerification(Arc<rustls::crypto::CryptoProvider>);

impl SkipServerVerification {
    fn new(provider: Arc<rustls::crypto::CryptoProvider>) -> Arc<Self> {
        Arc::new(Self(provider))
    }
}

impl rustls::client::danger::ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
