//! TLS client with certificate validation disabled.
//!
//! Scanned endpoints are rarely serving a certificate for the name we
//! present, so every probe accepts any chain. Signatures are still checked
//! with the provider's algorithms so the handshake itself stays well formed.

use once_cell::sync::OnceCell;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{ring, verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use relayscan_common::{ScanError, ScanResult};

static CONNECTOR: OnceCell<TlsConnector> = OnceCell::new();

#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

fn build_connector() -> ScanResult<TlsConnector> {
    let provider = Arc::new(ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| ScanError::Handshake {
            addr: "-".to_string(),
            reason: format!("TLS configuration: {e}"),
        })?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

/// Shared connector that skips certificate validation.
pub fn insecure_connector() -> ScanResult<TlsConnector> {
    CONNECTOR.get_or_try_init(build_connector).cloned()
}

/// Run a client handshake over `stream`, presenting `server_name` as SNI.
/// An IP literal is accepted and sends no SNI at all.
///
/// `addr` only labels errors.
pub(crate) async fn handshake<S>(
    stream: S,
    server_name: &str,
    limit: Duration,
    addr: &str,
) -> ScanResult<TlsStream<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let connector = insecure_connector()?;
    let name = ServerName::try_from(server_name.to_string()).map_err(|e| ScanError::Handshake {
        addr: addr.to_string(),
        reason: format!("bad server name {server_name:?}: {e}"),
    })?;

    match timeout(limit, connector.connect(name, stream)).await {
        Ok(Ok(tls)) => Ok(tls),
        Ok(Err(e)) => Err(ScanError::Handshake {
            addr: addr.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Err(ScanError::HandshakeTimeout(addr.to_string())),
    }
}
