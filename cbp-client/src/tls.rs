use std::sync::Arc;

use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ClientConfig, Error as TlsError, ServerName};
use tokio_rustls::TlsConnector;

/// The server presents a certificate/key pair with no CA behind it
/// (spec.md §6: TLS material is loaded from disk, nothing more). A LAN
/// table server has no public chain to verify against, so the client
/// trusts whatever certificate it is shown and relies on the transport
/// only for confidentiality, not server identity.
struct TrustAnyCertificate;

impl ServerCertVerifier for TrustAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> Result<ServerCertVerified, TlsError> {
        Ok(ServerCertVerified::assertion())
    }
}

pub fn connector() -> TlsConnector {
    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(Arc::new(TrustAnyCertificate))
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}
