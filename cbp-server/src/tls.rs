use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::{Certificate, PrivateKey};
use rustls_pemfile::{certs, pkcs8_private_keys, rsa_private_keys};
use tokio_rustls::TlsAcceptor;

use crate::error::ServerError;

/// Builds the server-side `TlsAcceptor` from a PEM certificate chain
/// and a PEM private key (PKCS#8 or RSA — whichever the file carries).
/// Spec §6: TLS material is loaded once at startup; failure here is
/// fatal (spec §7) and the process never accepts a connection.
pub fn load_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, ServerError> {
    let chain = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    let config = rustls::ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(chain, key)
        .map_err(ServerError::TlsConfig)?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn load_certs(path: &Path) -> Result<Vec<Certificate>, ServerError> {
    let file = File::open(path).map_err(|source| ServerError::CertLoad {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    let raw = certs(&mut reader).map_err(|source| ServerError::CertLoad {
        path: path.to_path_buf(),
        source,
    })?;
    if raw.is_empty() {
        return Err(ServerError::NoCertificates(path.to_path_buf()));
    }
    Ok(raw.into_iter().map(Certificate).collect())
}

/// Tries PKCS#8 first, falling back to PKCS#1 (RSA) — the two shapes
/// `openssl`/`certtool` commonly emit for a private key PEM.
fn load_key(path: &Path) -> Result<PrivateKey, ServerError> {
    let read = |reader: &mut BufReader<File>| -> std::io::Result<Vec<Vec<u8>>> {
        pkcs8_private_keys(reader)
    };
    let file = File::open(path).map_err(|source| ServerError::KeyLoad {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    let mut keys = read(&mut reader).map_err(|source| ServerError::KeyLoad {
        path: path.to_path_buf(),
        source,
    })?;
    if keys.is_empty() {
        let file = File::open(path).map_err(|source| ServerError::KeyLoad {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        keys = rsa_private_keys(&mut reader).map_err(|source| ServerError::KeyLoad {
            path: path.to_path_buf(),
            source,
        })?;
    }
    keys.into_iter()
        .next()
        .map(PrivateKey)
        .ok_or_else(|| ServerError::NoPrivateKey(path.to_path_buf()))
}
