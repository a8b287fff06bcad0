use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors: anything here terminates the process before it
/// accepts a single client (spec §7's "Fatal" class).
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind TCP listener on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind UDP discovery socket on {addr}")]
    BindDiscovery {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load TLS certificate from {path:?}")]
    CertLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load TLS private key from {path:?}")]
    KeyLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("certificate file {0:?} contained no certificates")]
    NoCertificates(PathBuf),

    #[error("key file {0:?} contained no private key")]
    NoPrivateKey(PathBuf),

    #[error("invalid TLS configuration")]
    TlsConfig(#[source] rustls::Error),

    #[error("failed to read credentials file {path:?}")]
    CredentialsLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("credentials file {path:?} was not valid JSON")]
    CredentialsParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
