use std::path::PathBuf;

use serde_derive::{Deserialize, Serialize};

use crate::cli::Cli;

/// Process configuration, following the same shape whether it comes
/// from a TOML file or from CLI flags layered on top of it. Nested
/// the way `gamecore`'s settings file is: one section per concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub network: NetworkConfig,
    pub tls: TlsConfig,
    pub credentials_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub service_port: u16,
    pub discovery_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> NetworkConfig {
        NetworkConfig {
            service_port: cbp_protocol::DEFAULT_SERVICE_PORT,
            discovery_port: cbp_protocol::DEFAULT_DISCOVERY_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TlsConfig {
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> ServerConfig {
        ServerConfig {
            network: NetworkConfig::default(),
            tls: TlsConfig::default(),
            credentials_file: None,
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<ServerConfig> {
        Ok(serdeconv::from_toml_file(path)?)
    }

    /// CLI flags win over whatever the config file (or defaults) set.
    pub fn merge_cli(mut self, cli: &Cli) -> ServerConfig {
        if let Some(port) = cli.port {
            self.network.service_port = port;
        }
        if let Some(port) = cli.discovery_port {
            self.network.discovery_port = port;
        }
        if let Some(cert) = &cli.cert {
            self.tls.cert = Some(cert.clone());
        }
        if let Some(key) = &cli.key {
            self.tls.key = Some(key.clone());
        }
        if let Some(credentials) = &cli.credentials {
            self.credentials_file = Some(credentials.clone());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let config = ServerConfig::default();
        assert_eq!(config.network.service_port, cbp_protocol::DEFAULT_SERVICE_PORT);
        assert_eq!(config.network.discovery_port, cbp_protocol::DEFAULT_DISCOVERY_PORT);
    }

    #[test]
    fn cli_flags_override_defaults() {
        let cli = Cli {
            config: None,
            port: Some(9999),
            discovery_port: None,
            cert: None,
            key: None,
            credentials: None,
        };
        let config = ServerConfig::default().merge_cli(&cli);
        assert_eq!(config.network.service_port, 9999);
        assert_eq!(config.network.discovery_port, cbp_protocol::DEFAULT_DISCOVERY_PORT);
    }
}
