use std::path::PathBuf;

use clap::Parser;

/// CBP game server: discovery, accounts, tables, blackjack rounds.
#[derive(Debug, Parser)]
#[clap(name = "cbp-server")]
pub struct Cli {
    /// Optional TOML config file; CLI flags below override its values.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// TCP/TLS service port.
    #[clap(long)]
    pub port: Option<u16>,

    /// UDP discovery port.
    #[clap(long)]
    pub discovery_port: Option<u16>,

    /// PEM certificate chain for the TLS listener.
    #[clap(long)]
    pub cert: Option<PathBuf>,

    /// PEM private key matching --cert.
    #[clap(long)]
    pub key: Option<PathBuf>,

    /// JSON username->password map. Defaults to a small built-in table
    /// when omitted.
    #[clap(long)]
    pub credentials: Option<PathBuf>,
}
