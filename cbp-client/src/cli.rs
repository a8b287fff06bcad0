use clap::Parser;

/// CBP client: connects to a table server and renders its push events.
#[derive(Debug, Parser)]
#[clap(name = "cbp-client")]
pub struct Cli {
    /// Server host. When omitted, the client broadcasts a UDP discovery
    /// probe on the LAN and connects to whoever answers first.
    #[clap(long)]
    pub host: Option<String>,

    /// TCP/TLS service port.
    #[clap(long, default_value_t = cbp_protocol::DEFAULT_SERVICE_PORT)]
    pub port: u16,

    /// UDP discovery port, used only when `--host` is omitted.
    #[clap(long, default_value_t = cbp_protocol::DEFAULT_DISCOVERY_PORT)]
    pub discovery_port: u16,

    /// How long to wait for a discovery reply before giving up.
    #[clap(long, default_value_t = 2)]
    pub discovery_timeout_secs: u64,
}
