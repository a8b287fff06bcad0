use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use slog::{error, info};

use cbp_server::accounts::AccountRegistry;
use cbp_server::cli::Cli;
use cbp_server::config::ServerConfig;
use cbp_server::credentials::Credentials;
use cbp_server::ids::ConnIdGenerator;
use cbp_server::state::AppState;
use cbp_server::tables::TableRegistry;
use cbp_server::{discovery, listener, logging, tls};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("loading config file {:?}", path))?,
        None => ServerConfig::default(),
    }
    .merge_cli(&cli);

    let log = logging::default();

    let cert = config
        .tls
        .cert
        .clone()
        .context("no TLS certificate configured (--cert or config file's [tls].cert)")?;
    let key = config
        .tls
        .key
        .clone()
        .context("no TLS private key configured (--key or config file's [tls].key)")?;

    let credentials = match &config.credentials_file {
        Some(path) => Credentials::from_file(path)
            .with_context(|| format!("loading credentials file {:?}", path))?,
        None => {
            info!(log, "no credentials file configured, using built-in fixture accounts");
            Credentials::built_in()
        }
    };

    let runtime = tokio::runtime::Runtime::new().context("starting the async runtime")?;
    runtime.block_on(run(config, log, credentials, cert, key))
}

async fn run(
    config: ServerConfig,
    log: slog::Logger,
    credentials: Credentials,
    cert: std::path::PathBuf,
    key: std::path::PathBuf,
) -> anyhow::Result<()> {
    let acceptor = tls::load_acceptor(&cert, &key)?;

    let accounts = Arc::new(AccountRegistry::new());
    let tables = Arc::new(TableRegistry::new(Arc::clone(&accounts), log.clone()));
    let app = AppState {
        credentials: Arc::new(credentials),
        accounts,
        tables,
        conn_ids: Arc::new(ConnIdGenerator::new()),
        log: log.clone(),
    };

    let service_addr: SocketAddr = ([0, 0, 0, 0], config.network.service_port).into();
    let discovery_addr: SocketAddr = ([0, 0, 0, 0], config.network.discovery_port).into();

    let discovery_log = log.clone();
    tokio::spawn(async move {
        if let Err(err) = discovery::run(discovery_addr, config.network.service_port, discovery_log.clone()).await {
            error!(discovery_log, "discovery responder exited"; "error" => %err);
        }
    });

    listener::run(service_addr, acceptor, app).await?;
    info!(log, "server shut down cleanly");
    Ok(())
}
