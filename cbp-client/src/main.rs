use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use slog::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use cbp_client::{cli::Cli, discovery, input, logging, session::Session};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log = logging::default();

    let addr: SocketAddr = match &cli.host {
        Some(host) => {
            let resolved = tokio::net::lookup_host((host.as_str(), cli.port))
                .await
                .with_context(|| format!("resolving host {host}"))?
                .next()
                .with_context(|| format!("no address found for host {host}"))?;
            resolved
        }
        None => {
            info!(log, "no --host given, broadcasting discovery probe");
            discovery::find_server(cli.discovery_port, Duration::from_secs(cli.discovery_timeout_secs))
                .await
                .context("discovery failed; pass --host to connect directly")?
        }
    };
    info!(log, "connecting"; "addr" => %addr);

    let mut session = Session::connect(addr, log.clone())
        .await
        .context("failed to establish session")?;

    // Handshake: VERSION is the only command accepted in the initial
    // state, so send it before handing control to the free-form loop.
    session
        .send(&cbp_protocol::Command::Version {
            version: cbp_protocol::PROTOCOL_VERSION,
        })
        .await
        .context("sending VERSION")?;

    println!("connected. type commands (user/pass/balance/tables/jointable/bet/hit/stand/...), 'quit' to leave.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await.context("reading stdin")? {
            Some(line) => line,
            None => break,
        };
        let command = match input::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        let is_quit = matches!(command, cbp_protocol::Command::Quit);
        if let Err(err) = session.send(&command).await {
            warn!(log, "command rejected"; "error" => %err);
            println!("{err}");
            continue;
        }
        if is_quit {
            break;
        }
    }

    info!(log, "client exiting"; "final_state" => format!("{:?}", session.state()));
    Ok(())
}
