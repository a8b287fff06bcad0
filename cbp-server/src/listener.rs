use std::net::SocketAddr;

use slog::{info, o, warn};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use crate::connection;
use crate::error::ServerError;
use crate::state::AppState;

/// The TCP accept loop (spec §4's "Listener/supervisor"). Spawns one
/// connection-handler task per accepted socket and otherwise runs
/// forever; a bind failure is the only fatal error (spec §7), surfaced
/// to `main` before any client is accepted.
///
/// On `ctrl_c`, stops accepting, broadcasts a close signal to every
/// live connection task, then blocks until each has dropped its clone
/// of the drain channel — the coordinated shutdown spec §5 describes,
/// generalizing `flux`'s single-session drain to many connections.
pub async fn run(bind_addr: SocketAddr, acceptor: TlsAcceptor, app: AppState) -> Result<(), ServerError> {
    let log = app.log.new(o!("component" => "listener"));
    let tcp = TcpListener::bind(bind_addr)
        .await
        .map_err(|source| ServerError::Bind { addr: bind_addr, source })?;
    info!(log, "listening for connections"; "addr" => %bind_addr);

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    let (drain_tx, mut drain_rx) = tokio::sync::mpsc::channel::<()>(1);

    loop {
        tokio::select! {
            accepted = tcp.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let acceptor = acceptor.clone();
                        let app = app.clone();
                        let shutdown_rx = shutdown_tx.subscribe();
                        let drain_tx = drain_tx.clone();
                        tokio::spawn(async move {
                            connection::handle(stream, peer, acceptor, app, shutdown_rx, drain_tx).await;
                        });
                    }
                    Err(err) => {
                        warn!(log, "accept failed"; "error" => %err);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!(log, "received shutdown signal, draining connections");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(());
    drop(drain_tx);
    drain_rx.recv().await;
    info!(log, "all connections drained");
    Ok(())
}
