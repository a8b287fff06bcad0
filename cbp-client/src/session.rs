use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context};
use cbp_protocol::{Command, Response, State, Transition};
use slog::{info, warn, Logger};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use rustls::ServerName;
use tokio_rustls::client::TlsStream;

use crate::render;
use crate::tls;

const READ_CHUNK: usize = 4096;

/// A connected, authenticated-or-authenticating session. Owns the write
/// half directly; the read loop that feeds `shared_state` runs as a
/// background task holding the read half, mirroring the split the
/// server's own connection handler uses between its push channel and
/// its read loop.
pub struct Session {
    write_half: tokio::io::WriteHalf<TlsStream<TcpStream>>,
    state: Arc<Mutex<State>>,
    log: Logger,
}

impl Session {
    pub async fn connect(addr: SocketAddr, log: Logger) -> anyhow::Result<Session> {
        let tcp = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connecting to {addr}"))?;
        let server_name = ServerName::try_from(addr.ip().to_string().as_str())
            .context("building TLS server name from peer address")?;
        let tls_stream = tls::connector()
            .connect(server_name, tcp)
            .await
            .context("TLS handshake failed")?;

        let (mut read_half, write_half) = tokio::io::split(tls_stream);
        let state = Arc::new(Mutex::new(State::Version));

        let reader_state = Arc::clone(&state);
        let reader_log = log.clone();
        tokio::spawn(async move {
            if let Err(err) = read_loop(&mut read_half, reader_state, reader_log.clone()).await {
                warn!(reader_log, "connection closed"; "reason" => %err);
            }
        });

        Ok(Session { write_half, state, log })
    }

    pub async fn send(&mut self, command: &Command) -> anyhow::Result<()> {
        let current = *self.state.lock().unwrap();
        if !cbp_protocol::accepts(current, command) {
            bail!("{command:?} is not accepted in state {current:?}");
        }
        let mut buf = Vec::new();
        command.encode(&mut buf);
        self.write_half
            .write_all(&buf)
            .await
            .context("writing command")?;
        info!(self.log, "sent command"; "command" => format!("{command:?}"));
        Ok(())
    }

    pub fn state(&self) -> State {
        *self.state.lock().unwrap()
    }
}

async fn read_loop(
    read_half: &mut tokio::io::ReadHalf<TlsStream<TcpStream>>,
    state: Arc<Mutex<State>>,
    log: Logger,
) -> anyhow::Result<()> {
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = read_half.read(&mut chunk).await.context("reading from server")?;
        if n == 0 {
            bail!("server closed the connection");
        }
        buf.extend_from_slice(&chunk[..n]);

        loop {
            match Response::decode(&buf) {
                Ok((response, consumed)) => {
                    buf.drain(..consumed);
                    println!("{}", render::describe(&response));
                    let mut guard = state.lock().unwrap();
                    let reply_code = response.reply_code();
                    let next = cbp_protocol::advance(*guard, reply_code);
                    match next {
                        Transition::To(new_state) => *guard = new_state,
                        Transition::Stay => {}
                        Transition::Close => {
                            drop(guard);
                            bail!("server closed the connection after {reply_code:?}");
                        }
                    }
                }
                Err(cbp_protocol::ProtocolError::Incomplete) => break,
                Err(err) => {
                    warn!(log, "malformed response from server"; "error" => %err);
                    bail!("protocol error decoding server response: {err}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The client mirrors the server's DFA by feeding received reply
    /// codes through the same `cbp_protocol::advance` the read loop
    /// above calls. A client that joined mid-round (queued, IN_PROGRESS)
    /// must still reach ENTER_BETS once the table's admit phase pushes
    /// its JoinTableOk, or BET would never become legal again locally.
    #[test]
    fn mid_round_join_admission_unsticks_local_state() {
        let mut state = State::InProgress;
        let next = cbp_protocol::advance(state, Response::JoinTableOk { settings_block: String::new() }.reply_code());
        if let Transition::To(new_state) = next {
            state = new_state;
        }
        assert_eq!(state, State::EnterBets);
    }
}
