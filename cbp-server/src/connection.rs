use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cbp_protocol::{dfa, Command, ProtocolError, Response, State, Transition, TableSettings};
use slog::{debug, info, o, warn, Logger};
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

use crate::accounts::Account;
use crate::ids::ConnId;
use crate::state::AppState;
use crate::tables::{JoinError, RemoveError, TableAction, TableSeat};

const READ_CHUNK: usize = 4096;

/// A connection's binding to its current table. Mirrors spec §3's
/// connection->table registry entry, but kept local to the task that
/// owns it rather than in a shared map (spec §9's message-passing
/// redesign) — see DESIGN.md.
struct Seat {
    disconnected: Arc<AtomicBool>,
    action_tx: mpsc::UnboundedSender<(ConnId, TableAction)>,
}

/// Runs one client connection end to end: TLS handshake, then the
/// read/dispatch/write loop (spec §4.3), until EOF, `Quit`, a version
/// mismatch, an I/O error, or a process-wide shutdown broadcast. Never
/// propagates an error to the caller — every fault here is logged and
/// the task simply returns, releasing whatever seat and registry
/// entries this connection held.
///
/// `shutdown` is the supervisor's close signal (spec §5's "[ADDED]
/// Shutdown"); `_drain` is held for the task's whole lifetime purely so
/// its sender side can detect every connection has exited (dropped its
/// clone) before the process terminates.
pub async fn handle(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    app: AppState,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
    _drain: mpsc::Sender<()>,
) {
    let conn_id = app.conn_ids.next();
    let log = app.log.new(o!("conn" => conn_id, "peer" => peer.to_string()));

    let mut tls = match acceptor.accept(stream).await {
        Ok(tls) => tls,
        Err(err) => {
            warn!(log, "tls handshake failed"; "error" => %err);
            return;
        }
    };
    debug!(log, "accepted connection");

    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<Response>();
    let mut ctx = Ctx {
        conn_id,
        app,
        log,
        push_tx,
        state: State::Version,
        username: None,
        account: None,
        seat: None,
    };

    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];

    'outer: loop {
        tokio::select! {
            biased;

            _ = shutdown.recv() => {
                info!(ctx.log, "closing connection for server shutdown");
                break 'outer;
            }

            pushed = push_rx.recv() => {
                let response = match pushed {
                    Some(response) => response,
                    // Only happens if `ctx` itself dropped its sender, which
                    // it never does while this loop is alive.
                    None => continue,
                };
                if write_response(&mut tls, &response, &ctx.log).await.is_err() {
                    break 'outer;
                }
                if ctx.observe_reply(response.reply_code()) {
                    break 'outer;
                }
            }

            read = tls.read(&mut chunk) => {
                let n = match read {
                    Ok(0) => {
                        debug!(ctx.log, "connection closed by peer");
                        break 'outer;
                    }
                    Ok(n) => n,
                    Err(err) => {
                        debug!(ctx.log, "read error"; "error" => %err);
                        break 'outer;
                    }
                };
                buf.extend_from_slice(&chunk[..n]);

                loop {
                    match Command::decode(&buf) {
                        Ok((command, consumed)) => {
                            buf.drain(..consumed);
                            if matches!(ctx.dispatch(&mut tls, command).await, Flow::Close) {
                                buf.clear();
                                break 'outer;
                            }
                        }
                        Err(ProtocolError::Incomplete) => break,
                        Err(ProtocolError::LineTooLong { .. }) | Err(ProtocolError::NotAscii) => {
                            warn!(ctx.log, "malformed pdu, closing connection");
                            buf.clear();
                            // Can't resynchronize framing; the connection
                            // closes rather than risk misreading the stream.
                            break 'outer;
                        }
                        Err(ProtocolError::UnknownCommand { category, command }) => {
                            warn!(ctx.log, "unrecognized command"; "category" => category, "command" => command);
                            let resp = Response::ascii(
                                5,
                                0,
                                0,
                                format!("unrecognized command {}-{}\n\n", category, command),
                            );
                            let _ = write_response(&mut tls, &resp, &ctx.log).await;
                            // The body shape of an unknown command is, by
                            // definition, unknown: framing can't be trusted
                            // past here, so the connection closes.
                            buf.clear();
                            break 'outer;
                        }
                        Err(ProtocolError::UnknownReplyCode(..)) => {
                            unreachable!("the server never decodes Response PDUs")
                        }
                    }
                }
            }
        }
    }

    ctx.release_seat();
}

enum Flow {
    Continue,
    Close,
}

struct Ctx {
    conn_id: ConnId,
    app: AppState,
    log: Logger,
    push_tx: mpsc::UnboundedSender<Response>,
    state: State,
    username: Option<String>,
    account: Option<Arc<Account>>,
    seat: Option<Seat>,
}

impl Ctx {
    /// Applies `dfa::advance` for a reply this connection is about to
    /// send (or just received over the push channel). A successful
    /// leave/kick also clears the local seat binding.
    fn observe_reply(&mut self, reply_code: (u8, u8, u8)) -> bool {
        let closing = match dfa::advance(self.state, reply_code) {
            Transition::Stay => false,
            Transition::To(next) => {
                self.state = next;
                false
            }
            Transition::Close => true,
        };
        if matches!(reply_code, (2, 1, 5) | (4, 1, 4)) {
            self.seat = None;
        }
        closing
    }

    fn release_seat(&mut self) {
        if let Some(seat) = self.seat.take() {
            seat.disconnected.store(true, Ordering::SeqCst);
        }
    }

    async fn dispatch(&mut self, tls: &mut TlsStream<TcpStream>, command: Command) -> Flow {
        if let Command::Quit = command {
            self.release_seat();
            return Flow::Close;
        }

        if !dfa::accepts(self.state, &command) {
            let resp = Response::ascii(5, subsystem(&command), 0, "command not accepted at current state\n\n");
            return self.reply(tls, resp).await;
        }

        match command {
            Command::Version { version } => self.handle_version(tls, version).await,
            Command::User { name } => self.handle_user(tls, name).await,
            Command::Pass { password } => self.handle_pass(tls, password).await,
            Command::GetBalance => self.handle_get_balance(tls).await,
            Command::UpdateBalance { delta } => self.handle_update_balance(tls, delta).await,
            Command::GetTables => self.handle_get_tables(tls).await,
            Command::AddTable { settings_block } => self.handle_add_table(tls, settings_block).await,
            Command::RemoveTable { table_id } => self.handle_remove_table(tls, table_id).await,
            Command::JoinTable { table_id } => self.handle_join_table(tls, table_id).await,
            Command::LeaveTable => self.handle_leave_table(tls).await,
            Command::Bet { amount } => self.forward_action(TableAction::Bet(amount)),
            Command::Hit => self.forward_action(TableAction::Hit),
            Command::Stand => self.forward_action(TableAction::Stand),
            Command::DoubleDown => self.forward_action(TableAction::DoubleDown),
            Command::Chat { text } => self.forward_action(TableAction::Chat(text)),
            Command::Quit => unreachable!("handled above"),
            // Reserved wire codes with no round-loop effect (spec §9).
            Command::Insurance | Command::Split | Command::Surrender => Flow::Continue,
        }
    }

    async fn reply(&mut self, tls: &mut TlsStream<TcpStream>, response: Response) -> Flow {
        if write_response(tls, &response, &self.log).await.is_err() {
            return Flow::Close;
        }
        if self.observe_reply(response.reply_code()) {
            Flow::Close
        } else {
            Flow::Continue
        }
    }

    async fn handle_version(&mut self, tls: &mut TlsStream<TcpStream>, version: u32) -> Flow {
        let accepted = version == cbp_protocol::PROTOCOL_VERSION;
        let resp = Response::Version {
            version: cbp_protocol::PROTOCOL_VERSION,
            accepted,
        };
        if !accepted {
            info!(self.log, "version mismatch"; "client_version" => version);
        }
        self.reply(tls, resp).await
    }

    async fn handle_user(&mut self, tls: &mut TlsStream<TcpStream>, name: String) -> Flow {
        self.username = Some(name);
        self.reply(tls, Response::ascii(3, 0, 0, "enter password\n\n")).await
    }

    async fn handle_pass(&mut self, tls: &mut TlsStream<TcpStream>, password: String) -> Flow {
        let username = self.username.clone().expect("PASSWORD state implies USER was sent");
        if self.app.credentials.check(&username, &password) {
            let account = self.app.accounts.get_or_create(&username).await;
            self.account = Some(account);
            info!(self.log, "authenticated"; "user" => username);
            self.reply(tls, Response::ascii(2, 0, 2, "authenticated\n\n")).await
        } else {
            warn!(self.log, "authentication failed"; "user" => username);
            self.username = None;
            self.reply(tls, Response::ascii(5, 0, 2, "authentication failed\n\n")).await
        }
    }

    async fn handle_get_balance(&mut self, tls: &mut TlsStream<TcpStream>) -> Flow {
        let balance = self.account().balance().await;
        self.reply(tls, Response::Balance { balance }).await
    }

    async fn handle_update_balance(&mut self, tls: &mut TlsStream<TcpStream>, delta: i32) -> Flow {
        self.account().adjust(delta).await;
        self.reply(tls, Response::ascii(2, 0, 0, "balance updated\n\n")).await
    }

    async fn handle_get_tables(&mut self, tls: &mut TlsStream<TcpStream>) -> Flow {
        let tables = self.app.tables.list().await;
        self.reply(tls, Response::ListTables { tables }).await
    }

    async fn handle_add_table(&mut self, tls: &mut TlsStream<TcpStream>, settings_block: String) -> Flow {
        let settings = TableSettings::parse(&settings_block);
        let table_id = self.app.tables.add(settings).await;
        info!(self.log, "table created"; "table_id" => table_id);
        self.reply(tls, Response::AddTableOk { table_id }).await
    }

    async fn handle_remove_table(&mut self, tls: &mut TlsStream<TcpStream>, table_id: u16) -> Flow {
        let username = self.username.clone().unwrap_or_default();
        let resp = match self.app.tables.remove(table_id, &format!("removed by {}", username)).await {
            Ok(()) => Response::ascii(2, 1, 2, "table removed\n\n"),
            Err(RemoveError::NotFound) => Response::ascii(4, 1, 2, "table not found\n\n"),
        };
        self.reply(tls, resp).await
    }

    async fn handle_join_table(&mut self, tls: &mut TlsStream<TcpStream>, table_id: u16) -> Flow {
        let table = match self.app.tables.get(table_id).await {
            Some(table) => table,
            None => return self.reply(tls, Response::ascii(4, 1, 2, "table not found\n\n")).await,
        };

        let username = self.username.clone().expect("ACCOUNT state implies authenticated");
        let account = Arc::clone(self.account());
        let disconnected = Arc::new(AtomicBool::new(false));
        let seat = TableSeat::new(self.conn_id, username, account, self.push_tx.clone(), Arc::clone(&disconnected));

        match crate::tables::Table::add_player(&table, seat).await {
            Err(JoinError::TableFull) => self.reply(tls, Response::ascii(4, 1, 3, "table is full\n\n")).await,
            Ok(was_running) => {
                self.seat = Some(Seat {
                    disconnected,
                    action_tx: table.action_sender(),
                });
                if was_running {
                    // Round already under way: queued as pending, told so
                    // synchronously. `JoinTableOk` (3-1-0) follows later,
                    // asynchronously, once the round loop admits this seat.
                    self.reply(tls, Response::ascii(1, 1, 0, "round in progress, you are queued\n\n")).await
                } else {
                    // The round loop was just spawned and will push
                    // `JoinTableOk` from its admit phase; nothing to send now.
                    Flow::Continue
                }
            }
        }
    }

    async fn handle_leave_table(&mut self, tls: &mut TlsStream<TcpStream>) -> Flow {
        match self.seat.take() {
            Some(seat) => {
                seat.disconnected.store(true, Ordering::SeqCst);
                self.reply(tls, Response::ascii(2, 1, 5, "left table\n\n")).await
            }
            None => Flow::Continue,
        }
    }

    fn forward_action(&mut self, action: TableAction) -> Flow {
        if let Some(seat) = &self.seat {
            let _ = seat.action_tx.send((self.conn_id, action));
        }
        Flow::Continue
    }

    fn account(&self) -> &Arc<Account> {
        self.account.as_ref().expect("ACCOUNT+ states imply an authenticated account")
    }
}

/// Subsystem digit for a rejected command's "not accepted at current
/// state" reply: table/game commands (category 1) get 5-1-0, account
/// commands (category 0) get 5-0-0 — spec §4.2's "5-0-0 or 5-1-0".
fn subsystem(command: &Command) -> u8 {
    match command {
        Command::Version { .. }
        | Command::User { .. }
        | Command::Pass { .. }
        | Command::GetBalance
        | Command::UpdateBalance { .. }
        | Command::Quit => 0,
        _ => 1,
    }
}

async fn write_response(tls: &mut TlsStream<TcpStream>, response: &Response, log: &Logger) -> Result<(), ()> {
    let mut buf = Vec::new();
    response.encode(&mut buf);
    match tls.write_all(&buf).await {
        Ok(()) => Ok(()),
        Err(err) => {
            debug!(log, "write error"; "error" => %err);
            Err(())
        }
    }
}
