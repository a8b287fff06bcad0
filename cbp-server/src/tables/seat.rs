use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cbp_protocol::{Card, Response};
use tokio::sync::mpsc;

use crate::accounts::Account;
use crate::ids::ConnId;

/// A player's binding to one table for the lifetime of their seat.
/// Owned by whichever task currently has it: the table registry's
/// pending list, or the round loop's active players vector. Never
/// shared — mutation is always exclusive, because only one of those
/// places holds it at a time.
pub struct TableSeat {
    pub conn_id: ConnId,
    pub username: String,
    pub account: Arc<Account>,
    push_tx: mpsc::UnboundedSender<Response>,
    disconnected: Arc<AtomicBool>,
    pub bet: u32,
    pub hand: Vec<Card>,
}

impl TableSeat {
    pub fn new(
        conn_id: ConnId,
        username: String,
        account: Arc<Account>,
        push_tx: mpsc::UnboundedSender<Response>,
        disconnected: Arc<AtomicBool>,
    ) -> TableSeat {
        TableSeat {
            conn_id,
            username,
            account,
            push_tx,
            disconnected,
            bet: 0,
            hand: Vec::new(),
        }
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    /// Marks the seat disconnected so the engine stops touching it.
    /// Shared with the connection handler's own flag (dropped on TCP
    /// close or `Quit`) — set from the engine side when a player is
    /// kicked (table removed, table shutting down).
    pub fn mark_disconnected(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }

    /// Never writes to a disconnected seat (spec §5). Callers that need
    /// to deliver a final message and then disconnect (kicks) must push
    /// before calling `mark_disconnected`.
    pub fn push(&self, response: Response) {
        if !self.is_disconnected() {
            let _ = self.push_tx.send(response);
        }
    }
}
