use crate::codec::Command;

/// Per-connection protocol state. Both client and server drive the same
/// table; the server gates commands by it, the client advances it from
/// received reply codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Version,
    Username,
    Password,
    Account,
    InProgress,
    EnterBets,
    WaitForTurn,
    Turn,
    WaitForDealer,
}

/// Whether a command is legal to send/accept in the current state.
/// `Quit` is accepted from every state.
pub fn accepts(state: State, command: &Command) -> bool {
    if let Command::Quit = command {
        return true;
    }
    use Command::*;
    match state {
        State::Version => matches!(command, Version { .. }),
        State::Username => matches!(command, User { .. }),
        State::Password => matches!(command, Pass { .. }),
        State::Account => matches!(
            command,
            GetBalance
                | UpdateBalance { .. }
                | GetTables
                | AddTable { .. }
                | RemoveTable { .. }
                | JoinTable { .. }
        ),
        State::InProgress | State::WaitForTurn | State::WaitForDealer => {
            matches!(command, GetBalance | UpdateBalance { .. } | LeaveTable | Chat { .. })
        }
        State::EnterBets => matches!(
            command,
            GetBalance | UpdateBalance { .. } | LeaveTable | Chat { .. } | Bet { .. }
        ),
        State::Turn => matches!(
            command,
            GetBalance
                | UpdateBalance { .. }
                | LeaveTable
                | Chat { .. }
                | Hit
                | Stand
                | DoubleDown
        ),
    }
}

/// Outcome of consulting the transition table with an outgoing reply
/// code. `Close` means the connection is torn down after the reply is
/// written (the version-mismatch case).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Stay,
    To(State),
    Close,
}

/// Server-side: given the state a reply is being sent from and its
/// triple, what state (or closure) follows. Also used unmodified by
/// the client, which applies it to replies it receives.
pub fn advance(state: State, reply_code: (u8, u8, u8)) -> Transition {
    match (state, reply_code) {
        (State::Version, (2, 0, 1)) => Transition::To(State::Username),
        (State::Version, (5, 0, 1)) => Transition::Close,
        (State::Username, (3, 0, 0)) => Transition::To(State::Password),
        (State::Password, (2, 0, 2)) => Transition::To(State::Account),
        (State::Password, (5, 0, 2)) => Transition::To(State::Username),
        (State::Account, (3, 1, 0)) => Transition::To(State::EnterBets),
        (State::Account, (1, 1, 0)) => Transition::To(State::InProgress),
        // Joined mid-round (ACCOUNT -> IN_PROGRESS via 1-1-0 above) and
        // the round loop's next admit phase pushes the JoinTableOk this
        // seat was queued for — same admit-phase reply a fresh join
        // gets, just arriving asynchronously instead of synchronously.
        (State::InProgress, (3, 1, 0)) => Transition::To(State::EnterBets),
        (State::EnterBets, (2, 1, 0)) => Transition::To(State::WaitForTurn),
        (State::WaitForTurn, (3, 1, 2)) => Transition::To(State::Turn),
        (State::WaitForTurn, (1, 1, 4)) => Transition::To(State::WaitForDealer),
        (State::Turn, (2, 1, 0)) => Transition::To(State::WaitForDealer),
        (State::Turn, (1, 1, 2)) | (State::Turn, (1, 1, 6)) => Transition::To(State::WaitForDealer),
        (State::Turn, (1, 1, 4)) | (State::Turn, (1, 1, 3)) => Transition::To(State::WaitForDealer),
        (State::WaitForDealer, (3, 1, 3)) | (State::WaitForDealer, (3, 1, 4)) => {
            Transition::To(State::EnterBets)
        }
        // Any table state + successful leave or kick returns to ACCOUNT.
        (State::InProgress, (2, 1, 5))
        | (State::EnterBets, (2, 1, 5))
        | (State::WaitForTurn, (2, 1, 5))
        | (State::Turn, (2, 1, 5))
        | (State::WaitForDealer, (2, 1, 5))
        | (State::InProgress, (4, 1, 4))
        | (State::EnterBets, (4, 1, 4))
        | (State::WaitForTurn, (4, 1, 4))
        | (State::Turn, (4, 1, 4))
        | (State::WaitForDealer, (4, 1, 4)) => Transition::To(State::Account),
        // Timeouts (1-1-7): ENTER_BETS -> IN_PROGRESS (requeued as pending);
        // TURN -> WAIT_FOR_DEALER.
        (State::EnterBets, (1, 1, 7)) => Transition::To(State::InProgress),
        (State::Turn, (1, 1, 7)) => Transition::To(State::WaitForDealer),
        _ => Transition::Stay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Command;

    #[test]
    fn version_state_only_accepts_version() {
        assert!(accepts(State::Version, &Command::Version { version: 1 }));
        assert!(!accepts(State::Version, &Command::GetBalance));
        assert!(accepts(State::Version, &Command::Quit));
    }

    #[test]
    fn account_state_gate_matches_table() {
        assert!(accepts(State::Account, &Command::GetTables));
        assert!(accepts(State::Account, &Command::JoinTable { table_id: 0 }));
        assert!(!accepts(State::Account, &Command::Hit));
        assert!(!accepts(State::Account, &Command::Bet { amount: 1 }));
    }

    #[test]
    fn turn_state_adds_game_actions() {
        assert!(accepts(State::Turn, &Command::Hit));
        assert!(accepts(State::Turn, &Command::Stand));
        assert!(accepts(State::Turn, &Command::DoubleDown));
        assert!(!accepts(State::Turn, &Command::Bet { amount: 1 }));
    }

    #[test]
    fn handshake_transitions() {
        assert_eq!(
            advance(State::Version, (2, 0, 1)),
            Transition::To(State::Username)
        );
        assert_eq!(advance(State::Version, (5, 0, 1)), Transition::Close);
        assert_eq!(
            advance(State::Username, (3, 0, 0)),
            Transition::To(State::Password)
        );
        assert_eq!(
            advance(State::Password, (2, 0, 2)),
            Transition::To(State::Account)
        );
    }

    #[test]
    fn bust_ends_turn() {
        assert_eq!(
            advance(State::Turn, (1, 1, 2)),
            Transition::To(State::WaitForDealer)
        );
    }

    #[test]
    fn unrecognized_triple_leaves_state_unchanged() {
        assert_eq!(advance(State::Account, (9, 9, 9)), Transition::Stay);
    }

    #[test]
    fn mid_round_join_then_admit_reaches_enter_bets() {
        // ACCOUNT + JOINTABLE while a round is running: server replies
        // 1-1-0, client moves to IN_PROGRESS.
        assert_eq!(
            advance(State::Account, (1, 1, 0)),
            Transition::To(State::InProgress)
        );
        // The round loop's next admit phase later pushes JoinTableOk
        // (3-1-0) to that same seat; the state must advance so BET is
        // legal again once seated.
        assert_eq!(
            advance(State::InProgress, (3, 1, 0)),
            Transition::To(State::EnterBets)
        );
        assert!(accepts(State::EnterBets, &Command::Bet { amount: 1 }));
    }

    #[test]
    fn bet_timeout_requeue_then_admit_reaches_enter_bets() {
        // ENTER_BETS + bet-window timeout (1-1-7): requeued as pending,
        // moved to IN_PROGRESS. The same admit-phase 3-1-0 must return
        // the player to ENTER_BETS once re-admitted.
        assert_eq!(
            advance(State::EnterBets, (1, 1, 7)),
            Transition::To(State::InProgress)
        );
        assert_eq!(
            advance(State::InProgress, (3, 1, 0)),
            Transition::To(State::EnterBets)
        );
    }
}
