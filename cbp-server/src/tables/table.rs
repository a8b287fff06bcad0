use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cbp_protocol::{
    best_value, hand_value, is_natural_blackjack, CardHandEvent, Deck, Holder, Response,
    TableSettings,
};
use slog::{debug, info, o, Logger};
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;

use crate::accounts::AccountRegistry;
use crate::ids::ConnId;
use crate::tables::seat::TableSeat;

/// How long players have to place a bet once a round opens (spec §4.4b).
pub const BET_WINDOW: Duration = Duration::from_secs(15);
/// How long a player has to act once it's their turn (spec §4.4d).
pub const TURN_WINDOW: Duration = Duration::from_secs(30);

/// Actions a seated player can send into their table's round loop.
/// `Chat` and `Bet` are accepted in any phase (chat always; bet is
/// rejected with a business-rule error outside the betting window).
#[derive(Debug, Clone)]
pub enum TableAction {
    Bet(u32),
    Hit,
    Stand,
    DoubleDown,
    Chat(String),
}

#[derive(Debug)]
pub enum JoinError {
    TableFull,
}

/// How often the round loop's wait points re-check for shutdown and
/// per-seat disconnection while otherwise waiting on the action
/// channel — the event-driven substitute for the ~1s polling granularity
/// spec §5 describes (the channel recv still wakes immediately on a
/// real action; this bound only matters for silence).
const POLL_GRANULARITY: Duration = Duration::from_secs(1);

struct Shared {
    pending: Mutex<Vec<TableSeat>>,
    seated_count: AtomicUsize,
    running: AtomicBool,
    shutting_down: AtomicBool,
    action_rx: Mutex<mpsc::UnboundedReceiver<(ConnId, TableAction)>>,
}

/// A blackjack table. Settings are fixed at creation; everything
/// mutable lives either behind `shared.pending`'s lock (for seats not
/// yet admitted into a round) or is owned outright by the currently
/// running round-loop task.
pub struct Table {
    pub id: u16,
    pub settings: TableSettings,
    shared: Shared,
    action_tx: mpsc::UnboundedSender<(ConnId, TableAction)>,
    accounts: Arc<AccountRegistry>,
    log: Logger,
}

impl Table {
    pub fn new(
        id: u16,
        settings: TableSettings,
        accounts: Arc<AccountRegistry>,
        log: Logger,
    ) -> Table {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        Table {
            id,
            settings,
            shared: Shared {
                pending: Mutex::new(Vec::new()),
                seated_count: AtomicUsize::new(0),
                running: AtomicBool::new(false),
                shutting_down: AtomicBool::new(false),
                action_rx: Mutex::new(action_rx),
            },
            action_tx,
            accounts,
            log: log.new(o!("table" => id)),
        }
    }

    pub fn action_sender(&self) -> mpsc::UnboundedSender<(ConnId, TableAction)> {
        self.action_tx.clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub async fn occupancy(&self) -> usize {
        self.shared.seated_count.load(Ordering::SeqCst) + self.shared.pending.lock().await.len()
    }

    /// Admits `seat` into the table's pending list and spawns the round
    /// loop if it is not already running. Mirrors `AddTable`'s
    /// insert-then-notify ordering: the capacity check and insertion
    /// happen under one lock acquisition.
    ///
    /// The `running` swap happens while `pending`'s lock is still held,
    /// not after it is dropped: the round loop's own admit block holds
    /// that same lock across its drain *and* its running-flag flip when
    /// it decides to exit, so the two can never interleave and strand a
    /// freshly pushed seat behind a `running == false` nothing will
    /// clear.
    ///
    /// Returns whether a round was already running: when `false`, the
    /// caller just started one and the admitted seat will receive its
    /// `JoinTableOk` (3-1-0) asynchronously from the round loop's admit
    /// phase; when `true`, the round is mid-cycle and the caller must
    /// send the "round in progress" (1-1-0) reply itself (spec §4.2's
    /// ACCOUNT + JOINTABLE transition).
    pub async fn add_player(table: &Arc<Table>, seat: TableSeat) -> Result<bool, JoinError> {
        let mut pending = table.shared.pending.lock().await;
        let occupied = table.shared.seated_count.load(Ordering::SeqCst) + pending.len();
        if occupied >= table.settings.max_players as usize {
            return Err(JoinError::TableFull);
        }
        pending.push(seat);
        let was_running = table.shared.running.swap(true, Ordering::SeqCst);
        if !was_running {
            tokio::spawn(run_round_loop(Arc::clone(table)));
        }
        Ok(was_running)
    }

    /// `RemoveTable`: every current and pending player is kicked back
    /// to ACCOUNT with a 4-1-4 "table is being closed" and their seat
    /// is marked disconnected. Pending seats (not yet admitted into a
    /// round) are reachable directly; seats already inside a running
    /// round loop are owned by that task, so this only raises the
    /// shutdown flag the loop polls at its wait points (spec §5's
    /// ~1s-granularity observation, here event-driven).
    pub async fn shutdown(&self, reason: &str) {
        info!(self.log, "table shutting down"; "reason" => reason);
        let mut pending = self.shared.pending.lock().await;
        for seat in pending.drain(..) {
            kick(&seat, "table is being closed\n\n");
        }
        drop(pending);
        self.shared.shutting_down.store(true, Ordering::SeqCst);
    }
}

/// Pushes the kick notice then marks the seat disconnected — order
/// matters, since `push` refuses to write to an already-disconnected
/// seat.
fn kick(seat: &TableSeat, message: &str) {
    seat.push(Response::ascii(4, 1, 4, message));
    seat.mark_disconnected();
}

fn kick_all(players: &[TableSeat], message: &str) {
    for seat in players {
        kick(seat, message);
    }
}

fn card_response(holder: Holder, cards: &[cbp_protocol::Card], event: CardHandEvent) -> Response {
    let (soft, hard) = hand_value(cards);
    Response::CardHand {
        event,
        holder,
        soft_value: soft,
        hard_value: hard,
        cards: cards.to_vec(),
    }
}

fn broadcast(players: &[TableSeat], response: Response) {
    for seat in players {
        seat.push(response.clone());
    }
}

fn hit_event(cards: &[cbp_protocol::Card]) -> CardHandEvent {
    let (soft, hard) = hand_value(cards);
    let value = best_value(soft, hard);
    if value > 21 {
        CardHandEvent::Bust
    } else if value == 21 && cards.len() == 2 {
        CardHandEvent::Blackjack
    } else if value == 21 {
        CardHandEvent::TwentyOne
    } else {
        CardHandEvent::Dealt
    }
}

fn scaled_payout(bet: u32, payoff_high: u32, payoff_low: u32) -> u32 {
    ((u64::from(bet) * u64::from(payoff_high)) / u64::from(payoff_low)) as u32
}

/// The per-table round loop (spec §4.4). Runs for as long as the table
/// has current or pending players; exits (clearing `running`) once
/// both are empty, letting a future `add_player` spawn it again.
async fn run_round_loop(table: Arc<Table>) {
    let mut rx = table.shared.action_rx.lock().await;
    let mut players: Vec<TableSeat> = Vec::new();
    let mut deck = Deck::new(table.settings.number_decks);

    loop {
        if table.shared.shutting_down.load(Ordering::SeqCst) {
            kick_all(&players, "table is being closed\n\n");
            table.shared.seated_count.store(0, Ordering::SeqCst);
            table.shared.running.store(false, Ordering::SeqCst);
            debug!(table.log, "round loop exiting: shutdown");
            return;
        }

        // (a) admit. Holds `pending`'s lock across the drain and the
        // resulting exit-or-continue decision: `add_player` holds the
        // same lock across its own push-then-running-swap, so a seat
        // pushed concurrently can never be missed by this drain while
        // also racing past the `running.store(false)` exit below (see
        // `add_player`'s doc comment).
        {
            let mut pending = table.shared.pending.lock().await;
            let newcomers: Vec<TableSeat> = pending.drain(..).filter(|s| !s.is_disconnected()).collect();
            for seat in &newcomers {
                seat.push(Response::JoinTableOk {
                    settings_block: table.settings.render(),
                });
            }
            players.extend(newcomers);
            players.retain(|s| !s.is_disconnected());
            if players.is_empty() {
                table.shared.seated_count.store(0, Ordering::SeqCst);
                table.shared.running.store(false, Ordering::SeqCst);
                debug!(table.log, "round loop exiting: no players");
                return;
            }
            table.shared.seated_count.store(players.len(), Ordering::SeqCst);
        }
        broadcast(&players, Response::ascii(1, 1, 0, "Accepting bets!\n\n"));

        // (b) bet collection
        let deadline = Instant::now() + BET_WINDOW;
        loop {
            if table.shared.shutting_down.load(Ordering::SeqCst) {
                kick_all(&players, "table is being closed\n\n");
                table.shared.seated_count.store(0, Ordering::SeqCst);
                table.shared.running.store(false, Ordering::SeqCst);
                debug!(table.log, "round loop exiting: shutdown during betting");
                return;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match timeout(remaining.min(POLL_GRANULARITY), rx.recv()).await {
                Ok(Some((conn_id, TableAction::Bet(amount)))) => {
                    if let Some(seat) = players.iter_mut().find(|s| s.conn_id == conn_id) {
                        apply_bet(&table, seat, amount).await;
                    }
                }
                Ok(Some((conn_id, TableAction::Chat(text)))) => {
                    relay_chat(&players, conn_id, &text);
                }
                Ok(Some(_)) => { /* hit/stand/doubledown outside a turn: ignored */ }
                Ok(None) => return,
                Err(_) => { /* one poll tick elapsed; loop re-checks the deadline/shutdown */ }
            }
        }
        let mut still_betting = Vec::new();
        for seat in players.drain(..) {
            if seat.is_disconnected() {
                continue;
            }
            if seat.bet == 0 {
                seat.push(Response::ascii(1, 1, 7, "bet window expired\n\n"));
                table.shared.pending.lock().await.push(seat);
            } else {
                still_betting.push(seat);
            }
        }
        players = still_betting;
        table.shared.seated_count.store(players.len(), Ordering::SeqCst);
        if players.is_empty() {
            continue;
        }

        // (c) initial deal
        broadcast(&players, Response::ascii(1, 1, 0, "Starting round...\n\n"));
        for seat in players.iter_mut() {
            seat.hand.push(deck.draw());
            seat.push(card_response(Holder::Player, &seat.hand, CardHandEvent::Dealt));
        }
        let mut dealer_hand = vec![deck.draw()];
        broadcast(&players, card_response(Holder::Dealer, &dealer_hand, CardHandEvent::Dealt));
        for seat in players.iter_mut() {
            seat.hand.push(deck.draw());
            seat.push(card_response(Holder::Player, &seat.hand, hit_event(&seat.hand)));
        }
        players.retain(|s| !s.is_disconnected());
        if players.is_empty() {
            continue;
        }

        // (d) player turns
        for idx in 0..players.len() {
            if players[idx].is_disconnected() {
                continue;
            }
            if is_natural_blackjack(&players[idx].hand) {
                let resp = card_response(Holder::Player, &players[idx].hand, CardHandEvent::Blackjack);
                players[idx].push(resp);
                continue;
            }
            let turn_notice = card_response(Holder::Player, &players[idx].hand, CardHandEvent::YourTurn);
            players[idx].push(turn_notice);

            let deadline = Instant::now() + TURN_WINDOW;
            loop {
                if table.shared.shutting_down.load(Ordering::SeqCst) {
                    kick_all(&players, "table is being closed\n\n");
                    table.shared.seated_count.store(0, Ordering::SeqCst);
                    table.shared.running.store(false, Ordering::SeqCst);
                    debug!(table.log, "round loop exiting: shutdown during a turn");
                    return;
                }
                if players[idx].is_disconnected() {
                    break;
                }
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    players[idx].push(Response::ascii(1, 1, 7, "turn expired\n\n"));
                    break;
                }
                match timeout(remaining.min(POLL_GRANULARITY), rx.recv()).await {
                    Ok(Some((conn_id, action))) if conn_id == players[idx].conn_id => {
                        if apply_turn_action(&table, &mut players[idx], &mut deck, action).await {
                            break;
                        }
                    }
                    Ok(Some((conn_id, TableAction::Chat(text)))) => {
                        relay_chat(&players, conn_id, &text);
                    }
                    Ok(Some(_)) => { /* another seat's bet/hit/etc outside its turn: ignored */ }
                    Ok(None) => return,
                    Err(_) => { /* one poll tick elapsed; loop re-checks the deadline/shutdown */ }
                }
            }
        }

        // (e) dealer policy
        loop {
            let (soft, hard) = hand_value(&dealer_hand);
            let value = best_value(soft, hard);
            let dealer_stands = hard > 21
                || value == 21
                || value >= 18
                || hard == 17
                || (soft == 17 && !table.settings.hit_soft_17);
            if dealer_stands {
                break;
            }
            dealer_hand.push(deck.draw());
            broadcast(&players, card_response(Holder::Dealer, &dealer_hand, hit_event(&dealer_hand)));
        }

        // (f) settlement
        let (dealer_soft, dealer_hard) = hand_value(&dealer_hand);
        let dealer_value = best_value(dealer_soft, dealer_hard);
        let dealer_busted = dealer_value > 21;
        let dealer_natural = is_natural_blackjack(&dealer_hand);

        for seat in players.iter_mut() {
            if seat.bet == 0 {
                continue;
            }
            let (soft, hard) = hand_value(&seat.hand);
            let value = best_value(soft, hard);
            let player_natural = is_natural_blackjack(&seat.hand);

            let payout = if value > 21 {
                0
            } else if dealer_busted || value > dealer_value {
                scaled_payout(seat.bet, table.settings.payoff_high, table.settings.payoff_low)
            } else if value == 21 && dealer_value == 21 {
                if player_natural && !dealer_natural {
                    scaled_payout(seat.bet, table.settings.payoff_high, table.settings.payoff_low)
                } else if dealer_natural && !player_natural {
                    0
                } else {
                    seat.bet
                }
            } else if value == dealer_value {
                seat.bet
            } else {
                0
            };

            if payout > 0 {
                seat.account.credit(payout).await;
            }
            seat.push(Response::Winnings { winnings: payout });
            seat.bet = 0;
            seat.hand.clear();
        }
        dealer_hand.clear();
        players.retain(|s| !s.is_disconnected());
        table.shared.seated_count.store(players.len(), Ordering::SeqCst);
    }
}

async fn apply_bet(table: &Arc<Table>, seat: &mut TableSeat, amount: u32) {
    if seat.bet != 0 {
        seat.push(Response::ascii(5, 1, 0, "already have a bet this round\n\n"));
        return;
    }
    if amount < table.settings.bet_min || amount > table.settings.bet_max {
        seat.push(Response::ascii(5, 1, 0, "bet outside the table's limits\n\n"));
        return;
    }
    if !seat.account.debit(amount).await {
        seat.push(Response::ascii(5, 1, 0, "insufficient funds\n\n"));
        return;
    }
    seat.bet = amount;
    seat.push(Response::ascii(2, 1, 0, "bet accepted\n\n"));
}

/// Returns whether the player's turn is over.
async fn apply_turn_action(
    table: &Arc<Table>,
    seat: &mut TableSeat,
    deck: &mut Deck,
    action: TableAction,
) -> bool {
    match action {
        TableAction::Hit => {
            seat.hand.push(deck.draw());
            let event = hit_event(&seat.hand);
            seat.push(card_response(Holder::Player, &seat.hand, event));
            !matches!(event, CardHandEvent::Dealt)
        }
        TableAction::Stand => {
            seat.push(Response::ascii(2, 1, 0, "standing\n\n"));
            true
        }
        TableAction::DoubleDown => {
            if seat.bet == 0 || !seat.account.debit(seat.bet).await {
                seat.push(Response::ascii(5, 1, 0, "insufficient funds to double down\n\n"));
                false
            } else {
                seat.bet *= 2;
                seat.hand.push(deck.draw());
                let resp = card_response(Holder::Player, &seat.hand, CardHandEvent::DoubleDownCard);
                seat.push(resp);
                true
            }
        }
        TableAction::Bet(_) => {
            seat.push(Response::ascii(5, 0, 0, "command not accepted at current state\n\n"));
            false
        }
        TableAction::Chat(_) => false,
    }
}

fn relay_chat(players: &[TableSeat], from: ConnId, text: &str) {
    let sender = players.iter().find(|s| s.conn_id == from);
    let username = sender.map(|s| s.username.as_str()).unwrap_or("?");
    let line = format!("{}: {}\n\n", username, text);
    broadcast(players, Response::ascii(1, 1, 0, line));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ConnIdGenerator;
    use sloggers::Build;
    use std::sync::atomic::AtomicBool as StdAtomicBool;

    fn test_logger() -> Logger {
        sloggers::null::NullLoggerBuilder.build().unwrap()
    }

    fn test_seat(conn_id: ConnId, account: Arc<crate::accounts::Account>) -> (TableSeat, mpsc::UnboundedReceiver<Response>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let seat = TableSeat::new(
            conn_id,
            format!("player{conn_id}"),
            account,
            tx,
            Arc::new(StdAtomicBool::new(false)),
        );
        (seat, rx)
    }

    #[tokio::test]
    async fn add_player_reports_whether_a_round_was_already_running() {
        let accounts = Arc::new(AccountRegistry::new());
        let ids = ConnIdGenerator::new();
        let table = Arc::new(Table::new(0, TableSettings::default(), Arc::clone(&accounts), test_logger()));

        let account_a = accounts.get_or_create("a").await;
        let (seat_a, _rx_a) = test_seat(ids.next(), account_a);
        let was_running = Table::add_player(&table, seat_a).await.unwrap();
        assert!(!was_running, "first player should start a fresh round");

        let account_b = accounts.get_or_create("b").await;
        let (seat_b, _rx_b) = test_seat(ids.next(), account_b);
        let was_running = Table::add_player(&table, seat_b).await.unwrap();
        assert!(was_running, "second player joins a round already in flight");
    }

    #[tokio::test]
    async fn add_player_past_capacity_is_rejected() {
        let accounts = Arc::new(AccountRegistry::new());
        let ids = ConnIdGenerator::new();
        let settings = TableSettings { max_players: 1, ..TableSettings::default() };
        let table = Arc::new(Table::new(0, settings, Arc::clone(&accounts), test_logger()));

        let account_a = accounts.get_or_create("a").await;
        let (seat_a, _rx_a) = test_seat(ids.next(), account_a);
        assert!(Table::add_player(&table, seat_a).await.is_ok());

        let account_b = accounts.get_or_create("b").await;
        let (seat_b, _rx_b) = test_seat(ids.next(), account_b);
        assert!(matches!(
            Table::add_player(&table, seat_b).await,
            Err(JoinError::TableFull)
        ));
    }

    #[tokio::test]
    async fn shutdown_kicks_a_pending_player_and_marks_them_disconnected() {
        let accounts = Arc::new(AccountRegistry::new());
        let ids = ConnIdGenerator::new();
        let table = Table::new(0, TableSettings::default(), Arc::clone(&accounts), test_logger());

        let account_a = accounts.get_or_create("a").await;
        let (seat_a, mut rx_a) = test_seat(ids.next(), account_a);
        table.shared.pending.lock().await.push(seat_a);

        table.shutdown("closing for maintenance").await;

        let pushed = rx_a.recv().await.expect("kick notice should be pushed");
        assert_eq!(pushed.reply_code(), (4, 1, 4));
        assert!(table.shared.shutting_down.load(Ordering::SeqCst));
    }

    /// P8: a round completes within `betting_window +
    /// per_player_turn_window * |players| + dealer_draws` seconds
    /// regardless of client inactivity. The dealer-draw term has no
    /// fixed bound (a shoe could in principle keep dealing low cards),
    /// but it is driven by `deck.draw()` alone with no player-facing
    /// wait, so the only *enforced* deadlines are the bet and turn
    /// windows below; this asserts the formula's bounded terms match
    /// the named constants for a fixed player count.
    #[test]
    fn round_progress_bound_matches_named_constants_for_fixed_player_count() {
        let players = 4u32;
        let bounded_worst_case = BET_WINDOW + TURN_WINDOW * players;
        assert_eq!(bounded_worst_case, Duration::from_secs(15 + 30 * 4));
    }

    #[test]
    fn scaled_payout_applies_ratio() {
        assert_eq!(scaled_payout(50, 3, 2), 75);
        assert_eq!(scaled_payout(100, 1, 1), 100);
    }

    #[test]
    fn hit_event_classifies_totals() {
        use cbp_protocol::{Card, Rank, Suit};
        let bust = [
            Card { rank: Rank::King, suit: Suit::Spades },
            Card { rank: Rank::King, suit: Suit::Hearts },
            Card { rank: Rank::King, suit: Suit::Clubs },
        ];
        assert_eq!(hit_event(&bust), CardHandEvent::Bust);

        let natural = [
            Card { rank: Rank::Ace, suit: Suit::Spades },
            Card { rank: Rank::Ten, suit: Suit::Hearts },
        ];
        assert_eq!(hit_event(&natural), CardHandEvent::Blackjack);

        let twenty_one_three_cards = [
            Card { rank: Rank::Seven, suit: Suit::Spades },
            Card { rank: Rank::Seven, suit: Suit::Hearts },
            Card { rank: Rank::Seven, suit: Suit::Clubs },
        ];
        assert_eq!(hit_event(&twenty_one_three_cards), CardHandEvent::TwentyOne);

        let continuing = [
            Card { rank: Rank::Seven, suit: Suit::Spades },
            Card { rank: Rank::Seven, suit: Suit::Hearts },
        ];
        assert_eq!(hit_event(&continuing), CardHandEvent::Dealt);
    }
}
