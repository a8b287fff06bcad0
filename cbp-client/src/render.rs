use cbp_protocol::{CardHandEvent, Holder, Response};

/// One human-readable line (or a few) for a decoded response, printed
/// to stdout as it arrives whether it's the reply to a command just
/// sent or an asynchronous push from the table engine.
pub fn describe(response: &Response) -> String {
    match response {
        Response::Version { version, accepted: true } => {
            format!("server accepted protocol version {version}")
        }
        Response::Version { version, accepted: false } => {
            format!("server rejected protocol version {version}, disconnecting")
        }
        Response::Balance { balance } => format!("balance: {balance}"),
        Response::ListTables { tables } => {
            if tables.is_empty() {
                "no tables".to_string()
            } else {
                let mut lines = vec!["tables:".to_string()];
                for (id, block) in tables {
                    lines.push(format!("  [{id}] {}", block.trim()));
                }
                lines.join("\n")
            }
        }
        Response::AddTableOk { table_id } => format!("table {table_id} created"),
        Response::JoinTableOk { settings_block } => {
            format!("joined table, settings:\n{}", settings_block.trim())
        }
        Response::CardHand {
            event,
            holder,
            soft_value,
            hard_value,
            cards,
        } => describe_hand(*event, *holder, *soft_value, *hard_value, cards),
        Response::Winnings { winnings } => format!("round settled, winnings: {winnings}"),
        Response::Ascii { text, .. } => text.trim().to_string(),
    }
}

fn describe_hand(
    event: CardHandEvent,
    holder: Holder,
    soft_value: u8,
    hard_value: u8,
    cards: &[cbp_protocol::Card],
) -> String {
    let who = match holder {
        Holder::Dealer => "dealer",
        Holder::Player => "you",
    };
    let hand: Vec<String> = cards.iter().map(|c| format!("{c:?}")).collect();
    let value = if soft_value == hard_value {
        format!("{hard_value}")
    } else {
        format!("{soft_value}/{hard_value}")
    };
    match event {
        CardHandEvent::Dealt => format!("{who} dealt: {} (value {value})", hand.join(", ")),
        CardHandEvent::Bust => format!("{who} bust: {} (value {value})", hand.join(", ")),
        CardHandEvent::DoubleDownCard => {
            format!("{who} doubled down: {} (value {value})", hand.join(", "))
        }
        CardHandEvent::Blackjack => format!("{who} blackjack: {}", hand.join(", ")),
        CardHandEvent::TwentyOne => format!("{who} twenty-one: {} (value {value})", hand.join(", ")),
        CardHandEvent::YourTurn => format!("your turn, hand: {} (value {value})", hand.join(", ")),
    }
}
