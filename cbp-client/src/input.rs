use cbp_protocol::{Command, TableSettings};

/// Turns one line of interactive input into a wire command. Returns
/// `None` for a blank line; a bad line is reported inline rather than
/// sent, since there's no PDU to round-trip a parse failure through.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let mut parts = line.splitn(2, char::is_whitespace);
    let verb = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim();

    let command = match verb {
        "version" => Command::Version {
            version: rest.parse().map_err(|_| "usage: version <number>")?,
        },
        "user" => Command::User { name: rest.to_string() },
        "pass" => Command::Pass { password: rest.to_string() },
        "balance" => Command::GetBalance,
        "updatebalance" => Command::UpdateBalance {
            delta: rest.parse().map_err(|_| "usage: updatebalance <+/-amount>")?,
        },
        "quit" | "exit" => Command::Quit,
        "tables" => Command::GetTables,
        "addtable" => {
            let settings = if rest.is_empty() {
                TableSettings::default()
            } else {
                parse_settings_args(rest)?
            };
            Command::AddTable {
                settings_block: settings.render(),
            }
        }
        "removetable" => Command::RemoveTable {
            table_id: rest.parse().map_err(|_| "usage: removetable <table id>")?,
        },
        "jointable" | "join" => Command::JoinTable {
            table_id: rest.parse().map_err(|_| "usage: jointable <table id>")?,
        },
        "leavetable" | "leave" => Command::LeaveTable,
        "bet" => Command::Bet {
            amount: rest.parse().map_err(|_| "usage: bet <amount>")?,
        },
        "insurance" => Command::Insurance,
        "hit" => Command::Hit,
        "stand" => Command::Stand,
        "doubledown" | "double" => Command::DoubleDown,
        "split" => Command::Split,
        "surrender" => Command::Surrender,
        "chat" | "say" => Command::Chat { text: rest.to_string() },
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(Some(command))
}

/// `addtable max-players=2 bet-limits=10-500` style overrides on top of
/// the default settings, kept separate from the wire block grammar
/// (`key:value`) so a typo in one doesn't masquerade as the other.
fn parse_settings_args(rest: &str) -> Result<TableSettings, String> {
    let block: String = rest
        .split_whitespace()
        .map(|pair| pair.replacen('=', ":", 1))
        .collect::<Vec<_>>()
        .join("\n");
    Ok(TableSettings::parse(&format!("{block}\n\n")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_line_parses_to_nothing() {
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn user_and_pass_carry_their_argument() {
        assert_eq!(
            parse("user foo").unwrap(),
            Some(Command::User { name: "foo".into() })
        );
        assert_eq!(
            parse("pass bar").unwrap(),
            Some(Command::Pass { password: "bar".into() })
        );
    }

    #[test]
    fn bet_rejects_non_numeric_argument() {
        assert!(parse("bet lots").is_err());
    }

    #[test]
    fn jointable_parses_numeric_id() {
        assert_eq!(
            parse("jointable 3").unwrap(),
            Some(Command::JoinTable { table_id: 3 })
        );
    }

    #[test]
    fn addtable_with_no_args_uses_defaults() {
        let command = parse("addtable").unwrap().unwrap();
        assert_eq!(
            command,
            Command::AddTable {
                settings_block: TableSettings::default().render()
            }
        );
    }

    #[test]
    fn addtable_overrides_are_applied() {
        let command = parse("addtable max-players=2 bet-limits=5-50").unwrap().unwrap();
        match command {
            Command::AddTable { settings_block } => {
                let settings = TableSettings::parse(&settings_block);
                assert_eq!(settings.max_players, 2);
                assert_eq!((settings.bet_min, settings.bet_max), (5, 50));
            }
            other => panic!("expected AddTable, got {other:?}"),
        }
    }

    #[test]
    fn unknown_verb_is_rejected() {
        assert!(parse("fold").is_err());
    }
}
