/// Immutable parameters a table is created with. Line-oriented ASCII
/// grammar: `key:value\n` pairs terminated by a blank line. Unknown
/// keys are ignored; missing or malformed keys fall back to defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSettings {
    pub max_players: u8,
    pub number_decks: u8,
    pub payoff_high: u32,
    pub payoff_low: u32,
    pub bet_min: u32,
    pub bet_max: u32,
    pub hit_soft_17: bool,
}

impl Default for TableSettings {
    fn default() -> TableSettings {
        TableSettings {
            max_players: 5,
            number_decks: 8,
            payoff_high: 3,
            payoff_low: 2,
            bet_min: 25,
            bet_max: 1000,
            hit_soft_17: true,
        }
    }
}

impl TableSettings {
    /// Parses a settings block, defaulting any key that is absent,
    /// unparsable, or out of range. Unrecognized keys and malformed
    /// lines (no `:`) are silently ignored, matching the original
    /// parser's tolerance for stray lines in a client-supplied block.
    pub fn parse(block: &str) -> TableSettings {
        let mut settings = TableSettings::default();
        for line in block.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.splitn(2, ':');
            let key = match parts.next() {
                Some(k) => k.trim(),
                None => continue,
            };
            let value = match parts.next() {
                Some(v) => v.trim(),
                None => continue,
            };
            match key {
                "max-players" => {
                    if let Ok(v) = value.parse::<u8>() {
                        if v >= 1 {
                            settings.max_players = v;
                        }
                    }
                }
                "number-decks" => {
                    if let Ok(v) = value.parse::<u8>() {
                        if v >= 1 {
                            settings.number_decks = v;
                        }
                    }
                }
                "payoff" => {
                    if let Some((h, l)) = split_once(value, '-') {
                        if let (Ok(h), Ok(l)) = (h.parse::<u32>(), l.parse::<u32>()) {
                            if h > 0 && l > 0 {
                                settings.payoff_high = h;
                                settings.payoff_low = l;
                            }
                        }
                    }
                }
                "bet-limits" => {
                    if let Some((min, max)) = split_once(value, '-') {
                        if let (Ok(min), Ok(max)) = (min.parse::<u32>(), max.parse::<u32>()) {
                            if min <= max {
                                settings.bet_min = min;
                                settings.bet_max = max;
                            }
                        }
                    }
                }
                "hit-soft-17" => match value {
                    "true" => settings.hit_soft_17 = true,
                    "false" => settings.hit_soft_17 = false,
                    _ => {}
                },
                _ => {}
            }
        }
        settings
    }

    /// Renders the block the server sends back (table description /
    /// `AddTable` echo / `JoinTable` response), blank-line terminated.
    pub fn render(&self) -> String {
        format!(
            "max-players:{}\nnumber-decks:{}\npayoff:{}-{}\nbet-limits:{}-{}\nhit-soft-17:{}\n\n",
            self.max_players,
            self.number_decks,
            self.payoff_high,
            self.payoff_low,
            self.bet_min,
            self.bet_max,
            self.hit_soft_17,
        )
    }
}

fn split_once(s: &str, sep: char) -> Option<(&str, &str)> {
    let idx = s.find(sep)?;
    Some((&s[..idx], &s[idx + sep.len_utf8()..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_on_empty_block() {
        assert_eq!(TableSettings::parse(""), TableSettings::default());
    }

    #[test]
    fn parses_full_block() {
        let block = "max-players:2\nnumber-decks:4\npayoff:2-1\nbet-limits:10-500\nhit-soft-17:false\n\n";
        let s = TableSettings::parse(block);
        assert_eq!(s.max_players, 2);
        assert_eq!(s.number_decks, 4);
        assert_eq!((s.payoff_high, s.payoff_low), (2, 1));
        assert_eq!((s.bet_min, s.bet_max), (10, 500));
        assert!(!s.hit_soft_17);
    }

    #[test]
    fn ignores_unknown_and_malformed_lines() {
        let block = "max-players:3\nnonsense-line-with-no-colon\nwhatever:1\n\n";
        let s = TableSettings::parse(block);
        assert_eq!(s.max_players, 3);
        assert_eq!(s.number_decks, TableSettings::default().number_decks);
    }

    #[test]
    fn falls_back_on_out_of_range_values() {
        let block = "bet-limits:500-10\nmax-players:0\n\n";
        let s = TableSettings::parse(block);
        assert_eq!(s, TableSettings::default());
    }

    #[test]
    fn render_round_trips_through_parse() {
        let s = TableSettings {
            max_players: 6,
            number_decks: 2,
            payoff_high: 6,
            payoff_low: 5,
            bet_min: 5,
            bet_max: 50,
            hit_soft_17: false,
        };
        assert_eq!(TableSettings::parse(&s.render()), s);
    }
}
