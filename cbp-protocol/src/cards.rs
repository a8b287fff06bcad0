use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rank {
    Ace,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
}

impl Rank {
    const ALL: [Rank; 13] = [
        Rank::Ace,
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
    ];

    /// Wire encoding matches the original source's `char rank`: the
    /// face character itself (`'A'`, `'2'`..`'9'`, `'T'`, `'J'`, `'Q'`, `'K'`).
    pub fn to_byte(self) -> u8 {
        match self {
            Rank::Ace => b'A',
            Rank::Two => b'2',
            Rank::Three => b'3',
            Rank::Four => b'4',
            Rank::Five => b'5',
            Rank::Six => b'6',
            Rank::Seven => b'7',
            Rank::Eight => b'8',
            Rank::Nine => b'9',
            Rank::Ten => b'T',
            Rank::Jack => b'J',
            Rank::Queen => b'Q',
            Rank::King => b'K',
        }
    }

    pub fn from_byte(b: u8) -> Result<Rank, ProtocolError> {
        Ok(match b {
            b'A' => Rank::Ace,
            b'2' => Rank::Two,
            b'3' => Rank::Three,
            b'4' => Rank::Four,
            b'5' => Rank::Five,
            b'6' => Rank::Six,
            b'7' => Rank::Seven,
            b'8' => Rank::Eight,
            b'9' => Rank::Nine,
            b'T' => Rank::Ten,
            b'J' => Rank::Jack,
            b'Q' => Rank::Queen,
            b'K' => Rank::King,
            _ => return Err(ProtocolError::NotAscii),
        })
    }

    pub fn hard_value(self) -> u8 {
        match self {
            Rank::Ace => 1,
            Rank::Two => 2,
            Rank::Three => 3,
            Rank::Four => 4,
            Rank::Five => 5,
            Rank::Six => 6,
            Rank::Seven => 7,
            Rank::Eight => 8,
            Rank::Nine => 9,
            Rank::Ten | Rank::Jack | Rank::Queen | Rank::King => 10,
        }
    }

    pub fn soft_value(self) -> u8 {
        match self {
            Rank::Ace => 11,
            other => other.hard_value(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suit {
    Hearts,
    Clubs,
    Diamonds,
    Spades,
}

impl Suit {
    const ALL: [Suit; 4] = [Suit::Hearts, Suit::Clubs, Suit::Diamonds, Suit::Spades];

    pub fn to_byte(self) -> u8 {
        match self {
            Suit::Hearts => b'H',
            Suit::Clubs => b'C',
            Suit::Diamonds => b'D',
            Suit::Spades => b'S',
        }
    }

    pub fn from_byte(b: u8) -> Result<Suit, ProtocolError> {
        Ok(match b {
            b'H' => Suit::Hearts,
            b'C' => Suit::Clubs,
            b'D' => Suit::Diamonds,
            b'S' => Suit::Spades,
            _ => return Err(ProtocolError::NotAscii),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn encode(self, out: &mut Vec<u8>) {
        out.push(self.rank.to_byte());
        out.push(self.suit.to_byte());
    }

    pub fn decode(rank: u8, suit: u8) -> Result<Card, ProtocolError> {
        Ok(Card {
            rank: Rank::from_byte(rank)?,
            suit: Suit::from_byte(suit)?,
        })
    }
}

/// `soft ≤ 21` ? `soft` : `hard` — the "get_value" helper used throughout
/// the turn/dealer/settlement phases.
pub fn best_value(soft: u8, hard: u8) -> u8 {
    if soft <= 21 {
        soft
    } else {
        hard
    }
}

/// Soft and hard totals for a hand. Soft counts at most one Ace as 11;
/// if more than one Ace is present the rest count as 1 regardless, same
/// as the hard total, since two 11s would always bust.
pub fn hand_value(cards: &[Card]) -> (u8, u8) {
    let hard: u32 = cards.iter().map(|c| c.rank.hard_value() as u32).sum();
    let has_ace = cards.iter().any(|c| c.rank == Rank::Ace);
    let soft = if has_ace { hard + 10 } else { hard };
    (soft.min(255) as u8, hard.min(255) as u8)
}

pub fn is_natural_blackjack(cards: &[Card]) -> bool {
    if cards.len() != 2 {
        return false;
    }
    let (soft, hard) = hand_value(cards);
    best_value(soft, hard) == 21
}

/// A shuffled shoe of `number_decks` standard 52-card decks, drawn from
/// the tail. Reshuffled in place once exhausted.
pub struct Deck {
    number_decks: u8,
    cards: Vec<Card>,
}

impl Deck {
    pub fn new(number_decks: u8) -> Deck {
        let mut deck = Deck {
            number_decks,
            cards: Vec::new(),
        };
        deck.refill();
        deck
    }

    fn refill(&mut self) {
        self.cards.clear();
        for _ in 0..self.number_decks {
            for &suit in Suit::ALL.iter() {
                for &rank in Rank::ALL.iter() {
                    self.cards.push(Card { rank, suit });
                }
            }
        }
        self.cards.shuffle(&mut thread_rng());
    }

    pub fn draw(&mut self) -> Card {
        if self.cards.is_empty() {
            self.refill();
        }
        self.cards
            .pop()
            .expect("deck was just refilled with at least one card")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_byte_round_trips() {
        for &rank in Rank::ALL.iter() {
            assert_eq!(Rank::from_byte(rank.to_byte()).unwrap(), rank);
        }
    }

    #[test]
    fn suit_byte_round_trips() {
        for &suit in Suit::ALL.iter() {
            assert_eq!(Suit::from_byte(suit.to_byte()).unwrap(), suit);
        }
    }

    #[test]
    fn hand_value_ace_ten() {
        let hand = [
            Card {
                rank: Rank::Ace,
                suit: Suit::Spades,
            },
            Card {
                rank: Rank::Ten,
                suit: Suit::Hearts,
            },
        ];
        assert_eq!(hand_value(&hand), (21, 11));
        assert!(is_natural_blackjack(&hand));
    }

    #[test]
    fn two_aces_do_not_double_count_soft() {
        let hand = [
            Card {
                rank: Rank::Ace,
                suit: Suit::Spades,
            },
            Card {
                rank: Rank::Ace,
                suit: Suit::Hearts,
            },
        ];
        // hard = 2, soft = 12 (one ace promoted, not both)
        assert_eq!(hand_value(&hand), (12, 2));
    }

    #[test]
    fn deck_has_expected_size_and_reshuffles() {
        let mut deck = Deck::new(1);
        let mut drawn = 0;
        for _ in 0..52 {
            deck.draw();
            drawn += 1;
        }
        assert_eq!(drawn, 52);
        // one more draw should trigger a reshuffle rather than panic
        deck.draw();
    }
}
