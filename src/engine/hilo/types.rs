use serde::{Deserialize, Serialize};
use std::fmt;

pub type Chips = u64;
pub type SeatIndex = u8; // 0..SEAT_COUNT
pub type PlayerId = String; // empty when the seat is unoccupied

pub const SEAT_COUNT: usize = 8;
pub const HOLE_CARD_COUNT: usize = 5;
pub const DECK_SIZE: usize = 52;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Street {
    Interround,
    Preflop,
    Flop,
    Turn,
    River,
    Declare,
    Showdown,
}

impl Street {
    pub fn is_betting(self) -> bool {
        matches!(self, Street::Preflop | Street::Flop | Street::Turn | Street::River)
    }

    /// Streets where the machine parks and waits for player input.
    pub fn awaits_players(self) -> bool {
        self.is_betting() || self == Street::Declare
    }
}

impl fmt::Display for Street {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Street::Interround => "interround",
            Street::Preflop => "preflop",
            Street::Flop => "flop",
            Street::Turn => "turn",
            Street::River => "river",
            Street::Declare => "declare",
            Street::Showdown => "showdown",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Declaration {
    High,
    Low,
    Both,
}

impl Declaration {
    pub fn contests_high(self) -> bool {
        matches!(self, Declaration::High | Declaration::Both)
    }

    pub fn contests_low(self) -> bool {
        matches!(self, Declaration::Low | Declaration::Both)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rank {
    #[serde(rename = "A")]
    Ace,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "T")]
    Ten,
    #[serde(rename = "J")]
    Jack,
    #[serde(rename = "Q")]
    Queen,
    #[serde(rename = "K")]
    King,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
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

    fn symbol(self) -> char {
        match self {
            Rank::Ace => 'A',
            Rank::Two => '2',
            Rank::Three => '3',
            Rank::Four => '4',
            Rank::Five => '5',
            Rank::Six => '6',
            Rank::Seven => '7',
            Rank::Eight => '8',
            Rank::Nine => '9',
            Rank::Ten => 'T',
            Rank::Jack => 'J',
            Rank::Queen => 'Q',
            Rank::King => 'K',
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suit = match self.suit {
            Suit::Hearts => 'h',
            Suit::Diamonds => 'd',
            Suit::Clubs => 'c',
            Suit::Spades => 's',
        };
        write!(f, "{}{}", self.rank.symbol(), suit)
    }
}

/// Forced-bet structure, mutable between hands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    pub ante: Chips,
    pub small_blind: Chips,
    pub big_blind: Chips,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            ante: 0,
            small_blind: 5,
            big_blind: 10,
        }
    }
}

/// Partial config update; absent fields keep their current value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ante: Option<Chips>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_blind: Option<Chips>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub big_blind: Option<Chips>,
}

impl ConfigPatch {
    pub fn merged_into(&self, base: TableConfig) -> TableConfig {
        TableConfig {
            ante: self.ante.unwrap_or(base.ante),
            small_blind: self.small_blind.unwrap_or(base.small_blind),
            big_blind: self.big_blind.unwrap_or(base.big_blind),
        }
    }
}
