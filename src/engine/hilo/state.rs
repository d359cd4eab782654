use serde::{Deserialize, Serialize};

use super::errors::{InvariantCheck, StateError};
use super::types::*;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSeat {
    pub seat: SeatIndex,
    pub player_id: PlayerId,

    pub stack: Chips, // chips behind
    pub bet: Chips,   // current-street contribution
    pub hole_cards: Vec<Card>,

    pub folded: bool,
    pub acted: bool,
    pub active: bool,
    pub declaration: Option<Declaration>,
}

impl GameSeat {
    pub fn empty(seat: SeatIndex) -> Self {
        Self {
            seat,
            player_id: PlayerId::new(),
            stack: 0,
            bet: 0,
            hole_cards: Vec::new(),
            folded: false,
            acted: false,
            active: false,
            declaration: None,
        }
    }

    pub fn is_occupied(&self) -> bool {
        !self.player_id.is_empty()
    }

    /// Still in the hand (may be all-in).
    pub fn is_contending(&self) -> bool {
        self.active && !self.folded
    }

    /// Still in the hand with chips behind, i.e. able to act.
    pub fn can_act(&self) -> bool {
        self.is_contending() && self.stack > 0
    }

    pub fn is_all_in(&self) -> bool {
        self.is_contending() && self.stack == 0
    }

    /// Per-hand flags cleared at the start of every hand.
    pub fn reset_for_hand(&mut self) {
        self.bet = 0;
        self.hole_cards.clear();
        self.folded = false;
        self.acted = false;
        self.declaration = None;
    }

    pub fn vacate(&mut self) {
        *self = GameSeat::empty(self.seat);
    }

    pub fn muck(&mut self) {
        self.folded = true;
        self.acted = true;
        self.hole_cards.clear();
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pot {
    pub amount: Chips,
    pub eligible_seats: Vec<SeatIndex>,
}

impl Pot {
    pub fn is_eligible(&self, seat: SeatIndex) -> bool {
        self.eligible_seats.contains(&seat)
    }

    pub(crate) fn add_eligible(&mut self, seat: SeatIndex) {
        if !self.is_eligible(seat) {
            self.eligible_seats.push(seat);
            self.eligible_seats.sort_unstable();
        }
    }
}

/// Authoritative per-table hand state. `game_seq` versions every persisted write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub table_id: String,
    pub hand_seq: u64,
    pub config: TableConfig,
    pub seats: Vec<GameSeat>,
    pub deck: Vec<Card>,
    pub street: Street,
    pub board_cards: Vec<Card>,
    pub button: SeatIndex,
    pub pots: Vec<Pot>,
    pub current_player_seat: SeatIndex,
    pub current_bet: Chips,
    pub min_raise: Chips,
    pub timer_seq: u64,
    pub game_seq: u64,
    /// Highest inter-round queue slot already attempted against this state.
    #[serde(default)]
    pub applied_action_seq: u64,
}

impl GameState {
    pub fn new(table_id: impl Into<String>, config: TableConfig) -> Self {
        Self {
            table_id: table_id.into(),
            hand_seq: 0,
            config,
            seats: (0..SEAT_COUNT as SeatIndex).map(GameSeat::empty).collect(),
            deck: Vec::new(),
            street: Street::Interround,
            board_cards: Vec::new(),
            button: 0,
            pots: Vec::new(),
            current_player_seat: 0,
            current_bet: 0,
            min_raise: config.big_blind,
            timer_seq: 0,
            game_seq: 0,
            applied_action_seq: 0,
        }
    }

    pub fn seat(&self, seat: SeatIndex) -> &GameSeat {
        &self.seats[seat as usize]
    }

    pub fn seat_mut(&mut self, seat: SeatIndex) -> &mut GameSeat {
        &mut self.seats[seat as usize]
    }

    pub fn seat_of(&self, player_id: &str) -> Option<&GameSeat> {
        if player_id.is_empty() {
            return None;
        }
        self.seats.iter().find(|s| s.player_id == player_id)
    }

    pub fn seat_of_mut(&mut self, player_id: &str) -> Option<&mut GameSeat> {
        if player_id.is_empty() {
            return None;
        }
        self.seats.iter_mut().find(|s| s.player_id == player_id)
    }

    pub fn current_seat(&self) -> &GameSeat {
        self.seat(self.current_player_seat)
    }

    pub fn active_seat_count(&self) -> usize {
        self.seats.iter().filter(|s| s.active).count()
    }

    pub fn contenders(&self) -> impl Iterator<Item = &GameSeat> {
        self.seats.iter().filter(|s| s.is_contending())
    }

    /// Chips sitting in the middle: collected pots plus live street bets.
    pub fn pot_total(&self) -> Chips {
        self.pots.iter().map(|p| p.amount).sum::<Chips>()
            + self.seats.iter().map(|s| s.bet).sum::<Chips>()
    }

    /// Conserved quantity for a hand: stacks, live bets, and pots.
    pub fn chips_in_play(&self) -> Chips {
        self.seats.iter().map(|s| s.stack).sum::<Chips>() + self.pot_total()
    }

    pub fn hand_id(&self) -> String {
        format!("{}#{}", self.table_id, self.hand_seq)
    }
}

impl InvariantCheck for GameState {
    fn validate_invariants(&self) -> Result<(), StateError> {
        if self.seats.len() != SEAT_COUNT {
            return Err(StateError::InvariantViolation("seat array must hold 8 slots"));
        }
        for (idx, seat) in self.seats.iter().enumerate() {
            if seat.seat as usize != idx {
                return Err(StateError::InvariantViolation("seat index mismatch"));
            }
            if !seat.is_occupied()
                && (seat.active || !seat.hole_cards.is_empty() || seat.stack > 0 || seat.bet > 0)
            {
                return Err(StateError::InvariantViolation(
                    "unoccupied seat carries chips, cards, or activity",
                ));
            }
        }
        if self.button as usize >= SEAT_COUNT || self.current_player_seat as usize >= SEAT_COUNT {
            return Err(StateError::InvariantViolation("seat pointer out of range"));
        }
        if self.street.is_betting() && self.seats.iter().any(|s| s.bet > self.current_bet) {
            return Err(StateError::InvariantViolation("seat bet exceeds current bet"));
        }
        let mut seen = std::collections::HashSet::new();
        for seat in self.seats.iter().filter(|s| s.is_occupied()) {
            if !seen.insert(seat.player_id.as_str()) {
                return Err(StateError::InvariantViolation("player seated twice"));
            }
        }
        Ok(())
    }
}
