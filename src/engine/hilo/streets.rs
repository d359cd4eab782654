//! Pure street transitions. The inter-round queue drain is driven by the coordinator,
//! which owns the ledger and store handles it needs.

use rand::Rng;

use super::cards::{deal_capped, shuffled_deck};
use super::errors::{InvariantCheck, StateError};
use super::pots::collect_contributions;
use super::seating::Seating;
use super::showdown::{resolve_showdown, ShowdownOutcome};
use super::state::{GameState, Pot};
use super::types::*;

/// Minimum number of eligible seats needed to deal a hand.
pub const MIN_PLAYERS_TO_DEAL: usize = 4;

const FLOP_CARDS: usize = 2;
const TURN_CARDS: usize = 2;
const RIVER_CARDS: usize = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreetTransition {
    pub state: GameState,
    pub showdown: Option<ShowdownOutcome>,
}

impl StreetTransition {
    fn plain(state: GameState) -> Self {
        Self {
            state,
            showdown: None,
        }
    }
}

pub fn next_street(street: Street) -> Street {
    match street {
        Street::Interround => Street::Preflop,
        Street::Preflop => Street::Flop,
        Street::Flop => Street::Turn,
        Street::Turn => Street::River,
        Street::River => Street::Declare,
        Street::Declare => Street::Showdown,
        Street::Showdown => Street::Interround,
    }
}

/// Moves the hand one street forward. Entering Preflop may short-circuit back to
/// Interround when too few seats can play.
pub fn advance_street<R: Rng + ?Sized>(
    state: &GameState,
    rng: &mut R,
) -> Result<StreetTransition, StateError> {
    state.validate_invariants()?;
    let transition = match next_street(state.street) {
        Street::Preflop => StreetTransition::plain(enter_preflop(state, rng)),
        Street::Flop => StreetTransition::plain(enter_betting_street(state, Street::Flop, FLOP_CARDS)),
        Street::Turn => StreetTransition::plain(enter_betting_street(state, Street::Turn, TURN_CARDS)),
        Street::River => {
            StreetTransition::plain(enter_betting_street(state, Street::River, RIVER_CARDS))
        }
        Street::Declare => StreetTransition::plain(enter_declare(state)),
        Street::Showdown => {
            let (state, outcome) = enter_showdown(state);
            StreetTransition {
                state,
                showdown: Some(outcome),
            }
        }
        Street::Interround => StreetTransition::plain(enter_interround(state)),
    };
    Ok(transition)
}

pub fn enter_preflop<R: Rng + ?Sized>(state: &GameState, rng: &mut R) -> GameState {
    let mut next = state.clone();
    let config = next.config;

    next.hand_seq += 1;
    next.deck = shuffled_deck(rng);
    next.board_cards.clear();
    next.pots = vec![Pot::default()];
    next.current_bet = 0;
    next.min_raise = config.big_blind;

    for seat in next.seats.iter_mut() {
        seat.reset_for_hand();
        if seat.active && (seat.stack == 0 || seat.stack < config.ante) {
            seat.active = false;
        }
    }

    if let Some(button) = next.next_seat_where(next.button, |s| s.active && s.stack > 0) {
        next.button = button;
    }

    if next.active_seat_count() < MIN_PLAYERS_TO_DEAL {
        next.street = Street::Interround;
        next.deck.clear();
        next.pots.clear();
        return next;
    }
    next.street = Street::Preflop;

    {
        let GameState {
            seats, pots, deck, ..
        } = &mut next;
        let pot = &mut pots[0];
        for seat in seats.iter_mut().filter(|s| s.active) {
            let ante = config.ante.min(seat.stack);
            if ante > 0 {
                seat.stack -= ante;
                pot.amount += ante;
                pot.add_eligible(seat.seat);
            }
            seat.hole_cards = deal_capped(deck, HOLE_CARD_COUNT);
        }
    }

    let small_blind_seat = next.next_live_seat(next.button);
    let big_blind_seat = small_blind_seat
        .and_then(|sb| next.next_live_seat(sb))
        .filter(|bb| Some(*bb) != small_blind_seat);
    if let Some(seat) = small_blind_seat {
        post_blind(&mut next, seat, config.small_blind);
    }
    if let Some(seat) = big_blind_seat {
        post_blind(&mut next, seat, config.big_blind);
    }
    next.current_bet = config.big_blind;

    let anchor = big_blind_seat.or(small_blind_seat).unwrap_or(next.button);
    next.current_player_seat = next.next_live_seat(anchor).unwrap_or(anchor);
    next
}

fn post_blind(state: &mut GameState, seat: SeatIndex, amount: Chips) {
    let seat = state.seat_mut(seat);
    let posted = amount.min(seat.stack);
    seat.stack -= posted;
    seat.bet += posted;
}

pub fn enter_betting_street(state: &GameState, street: Street, board_cards: usize) -> GameState {
    let mut next = state.clone();
    collect_contributions(&mut next);

    let dealt = deal_capped(&mut next.deck, board_cards);
    next.board_cards.extend(dealt);
    force_discards(&mut next);
    reset_round(&mut next);

    if let Some(first) = next.first_to_act_after_button() {
        next.current_player_seat = first;
    }
    next.street = street;
    next
}

/// Hole cards sharing a rank with any board card are discarded.
pub fn force_discards(state: &mut GameState) {
    let GameState {
        seats, board_cards, ..
    } = state;
    for seat in seats.iter_mut().filter(|s| s.is_contending()) {
        seat.hole_cards
            .retain(|card| !board_cards.iter().any(|board| board.rank == card.rank));
    }
}

fn reset_round(state: &mut GameState) {
    for seat in state.seats.iter_mut() {
        seat.acted = false;
    }
    state.current_bet = 0;
    state.min_raise = state.config.big_blind;
}

pub fn enter_declare(state: &GameState) -> GameState {
    let mut next = state.clone();
    collect_contributions(&mut next);
    reset_round(&mut next);
    next.street = Street::Declare;
    next
}

pub fn enter_showdown(state: &GameState) -> (GameState, ShowdownOutcome) {
    let mut next = state.clone();
    collect_contributions(&mut next);
    next.street = Street::Showdown;
    let outcome = resolve_showdown(&mut next);
    (next, outcome)
}

pub fn enter_interround(state: &GameState) -> GameState {
    let mut next = state.clone();
    next.street = Street::Interround;
    next.current_bet = 0;
    next
}
