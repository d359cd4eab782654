use super::actions::PlayerAction;
use super::seating::Seating;
use super::state::GameState;
use super::types::*;

/// Derives the next state from a validated action. The input is never mutated.
pub fn apply_action(state: &GameState, player_id: &str, action: &PlayerAction) -> GameState {
    let mut next = state.clone();

    if let PlayerAction::Declare { declaration } = *action {
        if let Some(seat) = next.seat_of_mut(player_id) {
            seat.declaration = Some(declaration);
            seat.acted = true;
        }
        return next;
    }

    let actor = next.current_player_seat;
    match *action {
        PlayerAction::Check => next.seat_mut(actor).acted = true,
        PlayerAction::Call => {
            let current_bet = next.current_bet;
            let seat = next.seat_mut(actor);
            let amount = current_bet.saturating_sub(seat.bet).min(seat.stack);
            seat.stack -= amount;
            seat.bet += amount;
            seat.acted = true;
        }
        PlayerAction::Raise { raise_amount } => {
            let previous_bet = next.current_bet;
            let seat = next.seat_mut(actor);
            let amount = raise_amount.min(seat.stack);
            seat.stack -= amount;
            seat.bet += amount;
            seat.acted = true;
            let total_bet = seat.bet;
            let raiser_has_chips = seat.stack > 0;

            next.current_bet = total_bet;
            if raiser_has_chips {
                next.min_raise = total_bet + total_bet.saturating_sub(previous_bet);
            }
            // re-open action for everyone who can still respond
            for other in next.seats.iter_mut() {
                if other.seat != actor && other.can_act() {
                    other.acted = false;
                }
            }
        }
        PlayerAction::Fold => next.seat_mut(actor).muck(),
        PlayerAction::Declare { .. } => {}
    }

    if let Some(seat) = next.next_live_seat(actor) {
        next.current_player_seat = seat;
    }
    next
}

/// Whether the current betting round needs no further input.
pub fn is_action_closed(state: &GameState) -> bool {
    if !state.street.is_betting() {
        return true;
    }
    let relevant: Vec<_> = state.seats.iter().filter(|s| s.can_act()).collect();
    match relevant.as_slice() {
        [] => true,
        // a lone live seat still gets to answer a bet made by an all-in seat
        [only] => only.acted || only.bet >= state.current_bet,
        seats => seats
            .iter()
            .all(|s| s.acted && s.bet == state.current_bet),
    }
}

pub fn declarations_complete(state: &GameState) -> bool {
    let contenders: Vec<_> = state.contenders().collect();
    contenders.len() <= 1 || contenders.iter().all(|s| s.declaration.is_some())
}

/// Closure test for whichever round the street represents.
pub fn round_closed(state: &GameState) -> bool {
    match state.street {
        Street::Declare => declarations_complete(state),
        _ => is_action_closed(state),
    }
}

/// True when the machine is parked waiting for a player (or a timer) to act.
pub fn awaiting_input(state: &GameState) -> bool {
    state.street.awaits_players() && !round_closed(state)
}
