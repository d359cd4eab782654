use super::actions::PlayerAction;
use super::errors::ActionError;
use super::state::GameState;

/// Checks a requested move against street, turn order, and the seat's chips.
pub fn validate_action(
    state: &GameState,
    player_id: &str,
    action: &PlayerAction,
) -> Result<(), ActionError> {
    if matches!(action, PlayerAction::Declare { .. }) {
        return validate_declaration(state, player_id);
    }
    if !state.street.is_betting() {
        return Err(ActionError::IllegalStreet(state.street));
    }

    let seat = state.current_seat();
    if player_id.is_empty() || seat.player_id != player_id {
        return Err(ActionError::TurnOrder);
    }
    if !seat.is_contending() {
        return Err(ActionError::InactiveSeat(seat.seat));
    }

    match *action {
        PlayerAction::Check => {
            if seat.bet != state.current_bet {
                return Err(ActionError::CannotCheck);
            }
        }
        PlayerAction::Call => {
            if seat.bet == state.current_bet {
                return Err(ActionError::NothingToCall);
            }
        }
        PlayerAction::Raise { raise_amount } => {
            if raise_amount == 0 {
                return Err(ActionError::InvalidRaiseAmount);
            }
            if seat.bet.saturating_add(raise_amount) <= state.current_bet {
                return Err(ActionError::RaiseNotAboveCurrentBet {
                    current_bet: state.current_bet,
                });
            }
            // short all-in raises are exempt from the minimum
            if raise_amount < state.min_raise && raise_amount < seat.stack {
                return Err(ActionError::RaiseBelowMinimum {
                    raise_amount,
                    min_raise: state.min_raise,
                });
            }
            if raise_amount > seat.stack {
                return Err(ActionError::InsufficientChips {
                    raise_amount,
                    stack: seat.stack,
                });
            }
        }
        PlayerAction::Fold => {}
        PlayerAction::Declare { .. } => unreachable!("declarations are validated above"),
    }
    Ok(())
}

/// Declarations are simultaneous: any contending seat may declare once, in any order.
pub fn validate_declaration(state: &GameState, player_id: &str) -> Result<(), ActionError> {
    if state.street != super::types::Street::Declare {
        return Err(ActionError::NotDeclareStreet(state.street));
    }
    let seat = state.seat_of(player_id).ok_or(ActionError::NotSeated)?;
    if !seat.is_contending() {
        return Err(ActionError::InactiveSeat(seat.seat));
    }
    if seat.declaration.is_some() {
        return Err(ActionError::AlreadyDeclared(seat.seat));
    }
    Ok(())
}
