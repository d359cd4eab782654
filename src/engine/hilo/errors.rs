use super::types::{Chips, SeatIndex, Street};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("no betting is allowed during {0}")]
    IllegalStreet(Street),
    #[error("declarations are only accepted during the declare street, not {0}")]
    NotDeclareStreet(Street),
    #[error("it is not this player's turn")]
    TurnOrder,
    #[error("player has no seat in this hand")]
    NotSeated,
    #[error("seat {0} is inactive or folded")]
    InactiveSeat(SeatIndex),
    #[error("cannot check while facing a bet")]
    CannotCheck,
    #[error("nothing to call")]
    NothingToCall,
    #[error("raise amount must be positive")]
    InvalidRaiseAmount,
    #[error("raise must exceed the current bet of {current_bet}")]
    RaiseNotAboveCurrentBet { current_bet: Chips },
    #[error("raise of {raise_amount} is below the minimum raise of {min_raise}")]
    RaiseBelowMinimum { raise_amount: Chips, min_raise: Chips },
    #[error("raise of {raise_amount} exceeds remaining stack of {stack}")]
    InsufficientChips { raise_amount: Chips, stack: Chips },
    #[error("seat {0} has already declared")]
    AlreadyDeclared(SeatIndex),
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    #[error("invalid payload for {action}: {reason}")]
    InvalidPayload { action: String, reason: String },
}

impl ActionError {
    /// Errors caused by acting out of turn or on the wrong street rather than a malformed move.
    pub fn is_sequencing(&self) -> bool {
        matches!(
            self,
            ActionError::IllegalStreet(_)
                | ActionError::NotDeclareStreet(_)
                | ActionError::TurnOrder
                | ActionError::InactiveSeat(_)
                | ActionError::AlreadyDeclared(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DealError {
    #[error("cannot deal {requested} cards from a deck of {remaining}")]
    InsufficientCards { requested: usize, remaining: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("invariant violated: {0}")]
    InvariantViolation(&'static str),
}

pub trait InvariantCheck {
    fn validate_invariants(&self) -> Result<(), StateError>;
}
