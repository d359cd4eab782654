//! Structural table changes applied between hands: seating, cash-outs,
//! config merges, and the start/end lifecycle.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::domain::{GameTable, InterRoundAction, InterRoundKind, TableStatus};
use crate::engine::hilo::{Chips, ConfigPatch, GameState, SeatIndex};
use crate::lobby::validation::validate_config;
use crate::store::{StoreError, TableStore, UserLedger};

use super::alerts::{AlertSink, EngineAlert};
use super::error::GameError;

const LOG_TARGET: &str = "game::interround";

/// Fewest active seats a table can be started with.
pub const MIN_PLAYERS_TO_START: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum InterRoundError {
    #[error("buy-in must be greater than zero")]
    InvalidBuyIn,
    #[error("player is already seated")]
    AlreadySeated,
    #[error("no empty seat available")]
    TableFull,
    #[error("player has no seat at this table")]
    NotSeated,
    #[error("seat {0} is already sitting out")]
    AlreadyStanding(SeatIndex),
    #[error("seat {0} is already active")]
    AlreadySitting(SeatIndex),
    #[error("stack of {stack} does not cover the ante of {ante}")]
    InsufficientStack { stack: Chips, ante: Chips },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("table is {0:?}, expected waiting")]
    TableNotWaiting(TableStatus),
    #[error("{active} active seats, at least {required} required")]
    NotEnoughPlayers { active: usize, required: usize },
    #[error("ledger: {0}")]
    Ledger(#[from] StoreError),
}

impl From<InterRoundError> for GameError {
    fn from(err: InterRoundError) -> Self {
        match err {
            InterRoundError::Ledger(store) => GameError::from(store),
            err @ (InterRoundError::InvalidBuyIn | InterRoundError::InvalidConfig(_)) => {
                GameError::BadRequest(err.to_string())
            }
            other => GameError::Conflict(other.to_string()),
        }
    }
}

/// Applies one inter-round action to a loaded state snapshot. Ledger and table
/// side effects happen here; persisting the returned state is the caller's job.
pub struct InterRoundProcessor {
    tables: Arc<dyn TableStore>,
    users: Arc<dyn UserLedger>,
    alerts: Arc<AlertSink>,
}

impl InterRoundProcessor {
    pub fn new(
        tables: Arc<dyn TableStore>,
        users: Arc<dyn UserLedger>,
        alerts: Arc<AlertSink>,
    ) -> Self {
        Self {
            tables,
            users,
            alerts,
        }
    }

    pub async fn apply(
        &self,
        state: &GameState,
        table: &GameTable,
        action: &InterRoundAction,
    ) -> Result<GameState, InterRoundError> {
        let user_id = action.user_id.as_str();
        match &action.kind {
            InterRoundKind::Join { buy_in } => self.join(state, user_id, *buy_in).await,
            InterRoundKind::Leave => self.leave(state, user_id).await,
            InterRoundKind::StandUp => stand_up(state, user_id),
            InterRoundKind::SitDown => sit_down(state, user_id),
            InterRoundKind::ConfigUpdate { patch } => merge_config(state, patch),
            InterRoundKind::Start => self.start(state, table).await,
            InterRoundKind::End => Ok(self.end(state).await),
        }
    }

    async fn join(
        &self,
        state: &GameState,
        user_id: &str,
        buy_in: Chips,
    ) -> Result<GameState, InterRoundError> {
        if buy_in == 0 {
            return Err(InterRoundError::InvalidBuyIn);
        }
        if state.seat_of(user_id).is_some() {
            return Err(InterRoundError::AlreadySeated);
        }
        let seat_index = state
            .seats
            .iter()
            .find(|s| !s.is_occupied())
            .map(|s| s.seat)
            .ok_or(InterRoundError::TableFull)?;
        let debit = i64::try_from(buy_in).map_err(|_| InterRoundError::InvalidBuyIn)?;

        // the seat is only touched once the debit has landed
        let balance = self.users.apply_balance_delta(user_id, -debit).await?;

        let mut next = state.clone();
        let seat = next.seat_mut(seat_index);
        seat.vacate();
        seat.player_id = user_id.to_owned();
        seat.stack = buy_in;
        seat.active = true;
        info!(
            target = LOG_TARGET,
            table_id = %state.table_id,
            user_id,
            seat = seat_index,
            buy_in,
            balance,
            "player joined"
        );
        Ok(next)
    }

    async fn leave(&self, state: &GameState, user_id: &str) -> Result<GameState, InterRoundError> {
        let seat = state.seat_of(user_id).ok_or(InterRoundError::NotSeated)?;
        let (seat_index, stack) = (seat.seat, seat.stack);

        self.cash_out(&state.table_id, user_id, stack).await;

        let mut next = state.clone();
        next.seat_mut(seat_index).vacate();
        info!(
            target = LOG_TARGET,
            table_id = %state.table_id,
            user_id,
            seat = seat_index,
            stack,
            "player left"
        );
        Ok(next)
    }

    async fn start(
        &self,
        state: &GameState,
        table: &GameTable,
    ) -> Result<GameState, InterRoundError> {
        if table.status != TableStatus::Waiting {
            return Err(InterRoundError::TableNotWaiting(table.status));
        }
        let active = state.active_seat_count();
        if active < MIN_PLAYERS_TO_START {
            return Err(InterRoundError::NotEnoughPlayers {
                active,
                required: MIN_PLAYERS_TO_START,
            });
        }
        self.tables
            .set_table_status(&table.table_id, TableStatus::Running)
            .await?;
        info!(target = LOG_TARGET, table_id = %table.table_id, active, "table started");
        Ok(state.clone())
    }

    /// Cashes out every occupied seat independently and clears it.
    async fn end(&self, state: &GameState) -> GameState {
        let payouts = state
            .seats
            .iter()
            .filter(|s| s.is_occupied())
            .map(|s| self.cash_out(&state.table_id, &s.player_id, s.stack));
        join_all(payouts).await;

        let mut next = state.clone();
        for seat in next.seats.iter_mut() {
            seat.vacate();
        }
        info!(target = LOG_TARGET, table_id = %state.table_id, "table cashed out");
        next
    }

    /// Credits `amount` back to the user. Failures are reported, never returned:
    /// a seat is cleared whether or not the credit lands.
    async fn cash_out(&self, table_id: &str, user_id: &str, amount: Chips) {
        if amount == 0 {
            return;
        }
        let credited = match i64::try_from(amount) {
            Ok(delta) => self
                .users
                .apply_balance_delta(user_id, delta)
                .await
                .map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };
        if let Err(reason) = credited {
            warn!(
                target = LOG_TARGET,
                table_id,
                user_id,
                amount,
                %reason,
                "ledger credit failed; clearing seat anyway"
            );
            self.alerts.raise(EngineAlert::LedgerCreditFailed {
                table_id: table_id.to_owned(),
                user_id: user_id.to_owned(),
                amount,
                reason,
            });
        }
    }
}

fn stand_up(state: &GameState, user_id: &str) -> Result<GameState, InterRoundError> {
    let seat = state.seat_of(user_id).ok_or(InterRoundError::NotSeated)?;
    if !seat.active {
        return Err(InterRoundError::AlreadyStanding(seat.seat));
    }
    let seat_index = seat.seat;
    let mut next = state.clone();
    next.seat_mut(seat_index).active = false;
    Ok(next)
}

fn sit_down(state: &GameState, user_id: &str) -> Result<GameState, InterRoundError> {
    let seat = state.seat_of(user_id).ok_or(InterRoundError::NotSeated)?;
    if seat.active {
        return Err(InterRoundError::AlreadySitting(seat.seat));
    }
    let ante = state.config.ante;
    if seat.stack == 0 || seat.stack < ante {
        return Err(InterRoundError::InsufficientStack {
            stack: seat.stack,
            ante,
        });
    }
    let seat_index = seat.seat;
    let mut next = state.clone();
    next.seat_mut(seat_index).active = true;
    Ok(next)
}

fn merge_config(state: &GameState, patch: &ConfigPatch) -> Result<GameState, InterRoundError> {
    let merged = patch.merged_into(state.config);
    validate_config(&merged).map_err(|err| InterRoundError::InvalidConfig(err.to_string()))?;
    let mut next = state.clone();
    next.config = merged;
    Ok(next)
}
