//! Per-request orchestration: validate, apply, persist under `game_seq`,
//! audit, broadcast, and drive the street machine forward.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{
    ActionLogEntry, ActionSeq, Connection, HandSnapshot, InterRoundAction, InterRoundKind,
    TableId, TableStatus,
};
use crate::engine::hilo::{
    advance_street, apply_action, awaiting_input, default_declaration, round_closed,
    validate_action, GameState, PlayerAction, ShowdownOutcome, Street,
};
use crate::store::{require, Stores};
use crate::tokio_tools::spawn_named_task;

use super::alerts::{AlertSink, EngineAlert};
use super::broadcast::{Broadcaster, StateView};
use super::error::GameError;
use super::interround::InterRoundProcessor;
use super::realtime::PushTransport;
use super::timer::{TimerFired, TurnTimer};

const LOG_TARGET: &str = "game::coordinator";
const ADVANCE_RETRY_DELAY: Duration = Duration::from_millis(50);
const MAX_ADVANCE_ATTEMPTS: u32 = 5;

#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// Fixed seed for reproducible shuffles.
    pub rng_seed: Option<u64>,
    /// Turn/declaration timeout; `None` disables timers.
    pub turn_timeout: Option<Duration>,
    pub alert_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            rng_seed: None,
            turn_timeout: None,
            alert_capacity: 256,
        }
    }
}

/// Whether the street machine caught up with a durable write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Advance {
    #[default]
    Settled,
    /// The write stands but moving the machine on failed; a background retry
    /// picks it up.
    Deferred,
}

/// Outcome of an accepted player action, as seen after any street advance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionReceipt {
    pub game_seq: u64,
    pub street: Street,
    pub advance: Advance,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InterRoundDisposition {
    /// Applied in-band because the table sat at Interround with an empty queue.
    Applied { game_seq: u64, advance: Advance },
    /// Reserved a queue slot; applied at the next Interround drain.
    Queued { action_seq: ActionSeq },
}

pub struct GameCoordinator {
    stores: Stores,
    processor: InterRoundProcessor,
    broadcaster: Broadcaster,
    alerts: Arc<AlertSink>,
    rng: Mutex<StdRng>,
    timer: Option<TurnTimer>,
    retries: mpsc::UnboundedSender<AdvanceRetry>,
    stop: CancellationToken,
}

#[derive(Debug)]
struct AdvanceRetry {
    table_id: TableId,
    attempt: u32,
}

impl GameCoordinator {
    /// Builds the coordinator, the task that retries deferred street advances
    /// and, when a turn timeout is configured, the task that turns timer
    /// expiries into default actions.
    pub fn spawn(
        stores: Stores,
        transport: Arc<dyn PushTransport>,
        config: CoordinatorConfig,
    ) -> Arc<Self> {
        let stop = CancellationToken::new();
        let (timer, fired) = match config.turn_timeout {
            Some(timeout) => {
                let (timer, fired) = TurnTimer::new(timeout, stop.clone());
                (Some(timer), Some(fired))
            }
            None => (None, None),
        };

        let (retries, retry_rx) = mpsc::unbounded_channel();
        let alerts = Arc::new(AlertSink::new(config.alert_capacity));
        let rng = config
            .rng_seed
            .map(StdRng::seed_from_u64)
            .unwrap_or_else(StdRng::from_entropy);
        let coordinator = Arc::new(Self {
            processor: InterRoundProcessor::new(
                Arc::clone(&stores.tables),
                Arc::clone(&stores.users),
                Arc::clone(&alerts),
            ),
            broadcaster: Broadcaster::new(
                Arc::clone(&stores.connections),
                transport,
                Arc::clone(&alerts),
            ),
            stores,
            alerts,
            rng: Mutex::new(rng),
            timer,
            retries,
            stop: stop.clone(),
        });

        spawn_named_task(
            "advance-retry-loop",
            run_retry_loop(Arc::downgrade(&coordinator), retry_rx, stop.clone()),
        );

        if let Some(fired) = fired {
            spawn_named_task(
                "turn-timer-loop",
                run_timer_loop(Arc::downgrade(&coordinator), fired, stop),
            );
        }
        coordinator
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn alerts(&self) -> &Arc<AlertSink> {
        &self.alerts
    }

    pub fn shutdown(&self) {
        self.stop.cancel();
    }

    pub async fn load_state(&self, table_id: &str) -> Result<GameState, GameError> {
        Ok(require(
            self.stores.states.load_state(table_id).await?,
            "game state",
        )?)
    }

    pub async fn view_state(
        &self,
        table_id: &str,
        viewer: Option<&str>,
    ) -> Result<StateView, GameError> {
        let state = self.load_state(table_id).await?;
        Ok(StateView::for_viewer(&state, viewer))
    }

    pub async fn process_player_action(
        &self,
        table_id: &str,
        player_id: &str,
        action: PlayerAction,
    ) -> Result<ActionReceipt, GameError> {
        let state = self.load_state(table_id).await?;
        validate_action(&state, player_id, &action)?;
        let next = apply_action(&state, player_id, &action);
        self.commit(&state, next, Some((player_id, action))).await
    }

    /// Seat, leave, config, start, and end requests. Applied immediately when
    /// the table is between hands with nothing queued, otherwise queued.
    pub async fn process_inter_round_request(
        &self,
        table_id: &str,
        user_id: &str,
        kind: InterRoundKind,
    ) -> Result<InterRoundDisposition, GameError> {
        let table = require(self.stores.tables.load_table(table_id).await?, "table")?;
        let state = self.load_state(table_id).await?;
        let mut action = InterRoundAction {
            table_id: table_id.to_owned(),
            action_seq: 0,
            user_id: user_id.to_owned(),
            kind,
            created_at: Utc::now(),
        };

        let queue_empty = self.stores.queue.load_pending(table_id).await?.is_empty();
        if state.street == Street::Interround && queue_empty {
            let next = self.processor.apply(&state, &table, &action).await?;
            let next = self.persist(next, state.game_seq).await?;
            debug!(
                target = LOG_TARGET,
                table_id,
                user_id,
                action = action.kind.name(),
                game_seq = next.game_seq,
                "inter-round action applied in-band"
            );
            self.broadcaster.broadcast_state(&next).await;
            let (latest, advance) = match self.kick(next.clone()).await {
                Ok(latest) => (latest, Advance::Settled),
                Err(err) => (next, self.defer_advance(table_id, &err)),
            };
            return Ok(InterRoundDisposition::Applied {
                game_seq: latest.game_seq,
                advance,
            });
        }

        let action_seq = self
            .stores
            .tables
            .reserve_action_seq(table_id, table.inter_round_action_seq)
            .await?;
        action.action_seq = action_seq;
        self.stores.queue.enqueue(&action).await?;
        info!(
            target = LOG_TARGET,
            table_id,
            user_id,
            action = action.kind.name(),
            action_seq,
            "inter-round action queued"
        );

        // the machine may have parked at Interround since this request read
        // the state, in which case no drain is coming for the new slot
        if let Err(err) = self.resume(table_id).await {
            self.defer_advance(table_id, &err);
        }
        Ok(InterRoundDisposition::Queued { action_seq })
    }

    /// Drains and restarts the machine for a table parked at Interround.
    pub async fn resume(&self, table_id: &str) -> Result<GameState, GameError> {
        let state = self.load_state(table_id).await?;
        self.kick(state).await
    }

    /// Queued actions are drained whatever the table status; dealing still
    /// requires a running table.
    async fn kick(&self, state: GameState) -> Result<GameState, GameError> {
        if state.street != Street::Interround {
            return Ok(state);
        }
        self.advance_game_state(&state.table_id).await
    }

    fn defer_advance(&self, table_id: &str, err: &GameError) -> Advance {
        warn!(
            target = LOG_TARGET,
            table_id,
            error = %err,
            "street advance failed after a durable write; retrying in background"
        );
        self.schedule_retry(table_id, 1);
        Advance::Deferred
    }

    fn schedule_retry(&self, table_id: &str, attempt: u32) {
        let retry = AdvanceRetry {
            table_id: table_id.to_owned(),
            attempt,
        };
        if self.retries.send(retry).is_err() {
            debug!(target = LOG_TARGET, table_id, "retry loop stopped; advance dropped");
        }
    }

    async fn retry_advance(&self, retry: AdvanceRetry) {
        let table_id = retry.table_id.as_str();
        match self.advance_game_state(table_id).await {
            Ok(state) => info!(
                target = LOG_TARGET,
                table_id,
                attempt = retry.attempt,
                game_seq = state.game_seq,
                street = %state.street,
                "deferred advance completed"
            ),
            Err(err) if retry.attempt < MAX_ADVANCE_ATTEMPTS => {
                debug!(
                    target = LOG_TARGET,
                    table_id,
                    attempt = retry.attempt,
                    error = %err,
                    "deferred advance failed again"
                );
                self.schedule_retry(table_id, retry.attempt + 1);
            }
            Err(err) => self.alerts.raise(EngineAlert::AdvanceStalled {
                table_id: retry.table_id.clone(),
                attempts: retry.attempt,
                reason: err.to_string(),
            }),
        }
    }

    /// Runs the street machine from the persisted state until it needs player
    /// input or halts at Interround. Every step is its own conditional write.
    pub async fn advance_game_state(&self, table_id: &str) -> Result<GameState, GameError> {
        let mut state = self.load_state(table_id).await?;
        loop {
            if state.street == Street::Interround {
                state = self.drain_inter_round(state).await?;
                let table = require(self.stores.tables.load_table(table_id).await?, "table")?;
                if table.status != TableStatus::Running {
                    debug!(
                        target = LOG_TARGET,
                        table_id,
                        status = table.status.as_str(),
                        "table not running; halting at interround"
                    );
                    return Ok(state);
                }
            } else if awaiting_input(&state) {
                return Ok(state);
            }

            let transition = {
                let mut rng = self.rng.lock();
                advance_street(&state, &mut *rng)?
            };
            let from = state.street;
            let expected = state.game_seq;
            state = self.persist(transition.state, expected).await?;
            info!(
                target = LOG_TARGET,
                table_id,
                hand_seq = state.hand_seq,
                game_seq = state.game_seq,
                %from,
                to = %state.street,
                "street advanced"
            );
            if let Some(outcome) = transition.showdown {
                self.record_showdown(&state, outcome).await;
            }
            self.broadcaster.broadcast_state(&state).await;

            if from == Street::Interround && state.street == Street::Interround {
                info!(
                    target = LOG_TARGET,
                    table_id,
                    active = state.active_seat_count(),
                    "not enough players to deal"
                );
                return Ok(state);
            }
        }
    }

    /// Applies every queued action in slot order. Slots at or below the
    /// state's watermark were already attempted and are only deleted.
    pub async fn drain_inter_round(&self, state: GameState) -> Result<GameState, GameError> {
        let table_id = state.table_id.clone();
        let pending = self.stores.queue.load_pending(&table_id).await?;
        let drained = !pending.is_empty();
        let mut state = state;

        for action in pending {
            if action.action_seq > state.applied_action_seq {
                let table = require(self.stores.tables.load_table(&table_id).await?, "table")?;
                let mut next = match self.processor.apply(&state, &table, &action).await {
                    Ok(next) => next,
                    Err(err) => {
                        self.alerts.raise(EngineAlert::QueueActionFailed {
                            table_id: table_id.clone(),
                            action_seq: action.action_seq,
                            action: action.kind.name(),
                            reason: err.to_string(),
                        });
                        state.clone()
                    }
                };
                next.applied_action_seq = action.action_seq;
                let expected = state.game_seq;
                state = self.persist(next, expected).await?;
            } else {
                debug!(
                    target = LOG_TARGET,
                    table_id = %table_id,
                    action_seq = action.action_seq,
                    "skipping already applied queue slot"
                );
            }

            if let Err(err) = self
                .stores
                .queue
                .remove_action(&table_id, action.action_seq)
                .await
            {
                warn!(
                    target = LOG_TARGET,
                    table_id = %table_id,
                    action_seq = action.action_seq,
                    error = %err,
                    "failed to pop queue slot"
                );
            }
        }

        if drained {
            self.broadcaster.broadcast_state(&state).await;
        }
        Ok(state)
    }

    /// Applies the default move for the input a table has been waiting on,
    /// provided `timer_seq` still identifies that wait.
    pub async fn expire_turn(
        &self,
        table_id: &str,
        timer_seq: u64,
    ) -> Result<Option<ActionReceipt>, GameError> {
        let state = self.load_state(table_id).await?;
        if state.timer_seq != timer_seq || !awaiting_input(&state) {
            debug!(target = LOG_TARGET, table_id, timer_seq, "stale timer ignored");
            return Ok(None);
        }

        if state.street == Street::Declare {
            let mut next = state.clone();
            for seat in state.contenders().filter(|s| s.declaration.is_none()) {
                let declaration = default_declaration(seat.hole_cards.len());
                next = apply_action(&next, &seat.player_id, &PlayerAction::Declare { declaration });
            }
            info!(target = LOG_TARGET, table_id, "declarations defaulted on timeout");
            return self.commit(&state, next, None).await.map(Some);
        }

        let player_id = state.current_seat().player_id.clone();
        let action = if validate_action(&state, &player_id, &PlayerAction::Check).is_ok() {
            PlayerAction::Check
        } else {
            PlayerAction::Fold
        };
        info!(
            target = LOG_TARGET,
            table_id,
            player_id = %player_id,
            action = action.kind(),
            "turn timed out"
        );
        let next = apply_action(&state, &player_id, &action);
        self.commit(&state, next, Some((player_id.as_str(), action)))
            .await
            .map(Some)
    }

    /// Registers a push connection under a caller-chosen id.
    pub async fn connect(
        &self,
        table_id: &str,
        user_id: &str,
        connection_id: &str,
    ) -> Result<Connection, GameError> {
        require(self.stores.tables.load_table(table_id).await?, "table")?;
        let connection = Connection {
            table_id: table_id.to_owned(),
            connection_id: connection_id.to_owned(),
            user_id: user_id.to_owned(),
            connected_at: Utc::now(),
        };
        self.stores.connections.register(&connection).await?;
        info!(target = LOG_TARGET, table_id, user_id, connection_id, "connection registered");
        Ok(connection)
    }

    pub async fn resync(&self, connection: &Connection) -> Result<(), GameError> {
        let state = self.load_state(&connection.table_id).await?;
        self.broadcaster.send_state(connection, &state).await;
        Ok(())
    }

    pub async fn disconnect(&self, connection: &Connection) {
        if let Err(err) = self
            .stores
            .connections
            .remove_connection(&connection.table_id, &connection.connection_id)
            .await
        {
            warn!(
                target = LOG_TARGET,
                connection_id = %connection.connection_id,
                error = %err,
                "failed to remove connection"
            );
        }
    }

    /// Persists a derived state, audits and broadcasts it, and advances the
    /// machine when the round it belongs to is closed.
    async fn commit(
        &self,
        state: &GameState,
        next: GameState,
        logged: Option<(&str, PlayerAction)>,
    ) -> Result<ActionReceipt, GameError> {
        let next = self.persist(next, state.game_seq).await?;
        if let Some((player_id, action)) = logged {
            debug!(
                target = LOG_TARGET,
                table_id = %next.table_id,
                player_id,
                action = action.kind(),
                game_seq = next.game_seq,
                "player action applied"
            );
            self.record_action(&next, player_id, &action).await;
            self.broadcaster
                .broadcast_action(&next, player_id, &action)
                .await;
        }

        let (latest, advance) = if round_closed(&next) {
            match self.advance_game_state(&next.table_id).await {
                Ok(latest) => (latest, Advance::Settled),
                Err(err) => {
                    let advance = self.defer_advance(&next.table_id, &err);
                    (next, advance)
                }
            }
        } else {
            self.broadcaster.broadcast_state(&next).await;
            (next, Advance::Settled)
        };
        Ok(ActionReceipt {
            game_seq: latest.game_seq,
            street: latest.street,
            advance,
        })
    }

    async fn persist(&self, mut next: GameState, expected: u64) -> Result<GameState, GameError> {
        let waiting = awaiting_input(&next);
        if waiting {
            next.timer_seq += 1;
        }
        next.game_seq = self.stores.states.put_state(&next, expected).await?;
        if waiting {
            if let Some(timer) = &self.timer {
                timer.arm(&next.table_id, next.timer_seq);
            }
        }
        Ok(next)
    }

    async fn record_action(&self, state: &GameState, player_id: &str, action: &PlayerAction) {
        let entry = ActionLogEntry {
            hand_id: state.hand_id(),
            action_id: state.game_seq,
            player_id: player_id.to_owned(),
            action: action.kind().to_owned(),
            payload: action.payload(),
            timestamp: Utc::now(),
        };
        if let Err(err) = self.stores.action_log.append(&entry).await {
            warn!(
                target = LOG_TARGET,
                hand_id = %entry.hand_id,
                action_id = entry.action_id,
                error = %err,
                "failed to append action log"
            );
        }
    }

    async fn record_showdown(&self, state: &GameState, outcome: ShowdownOutcome) {
        for pot in outcome.unawarded.iter().filter(|p| p.amount > 0) {
            self.alerts.raise(EngineAlert::PotUnawarded {
                table_id: state.table_id.clone(),
                hand_seq: state.hand_seq,
                amount: pot.amount,
            });
        }
        let snapshot = HandSnapshot {
            table_id: state.table_id.clone(),
            hand_seq: state.hand_seq,
            game_state: state.clone(),
            showdown: outcome,
            archived_at: Utc::now(),
        };
        match self.stores.archive.archive(&snapshot).await {
            Ok(()) => info!(
                target = LOG_TARGET,
                table_id = %state.table_id,
                hand_seq = state.hand_seq,
                "hand archived"
            ),
            Err(err) => warn!(
                target = LOG_TARGET,
                table_id = %state.table_id,
                hand_seq = state.hand_seq,
                error = %err,
                "failed to archive hand"
            ),
        }
    }
}

async fn run_timer_loop(
    coordinator: Weak<GameCoordinator>,
    mut fired: mpsc::UnboundedReceiver<TimerFired>,
    stop: CancellationToken,
) {
    loop {
        let notice = tokio::select! {
            _ = stop.cancelled() => break,
            notice = fired.recv() => notice,
        };
        let Some(notice) = notice else { break };
        let Some(coordinator) = coordinator.upgrade() else {
            break;
        };
        if let Err(err) = coordinator
            .expire_turn(&notice.table_id, notice.timer_seq)
            .await
        {
            warn!(
                target = LOG_TARGET,
                table_id = %notice.table_id,
                timer_seq = notice.timer_seq,
                error = %err,
                "timed default action failed"
            );
        }
    }
    debug!(target = LOG_TARGET, "turn timer loop stopped");
}

async fn run_retry_loop(
    coordinator: Weak<GameCoordinator>,
    mut retries: mpsc::UnboundedReceiver<AdvanceRetry>,
    stop: CancellationToken,
) {
    loop {
        let retry = tokio::select! {
            _ = stop.cancelled() => break,
            retry = retries.recv() => retry,
        };
        let Some(retry) = retry else { break };
        let coordinator = coordinator.clone();
        let stop = stop.clone();
        let delay = ADVANCE_RETRY_DELAY * retry.attempt;
        spawn_named_task(
            format!("advance-retry-{}-{}", retry.table_id, retry.attempt),
            async move {
                tokio::select! {
                    _ = stop.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                if let Some(coordinator) = coordinator.upgrade() {
                    coordinator.retry_advance(retry).await;
                }
            },
        );
    }
    debug!(target = LOG_TARGET, "advance retry loop stopped");
}
