//! Fan-out of table updates to registered connections. Every recipient gets
//! its own state view: other seats' hole cards are nulled and the deck never
//! leaves the server.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::Connection;
use crate::engine::hilo::{
    Card, Chips, Declaration, GameSeat, GameState, PlayerAction, Pot, SeatIndex, Street,
    TableConfig,
};
use crate::store::ConnectionStore;

use super::alerts::{AlertSink, EngineAlert};
use super::realtime::{PushError, PushTransport};

const LOG_TARGET: &str = "game::broadcast";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatView {
    pub seat: SeatIndex,
    pub player_id: String,
    pub stack: Chips,
    pub bet: Chips,
    pub hole_cards: Option<Vec<Card>>,
    pub folded: bool,
    pub acted: bool,
    pub active: bool,
    pub declaration: Option<Declaration>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateView {
    pub table_id: String,
    pub hand_seq: u64,
    pub config: TableConfig,
    pub seats: Vec<SeatView>,
    pub street: Street,
    pub board_cards: Vec<Card>,
    pub button: SeatIndex,
    pub pots: Vec<Pot>,
    pub current_player_seat: SeatIndex,
    pub current_bet: Chips,
    pub min_raise: Chips,
    pub timer_seq: u64,
    pub game_seq: u64,
}

impl StateView {
    /// Projection of `state` as seen by `viewer`; `None` sees no hole cards at all.
    pub fn for_viewer(state: &GameState, viewer: Option<&str>) -> Self {
        let seats = state
            .seats
            .iter()
            .map(|seat| SeatView::for_viewer(seat, viewer))
            .collect();
        Self {
            table_id: state.table_id.clone(),
            hand_seq: state.hand_seq,
            config: state.config,
            seats,
            street: state.street,
            board_cards: state.board_cards.clone(),
            button: state.button,
            pots: state.pots.clone(),
            current_player_seat: state.current_player_seat,
            current_bet: state.current_bet,
            min_raise: state.min_raise,
            timer_seq: state.timer_seq,
            game_seq: state.game_seq,
        }
    }
}

impl SeatView {
    fn for_viewer(seat: &GameSeat, viewer: Option<&str>) -> Self {
        let owns_seat = seat.is_occupied() && viewer == Some(seat.player_id.as_str());
        Self {
            seat: seat.seat,
            player_id: seat.player_id.clone(),
            stack: seat.stack,
            bet: seat.bet,
            hole_cards: owns_seat.then(|| seat.hole_cards.clone()),
            folded: seat.folded,
            acted: seat.acted,
            active: seat.active,
            declaration: seat.declaration,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    State {
        state: StateView,
    },
    Action {
        table_id: String,
        player_id: String,
        game_seq: u64,
        #[serde(flatten)]
        action: PlayerAction,
    },
}

pub struct Broadcaster {
    connections: Arc<dyn ConnectionStore>,
    transport: Arc<dyn PushTransport>,
    alerts: Arc<AlertSink>,
}

impl Broadcaster {
    pub fn new(
        connections: Arc<dyn ConnectionStore>,
        transport: Arc<dyn PushTransport>,
        alerts: Arc<AlertSink>,
    ) -> Self {
        Self {
            connections,
            transport,
            alerts,
        }
    }

    pub async fn broadcast_state(&self, state: &GameState) {
        for connection in self.recipients(&state.table_id).await {
            self.send_state(&connection, state).await;
        }
    }

    pub async fn broadcast_action(
        &self,
        state: &GameState,
        player_id: &str,
        action: &PlayerAction,
    ) {
        let message = PushMessage::Action {
            table_id: state.table_id.clone(),
            player_id: player_id.to_owned(),
            game_seq: state.game_seq,
            action: *action,
        };
        let payload = match serde_json::to_string(&message) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(target = LOG_TARGET, error = %err, "failed to encode action message");
                return;
            }
        };
        for connection in self.recipients(&state.table_id).await {
            self.deliver(&connection, &payload).await;
        }
    }

    /// Sends `connection` its own view of `state`.
    pub async fn send_state(&self, connection: &Connection, state: &GameState) {
        let message = PushMessage::State {
            state: StateView::for_viewer(state, Some(&connection.user_id)),
        };
        match serde_json::to_string(&message) {
            Ok(payload) => self.deliver(connection, &payload).await,
            Err(err) => {
                warn!(target = LOG_TARGET, error = %err, "failed to encode state message")
            }
        }
    }

    async fn recipients(&self, table_id: &str) -> Vec<Connection> {
        match self.connections.table_connections(table_id).await {
            Ok(connections) => connections,
            Err(err) => {
                warn!(target = LOG_TARGET, table_id, error = %err, "failed to list connections");
                Vec::new()
            }
        }
    }

    async fn deliver(&self, connection: &Connection, payload: &str) {
        match self
            .transport
            .push(&connection.connection_id, payload)
            .await
        {
            Ok(()) => {}
            Err(PushError::Gone) => {
                debug!(
                    target = LOG_TARGET,
                    table_id = %connection.table_id,
                    connection_id = %connection.connection_id,
                    "dropping stale connection"
                );
                if let Err(err) = self
                    .connections
                    .remove_connection(&connection.table_id, &connection.connection_id)
                    .await
                {
                    warn!(
                        target = LOG_TARGET,
                        connection_id = %connection.connection_id,
                        error = %err,
                        "failed to remove stale connection"
                    );
                }
            }
            Err(err) => self.alerts.raise(EngineAlert::PushFailed {
                table_id: connection.table_id.clone(),
                connection_id: connection.connection_id.clone(),
                reason: err.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::hilo::{Rank, Suit};
    use crate::store::InMemoryStore;
    use crate::test_utils::serde::assert_round_trip_json;
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(String, String)>>,
        gone: Vec<String>,
    }

    #[async_trait]
    impl PushTransport for RecordingTransport {
        async fn push(&self, connection_id: &str, message: &str) -> Result<(), PushError> {
            if self.gone.iter().any(|c| c == connection_id) {
                return Err(PushError::Gone);
            }
            self.sent
                .lock()
                .push((connection_id.to_owned(), message.to_owned()));
            Ok(())
        }
    }

    fn seated_state() -> GameState {
        let mut state = GameState::new("t1", TableConfig::default());
        for (idx, player) in ["alice", "bob"].into_iter().enumerate() {
            let seat = state.seat_mut(idx as SeatIndex);
            seat.player_id = player.into();
            seat.stack = 100;
            seat.active = true;
            seat.hole_cards = vec![Card::new(Rank::Ace, Suit::Spades)];
        }
        state.deck = vec![Card::new(Rank::King, Suit::Hearts)];
        state
    }

    fn connection(id: &str, user: &str) -> Connection {
        Connection {
            table_id: "t1".into(),
            connection_id: id.into(),
            user_id: user.into(),
            connected_at: Utc::now(),
        }
    }

    #[test]
    fn viewer_sees_only_own_hole_cards_and_no_deck() {
        let state = seated_state();
        let view = StateView::for_viewer(&state, Some("alice"));
        assert!(view.seats[0].hole_cards.is_some());
        assert_eq!(view.seats[1].hole_cards, None);
        assert_eq!(view.seats[2].hole_cards, None);

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("deck").is_none());
        assert!(json["seats"][1]["hole_cards"].is_null());

        let spectator = StateView::for_viewer(&state, None);
        assert!(spectator.seats.iter().all(|s| s.hole_cards.is_none()));
        assert_round_trip_json(&spectator);
    }

    #[tokio::test]
    async fn gone_connections_are_removed_and_others_filtered() -> anyhow::Result<()> {
        let store = Arc::new(InMemoryStore::new());
        store.register(&connection("c-alice", "alice")).await?;
        store.register(&connection("c-bob", "bob")).await?;
        store.register(&connection("c-stale", "carol")).await?;

        let transport = Arc::new(RecordingTransport {
            gone: vec!["c-stale".into()],
            ..Default::default()
        });
        let alerts = Arc::new(AlertSink::default());
        let broadcaster = Broadcaster::new(store.clone(), transport.clone(), alerts);

        broadcaster.broadcast_state(&seated_state()).await;

        let sent = transport.sent.lock().clone();
        assert_eq!(sent.len(), 2);
        for (connection_id, payload) in sent {
            let json: serde_json::Value = serde_json::from_str(&payload)?;
            assert_eq!(json["type"], "state");
            let own = if connection_id == "c-alice" { 0 } else { 1 };
            let other = 1 - own;
            assert!(json["state"]["seats"][own]["hole_cards"].is_array());
            assert!(json["state"]["seats"][other]["hole_cards"].is_null());
        }
        assert!(store.load_connection("t1", "c-stale").await?.is_none());
        assert_eq!(store.table_connections("t1").await?.len(), 2);
        Ok(())
    }

    #[test]
    fn action_messages_carry_the_raw_action() {
        let message = PushMessage::Action {
            table_id: "t1".into(),
            player_id: "bob".into(),
            game_seq: 7,
            action: PlayerAction::Raise { raise_amount: 20 },
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "action");
        assert_eq!(json["action"], "raise");
        assert_eq!(json["payload"]["raise_amount"], 20);
    }
}
