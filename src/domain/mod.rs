//! Persisted records shared by the store, lobby, and coordinator layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::hilo::{Chips, ConfigPatch, GameState, ShowdownOutcome, TableConfig};

/// ---------- Common type aliases ----------
pub type TableId = String;
pub type UserId = String;
pub type ConnectionId = String;
pub type ActionSeq = u64;

/// ---------- Tables ----------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Waiting,
    Running,
    Paused,
    Ended,
}

impl TableStatus {
    /// Waiting -> Running -> (Paused <-> Running) -> Ended; Ended is terminal.
    pub fn can_transition_to(self, next: TableStatus) -> bool {
        use TableStatus::*;
        matches!(
            (self, next),
            (Waiting, Running)
                | (Running, Paused)
                | (Paused, Running)
                | (Waiting, Ended)
                | (Running, Ended)
                | (Paused, Ended)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TableStatus::Waiting => "waiting",
            TableStatus::Running => "running",
            TableStatus::Paused => "paused",
            TableStatus::Ended => "ended",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "waiting" => Some(TableStatus::Waiting),
            "running" => Some(TableStatus::Running),
            "paused" => Some(TableStatus::Paused),
            "ended" => Some(TableStatus::Ended),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameTable {
    pub table_id: TableId,
    pub owner_id: UserId,
    pub status: TableStatus,
    pub config: TableConfig,
    /// Last reserved inter-round queue slot.
    pub inter_round_action_seq: ActionSeq,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFilter {
    pub status: Option<TableStatus>,
}

impl TableFilter {
    pub fn matches(&self, table: &GameTable) -> bool {
        self.status.map_or(true, |status| table.status == status)
    }
}

/// ---------- Inter-round queue ----------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum InterRoundKind {
    Join { buy_in: Chips },
    Leave,
    StandUp,
    SitDown,
    ConfigUpdate { patch: ConfigPatch },
    Start,
    End,
}

impl InterRoundKind {
    pub fn name(&self) -> &'static str {
        match self {
            InterRoundKind::Join { .. } => "join",
            InterRoundKind::Leave => "leave",
            InterRoundKind::StandUp => "stand_up",
            InterRoundKind::SitDown => "sit_down",
            InterRoundKind::ConfigUpdate { .. } => "config_update",
            InterRoundKind::Start => "start",
            InterRoundKind::End => "end",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterRoundAction {
    pub table_id: TableId,
    pub action_seq: ActionSeq,
    pub user_id: UserId,
    pub kind: InterRoundKind,
    pub created_at: DateTime<Utc>,
}

/// ---------- Audit ----------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    /// `tableID#handSeq`
    pub hand_id: String,
    /// The `game_seq` produced by persisting the action.
    pub action_id: u64,
    pub player_id: UserId,
    pub action: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandSnapshot {
    pub table_id: TableId,
    pub hand_seq: u64,
    pub game_state: GameState,
    pub showdown: ShowdownOutcome,
    pub archived_at: DateTime<Utc>,
}

/// ---------- Users & connections ----------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub balance: Chips,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub table_id: TableId,
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub connected_at: DateTime<Utc>,
}
