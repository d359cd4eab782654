use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{GameTable, TableStatus};
use crate::engine::hilo::{Chips, ConfigPatch, Street, TableConfig};
use crate::game::{ActionReceipt, Advance};

#[derive(Debug, Deserialize)]
pub struct CreateTableRequest {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(default)]
    pub config: TableConfig,
}

#[derive(Debug, Serialize)]
pub struct CreateTableResponse {
    #[serde(rename = "tableID")]
    pub table_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListTablesQuery {
    pub status: Option<TableStatus>,
}

#[derive(Debug, Serialize)]
pub struct TablesResponse {
    pub tables: Vec<GameTable>,
}

/// Body of every owner- or seat-scoped table request.
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    #[serde(rename = "userID")]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SitRequest {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "buyIn")]
    pub buy_in: Chips,
}

#[derive(Debug, Deserialize)]
pub struct UpdateConfigRequest {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub config: ConfigPatch,
}

/// Player move in its loose wire form; parsed by `PlayerAction::from_wire`.
#[derive(Debug, Deserialize)]
pub struct PlayerActionRequest {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub action: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    #[serde(rename = "gameSeq")]
    pub game_seq: u64,
    pub street: Street,
    pub advance: Advance,
}

impl From<ActionReceipt> for ActionResponse {
    fn from(receipt: ActionReceipt) -> Self {
        Self {
            game_seq: receipt.game_seq,
            street: receipt.street,
            advance: receipt.advance,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub balance: Chips,
}

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    #[serde(rename = "userID")]
    pub user_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct StateQuery {
    #[serde(rename = "userID")]
    pub user_id: Option<String>,
}

/// Frames a websocket client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    PlayerAction {
        action: String,
        #[serde(default)]
        payload: Value,
    },
    Resync,
}

/// Direct replies to a websocket client; table updates arrive as push messages.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerReply {
    Ack {
        #[serde(rename = "gameSeq")]
        game_seq: u64,
        street: Street,
        advance: Advance,
    },
    Error {
        message: String,
    },
}
