use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbBackend, QueryResult, Statement, Value,
};

use crate::domain::{
    ActionLogEntry, ActionSeq, Connection, GameTable, HandSnapshot, InterRoundAction,
    TableFilter, TableStatus, User,
};
use crate::engine::hilo::{Chips, GameState, TableConfig};

use super::{
    ActionLogStore, ConflictKind, ConnectionStore, HandArchive, InterRoundQueue, StateStore,
    StoreError, TableStore, UserLedger,
};

const SCHEMA: &str = include_str!("schema.sql");

/// Postgres-backed store. Every conditional write is a single statement whose
/// `WHERE` / `ON CONFLICT` clause carries the precondition.
pub struct SeaOrmStore {
    connection: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(connection: DatabaseConnection) -> Self {
        Self { connection }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.connection.execute_unprepared(SCHEMA).await?;
        Ok(())
    }

    async fn execute(&self, sql: &str, values: Vec<Value>) -> Result<u64, StoreError> {
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, values);
        Ok(self.connection.execute(stmt).await?.rows_affected())
    }

    async fn query_one(
        &self,
        sql: &str,
        values: Vec<Value>,
    ) -> Result<Option<QueryResult>, StoreError> {
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, values);
        Ok(self.connection.query_one(stmt).await?)
    }

    async fn query_all(&self, sql: &str, values: Vec<Value>) -> Result<Vec<QueryResult>, StoreError> {
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, values);
        Ok(self.connection.query_all(stmt).await?)
    }

    async fn insert_if_absent(
        &self,
        sql: &str,
        values: Vec<Value>,
        what: &'static str,
    ) -> Result<(), StoreError> {
        match self.execute(sql, values).await? {
            0 => Err(StoreError::Conflict(ConflictKind::AlreadyExists(what))),
            _ => Ok(()),
        }
    }
}

fn to_db(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Unavailable(format!("{value} exceeds BIGINT")))
}

fn from_db(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Unavailable(format!("negative counter {value}")))
}

fn json<T: serde::Serialize>(value: &T) -> Result<Value, StoreError> {
    Ok(Value::from(serde_json::to_value(value)?))
}

fn decode<T: serde::de::DeserializeOwned>(row: &QueryResult, column: &str) -> Result<T, StoreError> {
    let raw: serde_json::Value = row.try_get("", column)?;
    Ok(serde_json::from_value(raw)?)
}

fn table_from_row(row: &QueryResult) -> Result<GameTable, StoreError> {
    let status: String = row.try_get("", "status")?;
    let status = TableStatus::parse(&status)
        .ok_or_else(|| StoreError::Unavailable(format!("unknown table status {status}")))?;
    Ok(GameTable {
        table_id: row.try_get("", "table_id")?,
        owner_id: row.try_get("", "owner_id")?,
        status,
        config: decode(row, "config")?,
        inter_round_action_seq: from_db(row.try_get("", "inter_round_action_seq")?)?,
        created_at: row.try_get::<DateTime<Utc>>("", "created_at")?,
    })
}

fn action_from_row(row: &QueryResult) -> Result<InterRoundAction, StoreError> {
    Ok(InterRoundAction {
        table_id: row.try_get("", "table_id")?,
        action_seq: from_db(row.try_get("", "action_seq")?)?,
        user_id: row.try_get("", "user_id")?,
        kind: decode(row, "kind")?,
        created_at: row.try_get("", "created_at")?,
    })
}

fn user_from_row(row: &QueryResult) -> Result<User, StoreError> {
    Ok(User {
        user_id: row.try_get("", "user_id")?,
        username: row.try_get("", "username")?,
        password_hash: row.try_get("", "password_hash")?,
        balance: from_db(row.try_get("", "balance")?)?,
        created_at: row.try_get("", "created_at")?,
    })
}

fn connection_from_row(row: &QueryResult) -> Result<Connection, StoreError> {
    Ok(Connection {
        table_id: row.try_get("", "table_id")?,
        connection_id: row.try_get("", "connection_id")?,
        user_id: row.try_get("", "user_id")?,
        connected_at: row.try_get("", "connected_at")?,
    })
}

const TABLE_COLUMNS: &str =
    "table_id, owner_id, status, config, inter_round_action_seq, created_at";

#[async_trait]
impl TableStore for SeaOrmStore {
    async fn create_table(&self, table: &GameTable) -> Result<(), StoreError> {
        self.insert_if_absent(
            "INSERT INTO game_tables (table_id, owner_id, status, config, inter_round_action_seq, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT DO NOTHING",
            vec![
                table.table_id.clone().into(),
                table.owner_id.clone().into(),
                table.status.as_str().into(),
                json(&table.config)?,
                to_db(table.inter_round_action_seq)?.into(),
                table.created_at.into(),
            ],
            "table",
        )
        .await
    }

    async fn load_table(&self, table_id: &str) -> Result<Option<GameTable>, StoreError> {
        let sql = format!("SELECT {TABLE_COLUMNS} FROM game_tables WHERE table_id = $1");
        self.query_one(&sql, vec![table_id.into()])
            .await?
            .as_ref()
            .map(table_from_row)
            .transpose()
    }

    async fn list_tables(&self, filter: TableFilter) -> Result<Vec<GameTable>, StoreError> {
        let rows = match filter.status {
            Some(status) => {
                let sql = format!(
                    "SELECT {TABLE_COLUMNS} FROM game_tables WHERE status = $1 ORDER BY created_at"
                );
                self.query_all(&sql, vec![status.as_str().into()]).await?
            }
            None => {
                let sql = format!("SELECT {TABLE_COLUMNS} FROM game_tables ORDER BY created_at");
                self.query_all(&sql, Vec::new()).await?
            }
        };
        rows.iter().map(table_from_row).collect()
    }

    async fn set_table_status(
        &self,
        table_id: &str,
        status: TableStatus,
    ) -> Result<(), StoreError> {
        let updated = self
            .execute(
                "UPDATE game_tables SET status = $1 WHERE table_id = $2",
                vec![status.as_str().into(), table_id.into()],
            )
            .await?;
        if updated == 0 {
            return Err(StoreError::NotFound("table"));
        }
        Ok(())
    }

    async fn set_table_config(
        &self,
        table_id: &str,
        config: TableConfig,
    ) -> Result<(), StoreError> {
        let updated = self
            .execute(
                "UPDATE game_tables SET config = $1 WHERE table_id = $2",
                vec![json(&config)?, table_id.into()],
            )
            .await?;
        if updated == 0 {
            return Err(StoreError::NotFound("table"));
        }
        Ok(())
    }

    async fn reserve_action_seq(
        &self,
        table_id: &str,
        expected: ActionSeq,
    ) -> Result<ActionSeq, StoreError> {
        let next = expected + 1;
        let updated = self
            .execute(
                "UPDATE game_tables SET inter_round_action_seq = $1 \
                 WHERE table_id = $2 AND inter_round_action_seq = $3",
                vec![to_db(next)?.into(), table_id.into(), to_db(expected)?.into()],
            )
            .await?;
        if updated == 1 {
            return Ok(next);
        }
        match self.load_table(table_id).await? {
            None => Err(StoreError::NotFound("table")),
            Some(table) => Err(StoreError::Conflict(ConflictKind::VersionMismatch {
                expected,
                actual: Some(table.inter_round_action_seq),
            })),
        }
    }
}

#[async_trait]
impl StateStore for SeaOrmStore {
    async fn create_state(&self, state: &GameState) -> Result<(), StoreError> {
        self.insert_if_absent(
            "INSERT INTO game_states (table_id, game_seq, state) VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING",
            vec![
                state.table_id.clone().into(),
                to_db(state.game_seq)?.into(),
                json(state)?,
            ],
            "game state",
        )
        .await
    }

    async fn load_state(&self, table_id: &str) -> Result<Option<GameState>, StoreError> {
        let row = self
            .query_one(
                "SELECT game_seq, state FROM game_states WHERE table_id = $1",
                vec![table_id.into()],
            )
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut state: GameState = decode(&row, "state")?;
        state.game_seq = from_db(row.try_get("", "game_seq")?)?;
        Ok(Some(state))
    }

    async fn put_state(&self, state: &GameState, expected: u64) -> Result<u64, StoreError> {
        let next = expected + 1;
        let mut stored = state.clone();
        stored.game_seq = next;
        let updated = self
            .execute(
                "UPDATE game_states SET state = $1, game_seq = $2 \
                 WHERE table_id = $3 AND game_seq = $4",
                vec![
                    json(&stored)?,
                    to_db(next)?.into(),
                    state.table_id.clone().into(),
                    to_db(expected)?.into(),
                ],
            )
            .await?;
        if updated == 1 {
            return Ok(next);
        }
        let actual = self
            .query_one(
                "SELECT game_seq FROM game_states WHERE table_id = $1",
                vec![state.table_id.clone().into()],
            )
            .await?;
        match actual {
            None => Err(StoreError::NotFound("game state")),
            Some(row) => Err(StoreError::Conflict(ConflictKind::VersionMismatch {
                expected,
                actual: Some(from_db(row.try_get("", "game_seq")?)?),
            })),
        }
    }
}

#[async_trait]
impl InterRoundQueue for SeaOrmStore {
    async fn enqueue(&self, action: &InterRoundAction) -> Result<(), StoreError> {
        self.insert_if_absent(
            "INSERT INTO inter_round_actions (table_id, action_seq, user_id, kind, created_at) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT DO NOTHING",
            vec![
                action.table_id.clone().into(),
                to_db(action.action_seq)?.into(),
                action.user_id.clone().into(),
                json(&action.kind)?,
                action.created_at.into(),
            ],
            "inter-round action",
        )
        .await
    }

    async fn load_pending(&self, table_id: &str) -> Result<Vec<InterRoundAction>, StoreError> {
        let rows = self
            .query_all(
                "SELECT table_id, action_seq, user_id, kind, created_at FROM inter_round_actions \
                 WHERE table_id = $1 ORDER BY action_seq ASC",
                vec![table_id.into()],
            )
            .await?;
        rows.iter().map(action_from_row).collect()
    }

    async fn remove_action(
        &self,
        table_id: &str,
        action_seq: ActionSeq,
    ) -> Result<(), StoreError> {
        self.execute(
            "DELETE FROM inter_round_actions WHERE table_id = $1 AND action_seq = $2",
            vec![table_id.into(), to_db(action_seq)?.into()],
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ActionLogStore for SeaOrmStore {
    async fn append(&self, entry: &ActionLogEntry) -> Result<(), StoreError> {
        self.insert_if_absent(
            "INSERT INTO action_log (hand_id, action_id, player_id, action, payload, recorded_at) \
             VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT DO NOTHING",
            vec![
                entry.hand_id.clone().into(),
                to_db(entry.action_id)?.into(),
                entry.player_id.clone().into(),
                entry.action.clone().into(),
                Value::from(entry.payload.clone()),
                entry.timestamp.into(),
            ],
            "action log entry",
        )
        .await
    }

    async fn load_entry(
        &self,
        hand_id: &str,
        action_id: u64,
    ) -> Result<Option<ActionLogEntry>, StoreError> {
        let row = self
            .query_one(
                "SELECT hand_id, action_id, player_id, action, payload, recorded_at \
                 FROM action_log WHERE hand_id = $1 AND action_id = $2",
                vec![hand_id.into(), to_db(action_id)?.into()],
            )
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(ActionLogEntry {
            hand_id: row.try_get("", "hand_id")?,
            action_id: from_db(row.try_get("", "action_id")?)?,
            player_id: row.try_get("", "player_id")?,
            action: row.try_get("", "action")?,
            payload: row.try_get("", "payload")?,
            timestamp: row.try_get("", "recorded_at")?,
        }))
    }
}

#[async_trait]
impl HandArchive for SeaOrmStore {
    async fn archive(&self, snapshot: &HandSnapshot) -> Result<(), StoreError> {
        self.insert_if_absent(
            "INSERT INTO hand_snapshots (table_id, hand_seq, game_state, showdown, archived_at) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT DO NOTHING",
            vec![
                snapshot.table_id.clone().into(),
                to_db(snapshot.hand_seq)?.into(),
                json(&snapshot.game_state)?,
                json(&snapshot.showdown)?,
                snapshot.archived_at.into(),
            ],
            "hand snapshot",
        )
        .await
    }

    async fn load_snapshot(
        &self,
        table_id: &str,
        hand_seq: u64,
    ) -> Result<Option<HandSnapshot>, StoreError> {
        let row = self
            .query_one(
                "SELECT table_id, hand_seq, game_state, showdown, archived_at \
                 FROM hand_snapshots WHERE table_id = $1 AND hand_seq = $2",
                vec![table_id.into(), to_db(hand_seq)?.into()],
            )
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(HandSnapshot {
            table_id: row.try_get("", "table_id")?,
            hand_seq: from_db(row.try_get("", "hand_seq")?)?,
            game_state: decode(&row, "game_state")?,
            showdown: decode(&row, "showdown")?,
            archived_at: row.try_get("", "archived_at")?,
        }))
    }
}

#[async_trait]
impl UserLedger for SeaOrmStore {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        self.insert_if_absent(
            "INSERT INTO users (user_id, username, password_hash, balance, created_at) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT DO NOTHING",
            vec![
                user.user_id.clone().into(),
                user.username.clone().into(),
                user.password_hash.clone().into(),
                to_db(user.balance)?.into(),
                user.created_at.into(),
            ],
            "user",
        )
        .await
    }

    async fn load_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        self.query_one(
            "SELECT user_id, username, password_hash, balance, created_at FROM users \
             WHERE user_id = $1",
            vec![user_id.into()],
        )
        .await?
        .as_ref()
        .map(user_from_row)
        .transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.query_one(
            "SELECT user_id, username, password_hash, balance, created_at FROM users \
             WHERE username = $1",
            vec![username.into()],
        )
        .await?
        .as_ref()
        .map(user_from_row)
        .transpose()
    }

    async fn apply_balance_delta(&self, user_id: &str, delta: i64) -> Result<Chips, StoreError> {
        let row = self
            .query_one(
                "UPDATE users SET balance = balance + $1 \
                 WHERE user_id = $2 AND balance + $1 >= 0 RETURNING balance",
                vec![delta.into(), user_id.into()],
            )
            .await?;
        if let Some(row) = row {
            return from_db(row.try_get("", "balance")?);
        }
        match self.load_user(user_id).await? {
            None => Err(StoreError::NotFound("user")),
            Some(_) => Err(StoreError::Conflict(ConflictKind::InsufficientFunds)),
        }
    }
}

#[async_trait]
impl ConnectionStore for SeaOrmStore {
    async fn register(&self, connection: &Connection) -> Result<(), StoreError> {
        self.insert_if_absent(
            "INSERT INTO connections (table_id, connection_id, user_id, connected_at) \
             VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
            vec![
                connection.table_id.clone().into(),
                connection.connection_id.clone().into(),
                connection.user_id.clone().into(),
                connection.connected_at.into(),
            ],
            "connection",
        )
        .await
    }

    async fn load_connection(
        &self,
        table_id: &str,
        connection_id: &str,
    ) -> Result<Option<Connection>, StoreError> {
        self.query_one(
            "SELECT table_id, connection_id, user_id, connected_at FROM connections \
             WHERE table_id = $1 AND connection_id = $2",
            vec![table_id.into(), connection_id.into()],
        )
        .await?
        .as_ref()
        .map(connection_from_row)
        .transpose()
    }

    async fn table_connections(&self, table_id: &str) -> Result<Vec<Connection>, StoreError> {
        let rows = self
            .query_all(
                "SELECT table_id, connection_id, user_id, connected_at FROM connections \
                 WHERE table_id = $1 ORDER BY connected_at",
                vec![table_id.into()],
            )
            .await?;
        rows.iter().map(connection_from_row).collect()
    }

    async fn find_connection(
        &self,
        connection_id: &str,
    ) -> Result<Option<Connection>, StoreError> {
        self.query_one(
            "SELECT table_id, connection_id, user_id, connected_at FROM connections \
             WHERE connection_id = $1 LIMIT 1",
            vec![connection_id.into()],
        )
        .await?
        .as_ref()
        .map(connection_from_row)
        .transpose()
    }

    async fn remove_connection(
        &self,
        table_id: &str,
        connection_id: &str,
    ) -> Result<(), StoreError> {
        self.execute(
            "DELETE FROM connections WHERE table_id = $1 AND connection_id = $2",
            vec![table_id.into(), connection_id.into()],
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InterRoundKind;
    use sea_orm::{ConnectOptions, Database};
    use std::env;

    async fn setup_store() -> anyhow::Result<Option<SeaOrmStore>> {
        let Ok(url) = env::var("DATABASE_URL") else {
            return Ok(None);
        };
        let mut opts = ConnectOptions::new(url);
        opts.max_connections(2).sqlx_logging(false);
        let connection = Database::connect(opts).await?;
        let store = SeaOrmStore::new(connection);
        store.ensure_schema().await?;
        Ok(Some(store))
    }

    fn fresh_table() -> GameTable {
        GameTable {
            table_id: uuid::Uuid::new_v4().to_string(),
            owner_id: "owner".into(),
            status: TableStatus::Waiting,
            config: TableConfig::default(),
            inter_round_action_seq: 0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn postgres_state_writes_are_versioned() -> anyhow::Result<()> {
        let Some(store) = setup_store().await? else {
            return Ok(());
        };
        let table = fresh_table();
        store.create_table(&table).await?;
        let state = GameState::new(table.table_id.clone(), table.config);
        store.create_state(&state).await?;

        assert_eq!(store.put_state(&state, 0).await?, 1);
        let err = store.put_state(&state, 0).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict(ConflictKind::VersionMismatch {
                expected: 0,
                actual: Some(1)
            })
        ));
        let loaded = store.load_state(&table.table_id).await?.expect("state");
        assert_eq!(loaded.game_seq, 1);
        Ok(())
    }

    #[tokio::test]
    async fn postgres_queue_slots_and_reservation() -> anyhow::Result<()> {
        let Some(store) = setup_store().await? else {
            return Ok(());
        };
        let table = fresh_table();
        store.create_table(&table).await?;
        assert_eq!(store.reserve_action_seq(&table.table_id, 0).await?, 1);
        assert!(store.reserve_action_seq(&table.table_id, 0).await.is_err());

        let action = InterRoundAction {
            table_id: table.table_id.clone(),
            action_seq: 1,
            user_id: "u".into(),
            kind: InterRoundKind::Join { buy_in: 50 },
            created_at: Utc::now(),
        };
        store.enqueue(&action).await?;
        assert!(store.enqueue(&action).await.is_err());
        let pending = store.load_pending(&table.table_id).await?;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, InterRoundKind::Join { buy_in: 50 });
        store.remove_action(&table.table_id, 1).await?;
        assert!(store.load_pending(&table.table_id).await?.is_empty());
        Ok(())
    }
}
