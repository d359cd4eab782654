use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::domain::{
    ActionLogEntry, ActionSeq, Connection, ConnectionId, GameTable, HandSnapshot,
    InterRoundAction, TableFilter, TableId, TableStatus, User, UserId,
};
use crate::engine::hilo::{Chips, GameState, TableConfig};

use super::versioned::VersionedMap;
use super::{
    ActionLogStore, ConflictKind, ConnectionStore, HandArchive, InterRoundQueue, StateStore,
    StoreError, TableStore, UserLedger,
};

#[derive(Default)]
struct Inner {
    queue: BTreeMap<(TableId, ActionSeq), InterRoundAction>,
    action_log: HashMap<(String, u64), ActionLogEntry>,
    snapshots: HashMap<(TableId, u64), HandSnapshot>,
    users: HashMap<UserId, User>,
    usernames: HashMap<String, UserId>,
    // users whose balance updates fail, for exercising ledger outages
    ledger_outages: HashSet<UserId>,
}

/// Process-local store used by tests and the single-node server.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
    tables: Arc<VersionedMap<TableId, GameTable>>,
    states: Arc<VersionedMap<TableId, GameState>>,
    connections: Arc<DashMap<(TableId, ConnectionId), Connection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every balance update for `user_id` fail until cleared.
    pub fn set_ledger_outage(&self, user_id: &str, failing: bool) {
        let mut inner = self.inner.write();
        if failing {
            inner.ledger_outages.insert(user_id.to_string());
        } else {
            inner.ledger_outages.remove(user_id);
        }
    }
}

#[async_trait]
impl TableStore for InMemoryStore {
    async fn create_table(&self, table: &GameTable) -> Result<(), StoreError> {
        self.tables
            .insert_new(table.table_id.clone(), table.clone(), "table")
    }

    async fn load_table(&self, table_id: &str) -> Result<Option<GameTable>, StoreError> {
        Ok(self.tables.get(&table_id.to_string()).map(|v| v.value))
    }

    async fn list_tables(&self, filter: TableFilter) -> Result<Vec<GameTable>, StoreError> {
        let mut tables: Vec<GameTable> = self
            .tables
            .values()
            .into_iter()
            .filter(|t| filter.matches(t))
            .collect();
        tables.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tables)
    }

    async fn set_table_status(
        &self,
        table_id: &str,
        status: TableStatus,
    ) -> Result<(), StoreError> {
        self.tables
            .modify(&table_id.to_string(), "table", |t| t.status = status)
    }

    async fn set_table_config(
        &self,
        table_id: &str,
        config: TableConfig,
    ) -> Result<(), StoreError> {
        self.tables
            .modify(&table_id.to_string(), "table", |t| t.config = config)
    }

    async fn reserve_action_seq(
        &self,
        table_id: &str,
        expected: ActionSeq,
    ) -> Result<ActionSeq, StoreError> {
        self.tables
            .put(&table_id.to_string(), expected, "table", |table, next| {
                GameTable {
                    inter_round_action_seq: next,
                    ..table.clone()
                }
            })
    }
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn create_state(&self, state: &GameState) -> Result<(), StoreError> {
        self.states
            .insert_new(state.table_id.clone(), state.clone(), "game state")
    }

    async fn load_state(&self, table_id: &str) -> Result<Option<GameState>, StoreError> {
        Ok(self.states.get(&table_id.to_string()).map(|v| v.value))
    }

    async fn put_state(&self, state: &GameState, expected: u64) -> Result<u64, StoreError> {
        self.states
            .put(&state.table_id, expected, "game state", |_, next| GameState {
                game_seq: next,
                ..state.clone()
            })
    }
}

#[async_trait]
impl InterRoundQueue for InMemoryStore {
    async fn enqueue(&self, action: &InterRoundAction) -> Result<(), StoreError> {
        let key = (action.table_id.clone(), action.action_seq);
        let mut inner = self.inner.write();
        if inner.queue.contains_key(&key) {
            return Err(StoreError::Conflict(ConflictKind::AlreadyExists(
                "inter-round action",
            )));
        }
        inner.queue.insert(key, action.clone());
        Ok(())
    }

    async fn load_pending(&self, table_id: &str) -> Result<Vec<InterRoundAction>, StoreError> {
        let inner = self.inner.read();
        let start = (table_id.to_string(), 0);
        Ok(inner
            .queue
            .range(start..)
            .take_while(|((table, _), _)| table == table_id)
            .map(|(_, action)| action.clone())
            .collect())
    }

    async fn remove_action(
        &self,
        table_id: &str,
        action_seq: ActionSeq,
    ) -> Result<(), StoreError> {
        self.inner
            .write()
            .queue
            .remove(&(table_id.to_string(), action_seq));
        Ok(())
    }
}

#[async_trait]
impl ActionLogStore for InMemoryStore {
    async fn append(&self, entry: &ActionLogEntry) -> Result<(), StoreError> {
        let key = (entry.hand_id.clone(), entry.action_id);
        let mut inner = self.inner.write();
        if inner.action_log.contains_key(&key) {
            return Err(StoreError::Conflict(ConflictKind::AlreadyExists(
                "action log entry",
            )));
        }
        inner.action_log.insert(key, entry.clone());
        Ok(())
    }

    async fn load_entry(
        &self,
        hand_id: &str,
        action_id: u64,
    ) -> Result<Option<ActionLogEntry>, StoreError> {
        Ok(self
            .inner
            .read()
            .action_log
            .get(&(hand_id.to_string(), action_id))
            .cloned())
    }
}

#[async_trait]
impl HandArchive for InMemoryStore {
    async fn archive(&self, snapshot: &HandSnapshot) -> Result<(), StoreError> {
        let key = (snapshot.table_id.clone(), snapshot.hand_seq);
        let mut inner = self.inner.write();
        if inner.snapshots.contains_key(&key) {
            return Err(StoreError::Conflict(ConflictKind::AlreadyExists(
                "hand snapshot",
            )));
        }
        inner.snapshots.insert(key, snapshot.clone());
        Ok(())
    }

    async fn load_snapshot(
        &self,
        table_id: &str,
        hand_seq: u64,
    ) -> Result<Option<HandSnapshot>, StoreError> {
        Ok(self
            .inner
            .read()
            .snapshots
            .get(&(table_id.to_string(), hand_seq))
            .cloned())
    }
}

#[async_trait]
impl UserLedger for InMemoryStore {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner.usernames.contains_key(&user.username) || inner.users.contains_key(&user.user_id)
        {
            return Err(StoreError::Conflict(ConflictKind::AlreadyExists("user")));
        }
        inner
            .usernames
            .insert(user.username.clone(), user.user_id.clone());
        inner.users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn load_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().users.get(user_id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .usernames
            .get(username)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn apply_balance_delta(&self, user_id: &str, delta: i64) -> Result<Chips, StoreError> {
        let mut inner = self.inner.write();
        if inner.ledger_outages.contains(user_id) {
            return Err(StoreError::Unavailable(format!(
                "ledger rejected update for {user_id}"
            )));
        }
        let user = inner
            .users
            .get_mut(user_id)
            .ok_or(StoreError::NotFound("user"))?;
        let next = i128::from(user.balance) + i128::from(delta);
        if next < 0 {
            return Err(StoreError::Conflict(ConflictKind::InsufficientFunds));
        }
        user.balance = Chips::try_from(next)
            .map_err(|_| StoreError::Unavailable("balance overflow".into()))?;
        Ok(user.balance)
    }
}

#[async_trait]
impl ConnectionStore for InMemoryStore {
    async fn register(&self, connection: &Connection) -> Result<(), StoreError> {
        let key = (
            connection.table_id.clone(),
            connection.connection_id.clone(),
        );
        match self.connections.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::Conflict(
                ConflictKind::AlreadyExists("connection"),
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(connection.clone());
                Ok(())
            }
        }
    }

    async fn load_connection(
        &self,
        table_id: &str,
        connection_id: &str,
    ) -> Result<Option<Connection>, StoreError> {
        Ok(self
            .connections
            .get(&(table_id.to_string(), connection_id.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn table_connections(&self, table_id: &str) -> Result<Vec<Connection>, StoreError> {
        let mut connections: Vec<Connection> = self
            .connections
            .iter()
            .filter(|entry| entry.key().0 == table_id)
            .map(|entry| entry.value().clone())
            .collect();
        connections.sort_by(|a, b| a.connected_at.cmp(&b.connected_at));
        Ok(connections)
    }

    async fn find_connection(
        &self,
        connection_id: &str,
    ) -> Result<Option<Connection>, StoreError> {
        Ok(self
            .connections
            .iter()
            .find(|entry| entry.key().1 == connection_id)
            .map(|entry| entry.value().clone()))
    }

    async fn remove_connection(
        &self,
        table_id: &str,
        connection_id: &str,
    ) -> Result<(), StoreError> {
        self.connections
            .remove(&(table_id.to_string(), connection_id.to_string()));
        Ok(())
    }
}
