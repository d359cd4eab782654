//! Persistence contracts consumed by the coordinator and lobby. Every collection
//! exposes only the conditional writes it needs; there are no cross-row transactions.

use std::sync::Arc;

use async_trait::async_trait;
use ::sea_orm::{DatabaseConnection, DbErr};

use crate::domain::{
    ActionLogEntry, ActionSeq, Connection, GameTable, HandSnapshot, InterRoundAction, TableFilter,
    TableStatus, User,
};
use crate::engine::hilo::{Chips, GameState, TableConfig};

pub mod in_memory;
pub mod sea_orm;
pub mod versioned;

pub use in_memory::InMemoryStore;
pub use self::sea_orm::SeaOrmStore;
pub use versioned::{check_version, Versioned, VersionedMap};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("conflict: {0}")]
    Conflict(ConflictKind),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictKind {
    #[error("version mismatch (expected {expected}, found {actual:?})")]
    VersionMismatch { expected: u64, actual: Option<u64> },
    #[error("{0} already exists")]
    AlreadyExists(&'static str),
    #[error("insufficient funds")]
    InsufficientFunds,
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

#[async_trait]
pub trait TableStore: Send + Sync {
    /// Insert-if-absent.
    async fn create_table(&self, table: &GameTable) -> Result<(), StoreError>;

    async fn load_table(&self, table_id: &str) -> Result<Option<GameTable>, StoreError>;

    async fn list_tables(&self, filter: TableFilter) -> Result<Vec<GameTable>, StoreError>;

    async fn set_table_status(&self, table_id: &str, status: TableStatus)
        -> Result<(), StoreError>;

    async fn set_table_config(&self, table_id: &str, config: TableConfig)
        -> Result<(), StoreError>;

    /// Advances `inter_round_action_seq` from `expected` to `expected + 1`.
    async fn reserve_action_seq(
        &self,
        table_id: &str,
        expected: ActionSeq,
    ) -> Result<ActionSeq, StoreError>;
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn create_state(&self, state: &GameState) -> Result<(), StoreError>;

    async fn load_state(&self, table_id: &str) -> Result<Option<GameState>, StoreError>;

    /// Persists `state` iff the stored `game_seq` equals `expected`, returning the new seq.
    async fn put_state(&self, state: &GameState, expected: u64) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait InterRoundQueue: Send + Sync {
    /// Fails with `AlreadyExists` when the slot is taken.
    async fn enqueue(&self, action: &InterRoundAction) -> Result<(), StoreError>;

    /// Pending actions in ascending `action_seq` order.
    async fn load_pending(&self, table_id: &str) -> Result<Vec<InterRoundAction>, StoreError>;

    async fn remove_action(&self, table_id: &str, action_seq: ActionSeq) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ActionLogStore: Send + Sync {
    async fn append(&self, entry: &ActionLogEntry) -> Result<(), StoreError>;

    async fn load_entry(
        &self,
        hand_id: &str,
        action_id: u64,
    ) -> Result<Option<ActionLogEntry>, StoreError>;
}

#[async_trait]
pub trait HandArchive: Send + Sync {
    async fn archive(&self, snapshot: &HandSnapshot) -> Result<(), StoreError>;

    async fn load_snapshot(
        &self,
        table_id: &str,
        hand_seq: u64,
    ) -> Result<Option<HandSnapshot>, StoreError>;
}

#[async_trait]
pub trait UserLedger: Send + Sync {
    /// Usernames are unique; a duplicate fails with `AlreadyExists`.
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;

    async fn load_user(&self, user_id: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Atomic add guarded by `balance + delta >= 0`; returns the new balance.
    async fn apply_balance_delta(&self, user_id: &str, delta: i64) -> Result<Chips, StoreError>;
}

#[async_trait]
pub trait ConnectionStore: Send + Sync {
    async fn register(&self, connection: &Connection) -> Result<(), StoreError>;

    async fn load_connection(
        &self,
        table_id: &str,
        connection_id: &str,
    ) -> Result<Option<Connection>, StoreError>;

    async fn table_connections(&self, table_id: &str) -> Result<Vec<Connection>, StoreError>;

    async fn find_connection(&self, connection_id: &str)
        -> Result<Option<Connection>, StoreError>;

    async fn remove_connection(&self, table_id: &str, connection_id: &str) -> Result<(), StoreError>;
}

/// Handles to every collection, shared by the coordinator and lobby.
#[derive(Clone)]
pub struct Stores {
    pub tables: Arc<dyn TableStore>,
    pub states: Arc<dyn StateStore>,
    pub queue: Arc<dyn InterRoundQueue>,
    pub action_log: Arc<dyn ActionLogStore>,
    pub archive: Arc<dyn HandArchive>,
    pub users: Arc<dyn UserLedger>,
    pub connections: Arc<dyn ConnectionStore>,
}

impl Stores {
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: TableStore
            + StateStore
            + InterRoundQueue
            + ActionLogStore
            + HandArchive
            + UserLedger
            + ConnectionStore
            + 'static,
    {
        Self {
            tables: backend.clone(),
            states: backend.clone(),
            queue: backend.clone(),
            action_log: backend.clone(),
            archive: backend.clone(),
            users: backend.clone(),
            connections: backend,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(InMemoryStore::new()))
    }

    pub fn from_sea_orm(connection: DatabaseConnection) -> Self {
        Self::from_backend(Arc::new(SeaOrmStore::new(connection)))
    }
}

/// Convenience for lookups that must exist.
pub fn require<T>(value: Option<T>, what: &'static str) -> Result<T, StoreError> {
    value.ok_or(StoreError::NotFound(what))
}
