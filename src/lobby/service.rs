use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{GameTable, InterRoundKind, TableFilter, TableStatus, User};
use crate::engine::hilo::{Chips, ConfigPatch, GameState, TableConfig};
use crate::game::{GameCoordinator, GameError, InterRoundDisposition, MIN_PLAYERS_TO_START};
use crate::store::{require, Stores};

use super::validation::{ensure_owner, validate_config, validate_config_patch};

const LOG_TARGET: &str = "lobby::service";

/// Table lifecycle operations exposed to clients. Structural changes are
/// routed through the coordinator so they land between hands.
#[async_trait]
pub trait LobbyService: Send + Sync {
    async fn create_table(&self, owner_id: &str, config: TableConfig)
        -> Result<GameTable, GameError>;

    async fn list_tables(&self, filter: TableFilter) -> Result<Vec<GameTable>, GameError>;

    async fn get_table(&self, table_id: &str) -> Result<GameTable, GameError>;

    async fn take_seat(
        &self,
        table_id: &str,
        user_id: &str,
        buy_in: Chips,
    ) -> Result<InterRoundDisposition, GameError>;

    async fn stand_up(&self, table_id: &str, user_id: &str)
        -> Result<InterRoundDisposition, GameError>;

    async fn sit_down(&self, table_id: &str, user_id: &str)
        -> Result<InterRoundDisposition, GameError>;

    async fn leave_table(
        &self,
        table_id: &str,
        user_id: &str,
    ) -> Result<InterRoundDisposition, GameError>;

    /// Running <-> Paused. Returns the new status.
    async fn toggle_pause(&self, table_id: &str, user_id: &str) -> Result<TableStatus, GameError>;

    async fn update_config(
        &self,
        table_id: &str,
        user_id: &str,
        patch: ConfigPatch,
    ) -> Result<TableConfig, GameError>;

    async fn start_game(
        &self,
        table_id: &str,
        user_id: &str,
    ) -> Result<InterRoundDisposition, GameError>;

    async fn end_game(&self, table_id: &str, user_id: &str) -> Result<(), GameError>;

    async fn get_user(&self, user_id: &str) -> Result<User, GameError>;

    async fn create_user(&self, username: &str, balance: Chips) -> Result<User, GameError>;
}

#[derive(Clone)]
pub struct TableLobby {
    stores: Stores,
    coordinator: Arc<GameCoordinator>,
}

impl TableLobby {
    pub fn new(coordinator: Arc<GameCoordinator>) -> Self {
        Self {
            stores: coordinator.stores().clone(),
            coordinator,
        }
    }

    async fn load_table(&self, table_id: &str) -> Result<GameTable, GameError> {
        Ok(require(self.stores.tables.load_table(table_id).await?, "table")?)
    }

    async fn load_open_table(&self, table_id: &str) -> Result<GameTable, GameError> {
        let table = self.load_table(table_id).await?;
        if table.status == TableStatus::Ended {
            return Err(GameError::conflict("table has ended"));
        }
        Ok(table)
    }

    async fn owned_open_table(&self, table_id: &str, user_id: &str) -> Result<GameTable, GameError> {
        let table = self.load_open_table(table_id).await?;
        ensure_owner(&table, user_id)?;
        Ok(table)
    }
}

#[async_trait]
impl LobbyService for TableLobby {
    async fn create_table(
        &self,
        owner_id: &str,
        config: TableConfig,
    ) -> Result<GameTable, GameError> {
        validate_config(&config)?;
        require(self.stores.users.load_user(owner_id).await?, "user")?;

        let table = GameTable {
            table_id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_owned(),
            status: TableStatus::Waiting,
            config,
            inter_round_action_seq: 0,
            created_at: Utc::now(),
        };
        self.stores.tables.create_table(&table).await?;
        self.stores
            .states
            .create_state(&GameState::new(table.table_id.clone(), config))
            .await?;
        info!(
            target = LOG_TARGET,
            table_id = %table.table_id,
            owner_id,
            small_blind = config.small_blind,
            big_blind = config.big_blind,
            ante = config.ante,
            "table created"
        );
        Ok(table)
    }

    async fn list_tables(&self, filter: TableFilter) -> Result<Vec<GameTable>, GameError> {
        Ok(self.stores.tables.list_tables(filter).await?)
    }

    async fn get_table(&self, table_id: &str) -> Result<GameTable, GameError> {
        self.load_table(table_id).await
    }

    async fn take_seat(
        &self,
        table_id: &str,
        user_id: &str,
        buy_in: Chips,
    ) -> Result<InterRoundDisposition, GameError> {
        if buy_in == 0 {
            return Err(GameError::bad_request("buy-in must be greater than zero"));
        }
        self.load_open_table(table_id).await?;
        let user = require(self.stores.users.load_user(user_id).await?, "user")?;
        if user.balance < buy_in {
            return Err(GameError::conflict(format!(
                "balance of {} does not cover a buy-in of {buy_in}",
                user.balance
            )));
        }
        self.coordinator
            .process_inter_round_request(table_id, user_id, InterRoundKind::Join { buy_in })
            .await
    }

    async fn stand_up(
        &self,
        table_id: &str,
        user_id: &str,
    ) -> Result<InterRoundDisposition, GameError> {
        self.load_open_table(table_id).await?;
        self.coordinator
            .process_inter_round_request(table_id, user_id, InterRoundKind::StandUp)
            .await
    }

    async fn sit_down(
        &self,
        table_id: &str,
        user_id: &str,
    ) -> Result<InterRoundDisposition, GameError> {
        self.load_open_table(table_id).await?;
        self.coordinator
            .process_inter_round_request(table_id, user_id, InterRoundKind::SitDown)
            .await
    }

    async fn leave_table(
        &self,
        table_id: &str,
        user_id: &str,
    ) -> Result<InterRoundDisposition, GameError> {
        self.load_open_table(table_id).await?;
        self.coordinator
            .process_inter_round_request(table_id, user_id, InterRoundKind::Leave)
            .await
    }

    async fn toggle_pause(&self, table_id: &str, user_id: &str) -> Result<TableStatus, GameError> {
        let table = self.owned_open_table(table_id, user_id).await?;
        let next = match table.status {
            TableStatus::Running => TableStatus::Paused,
            TableStatus::Paused => TableStatus::Running,
            other => {
                return Err(GameError::conflict(format!(
                    "cannot pause or resume a {} table",
                    other.as_str()
                )))
            }
        };
        self.stores.tables.set_table_status(table_id, next).await?;
        info!(target = LOG_TARGET, table_id, status = next.as_str(), "table status toggled");

        if next == TableStatus::Running {
            self.coordinator.resume(table_id).await?;
        }
        Ok(next)
    }

    async fn update_config(
        &self,
        table_id: &str,
        user_id: &str,
        patch: ConfigPatch,
    ) -> Result<TableConfig, GameError> {
        let table = self.owned_open_table(table_id, user_id).await?;
        let merged = validate_config_patch(table.config, &patch)?;
        self.stores.tables.set_table_config(table_id, merged).await?;
        // the live hand keeps its rules; the state picks up the patch between hands
        self.coordinator
            .process_inter_round_request(table_id, user_id, InterRoundKind::ConfigUpdate { patch })
            .await?;
        info!(
            target = LOG_TARGET,
            table_id,
            small_blind = merged.small_blind,
            big_blind = merged.big_blind,
            ante = merged.ante,
            "table config updated"
        );
        Ok(merged)
    }

    async fn start_game(
        &self,
        table_id: &str,
        user_id: &str,
    ) -> Result<InterRoundDisposition, GameError> {
        let table = self.owned_open_table(table_id, user_id).await?;
        if table.status != TableStatus::Waiting {
            return Err(GameError::conflict(format!(
                "table is {}, expected waiting",
                table.status.as_str()
            )));
        }
        let active = self
            .coordinator
            .load_state(table_id)
            .await?
            .active_seat_count();
        if active < MIN_PLAYERS_TO_START {
            return Err(GameError::conflict(format!(
                "{active} active seats, at least {MIN_PLAYERS_TO_START} required"
            )));
        }
        self.coordinator
            .process_inter_round_request(table_id, user_id, InterRoundKind::Start)
            .await
    }

    async fn end_game(&self, table_id: &str, user_id: &str) -> Result<(), GameError> {
        self.owned_open_table(table_id, user_id).await?;
        let disposition = self
            .coordinator
            .process_inter_round_request(table_id, user_id, InterRoundKind::End)
            .await?;
        self.stores
            .tables
            .set_table_status(table_id, TableStatus::Ended)
            .await?;
        info!(target = LOG_TARGET, table_id, ?disposition, "table ended");
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<User, GameError> {
        Ok(require(self.stores.users.load_user(user_id).await?, "user")?)
    }

    async fn create_user(&self, username: &str, balance: Chips) -> Result<User, GameError> {
        if username.trim().is_empty() {
            return Err(GameError::bad_request("username must not be empty"));
        }
        let user = User {
            user_id: Uuid::new_v4().to_string(),
            username: username.to_owned(),
            password_hash: String::new(),
            balance,
            created_at: Utc::now(),
        };
        self.stores.users.create_user(&user).await?;
        info!(target = LOG_TARGET, user_id = %user.user_id, username, balance, "user created");
        Ok(user)
    }
}
