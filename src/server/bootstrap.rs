use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::engine::hilo::Chips;
use crate::game::{CoordinatorConfig, GameCoordinator, LocalPushHub};
use crate::lobby::{LobbyService, TableLobby};
use crate::store::{SeaOrmStore, Stores};

use super::routes::HiloPokerServer;

const LOG_TARGET: &str = "server::bootstrap";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Postgres URL; `None` runs on the in-memory store.
    pub database_url: Option<String>,
    pub rng_seed: Option<u64>,
    pub turn_timeout: Option<Duration>,
    /// Users created at boot when their username is not taken yet.
    pub seed_users: Vec<(String, Chips)>,
}

pub async fn run_server(config: ServerConfig) -> Result<()> {
    let stores = match config.database_url.as_deref() {
        Some(url) => {
            let store = SeaOrmStore::new(connect_database(url).await?);
            store
                .ensure_schema()
                .await
                .context("failed to apply database schema")?;
            Stores::from_backend(Arc::new(store))
        }
        None => {
            warn!(target = LOG_TARGET, "no database configured; state is kept in memory");
            Stores::in_memory()
        }
    };

    let hub = Arc::new(LocalPushHub::default());
    let coordinator = GameCoordinator::spawn(
        stores.clone(),
        hub.clone(),
        CoordinatorConfig {
            rng_seed: config.rng_seed,
            turn_timeout: config.turn_timeout,
            ..CoordinatorConfig::default()
        },
    );
    let lobby: Arc<dyn LobbyService> = Arc::new(TableLobby::new(Arc::clone(&coordinator)));
    seed_users(&stores, lobby.as_ref(), &config.seed_users).await?;

    let router = HiloPokerServer::new(Arc::clone(&coordinator), lobby, hub)
        .into_router()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        );

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    let local_addr = listener.local_addr()?;
    info!(
        target = LOG_TARGET,
        %local_addr,
        persistent = config.database_url.is_some(),
        turn_timeout = ?config.turn_timeout,
        "hilo poker server listening"
    );

    let served = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited with error");
    coordinator.shutdown();
    served
}

pub async fn connect_database(database_url: &str) -> Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new(database_url.to_owned());
    opts.max_connections(5)
        .min_connections(1)
        .sqlx_logging(true);
    Database::connect(opts)
        .await
        .with_context(|| format!("failed to connect to database at {database_url}"))
}

async fn seed_users(
    stores: &Stores,
    lobby: &dyn LobbyService,
    users: &[(String, Chips)],
) -> Result<()> {
    for (username, balance) in users {
        if stores.users.find_by_username(username).await?.is_some() {
            continue;
        }
        let user = lobby
            .create_user(username, *balance)
            .await
            .with_context(|| format!("failed to seed user {username}"))?;
        info!(target = LOG_TARGET, user_id = %user.user_id, %username, balance, "seeded user");
    }
    Ok(())
}

/// Parses `name:balance,name:balance`.
pub fn parse_seed_users(raw: &str) -> Result<Vec<(String, Chips)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, balance) = entry
                .split_once(':')
                .ok_or_else(|| anyhow!("seed user '{entry}' is not name:balance"))?;
            let balance = balance
                .trim()
                .parse::<Chips>()
                .with_context(|| format!("invalid balance for seed user '{name}'"))?;
            Ok((name.trim().to_owned(), balance))
        })
        .collect()
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(target = LOG_TARGET, error = %err, "failed to install ctrl-c handler");
    }
    info!(target = LOG_TARGET, "shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_users_parse() {
        let parsed = parse_seed_users("alice:500, bob:250,").unwrap();
        assert_eq!(
            parsed,
            vec![("alice".to_owned(), 500), ("bob".to_owned(), 250)]
        );
        assert!(parse_seed_users("carol").is_err());
        assert!(parse_seed_users("dave:lots").is_err());
        assert!(parse_seed_users("").unwrap().is_empty());
    }
}
