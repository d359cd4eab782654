use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use hilo_poker::server::bootstrap::parse_seed_users;
use hilo_poker::server::{run_server, ServerConfig};

const DEFAULT_BIND: &str = "127.0.0.1:4000";

#[derive(Debug, Parser)]
#[command(name = "hilo_server")]
#[command(about = "Run the hi-lo poker table API and websocket server", long_about = None)]
struct Args {
    /// Address to bind the HTTP server to (host:port)
    #[arg(long, env = "SERVER_BIND", default_value = DEFAULT_BIND)]
    bind: SocketAddr,

    /// SeaORM-compatible Postgres URL; omit to keep everything in memory
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Optional RNG seed for reproducible shuffles
    #[arg(long, env = "SERVER_RNG_SEED")]
    rng_seed: Option<u64>,

    /// Seconds a player may take before the default action is applied
    #[arg(long, env = "SERVER_TURN_TIMEOUT_SECS")]
    turn_timeout_secs: Option<u64>,

    /// Users to create at boot, as `name:balance,name:balance`
    #[arg(long, env = "SERVER_SEED_USERS", default_value = "")]
    seed_users: String,

    /// Toggle structured (JSON) logs
    #[arg(long, env = "SERVER_LOG_JSON", default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = Args::parse();
    init_tracing(args.json)?;
    let config = build_config(args).context("failed to build server config")?;
    run_server(config).await
}

fn load_dotenv() {
    let manifest_env = env!("CARGO_MANIFEST_DIR");
    let manifest_env_path = PathBuf::from(manifest_env).join(".env");
    dotenv::from_filename(manifest_env_path).ok();
    dotenv::dotenv().ok();
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt::fmt().with_env_filter(filter).with_target(false);

    if json {
        builder.json().flatten_event(true).init();
    } else {
        builder.compact().init();
    }

    Ok(())
}

fn build_config(args: Args) -> Result<ServerConfig> {
    let seed_users = parse_seed_users(&args.seed_users)?;
    let turn_timeout = args
        .turn_timeout_secs
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);

    Ok(ServerConfig {
        bind: args.bind,
        database_url: args.database_url.filter(|url| !url.trim().is_empty()),
        rng_seed: args.rng_seed,
        turn_timeout,
        seed_users,
    })
}
