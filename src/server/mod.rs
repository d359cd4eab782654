pub mod bootstrap;
pub mod dto;
pub mod error;
pub mod logging;
pub mod routes;
pub mod ws;

pub use bootstrap::{connect_database, run_server, ServerConfig};
pub use error::ApiError;
pub use routes::{HiloPokerServer, ServerContext};
