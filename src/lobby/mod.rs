pub mod service;
pub mod validation;


pub use service::{LobbyService, TableLobby};
pub use validation::*;
