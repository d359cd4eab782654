pub mod domain;
pub mod engine;
pub mod game;
pub mod lobby;
pub mod server;
pub mod store;
pub mod tokio_tools;

#[cfg(test)]
pub mod test_utils;
