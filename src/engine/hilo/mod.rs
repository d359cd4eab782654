pub mod actions;
pub mod cards;
pub mod engine;
pub mod errors;
pub mod pots;
pub mod rules;
pub mod seating;
pub mod showdown;
pub mod state;
pub mod streets;
pub mod types;

pub use actions::*;
pub use cards::*;
pub use engine::*;
pub use errors::*;
pub use pots::*;
pub use rules::*;
pub use seating::*;
pub use showdown::*;
pub use state::*;
pub use streets::*;
pub use types::*;

#[cfg(test)]
mod tests;
