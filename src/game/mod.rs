pub mod alerts;
pub mod broadcast;
pub mod coordinator;
pub mod error;
pub mod interround;
pub mod realtime;
pub mod timer;

pub use alerts::{AlertCounts, AlertKind, AlertSink, EngineAlert};
pub use broadcast::{Broadcaster, PushMessage, SeatView, StateView};
pub use coordinator::{
    ActionReceipt, Advance, CoordinatorConfig, GameCoordinator, InterRoundDisposition,
};
pub use error::GameError;
pub use interround::{InterRoundError, InterRoundProcessor, MIN_PLAYERS_TO_START};
pub use realtime::{LocalPushHub, PushError, PushTransport};
pub use timer::{TimerFired, TurnTimer};
