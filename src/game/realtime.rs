//! Push transport: delivers a serialized message to one registered connection.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::ConnectionId;

const LOG_TARGET: &str = "game::realtime";

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// The connection no longer exists; its record should be dropped.
    #[error("connection gone")]
    Gone,
    #[error("push failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn push(&self, connection_id: &str, message: &str) -> Result<(), PushError>;
}

/// In-process hub backing the websocket route: every socket registers an
/// outbound queue here and a writer task drains it.
pub struct LocalPushHub {
    senders: DashMap<ConnectionId, mpsc::Sender<String>>,
    capacity: usize,
}

impl LocalPushHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            senders: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn attach(&self, connection_id: impl Into<ConnectionId>) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.senders.insert(connection_id.into(), tx);
        rx
    }

    pub fn detach(&self, connection_id: &str) {
        self.senders.remove(connection_id);
    }

    pub fn is_attached(&self, connection_id: &str) -> bool {
        self.senders.contains_key(connection_id)
    }
}

impl Default for LocalPushHub {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl PushTransport for LocalPushHub {
    async fn push(&self, connection_id: &str, message: &str) -> Result<(), PushError> {
        let sender = match self.senders.get(connection_id) {
            Some(entry) => entry.value().clone(),
            None => return Err(PushError::Gone),
        };
        match sender.try_send(message.to_owned()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                Err(PushError::Failed("outbound queue full".into()))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(target = LOG_TARGET, connection_id, "outbound queue closed");
                self.senders.remove(connection_id);
                Err(PushError::Gone)
            }
        }
    }
}
