//! Structured channel for failures the engine swallows to keep tables moving.
//! Each alert is logged, counted, and fanned out to any subscribers.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

use crate::domain::{ActionSeq, ConnectionId, TableId, UserId};
use crate::engine::hilo::Chips;

const LOG_TARGET: &str = "game::alerts";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineAlert {
    QueueActionFailed {
        table_id: TableId,
        action_seq: ActionSeq,
        action: &'static str,
        reason: String,
    },
    LedgerCreditFailed {
        table_id: TableId,
        user_id: UserId,
        amount: Chips,
        reason: String,
    },
    PotUnawarded {
        table_id: TableId,
        hand_seq: u64,
        amount: Chips,
    },
    PushFailed {
        table_id: TableId,
        connection_id: ConnectionId,
        reason: String,
    },
    /// The street machine could not be advanced after its retries ran out.
    AdvanceStalled {
        table_id: TableId,
        attempts: u32,
        reason: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AlertKind {
    QueueActionFailed,
    LedgerCreditFailed,
    PotUnawarded,
    PushFailed,
    AdvanceStalled,
}

impl AlertKind {
    fn slot(self) -> usize {
        match self {
            AlertKind::QueueActionFailed => 0,
            AlertKind::LedgerCreditFailed => 1,
            AlertKind::PotUnawarded => 2,
            AlertKind::PushFailed => 3,
            AlertKind::AdvanceStalled => 4,
        }
    }
}

impl EngineAlert {
    pub fn kind(&self) -> AlertKind {
        match self {
            EngineAlert::QueueActionFailed { .. } => AlertKind::QueueActionFailed,
            EngineAlert::LedgerCreditFailed { .. } => AlertKind::LedgerCreditFailed,
            EngineAlert::PotUnawarded { .. } => AlertKind::PotUnawarded,
            EngineAlert::PushFailed { .. } => AlertKind::PushFailed,
            EngineAlert::AdvanceStalled { .. } => AlertKind::AdvanceStalled,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AlertCounts {
    pub queue_action_failed: u64,
    pub ledger_credit_failed: u64,
    pub pot_unawarded: u64,
    pub push_failed: u64,
    pub advance_stalled: u64,
}

pub struct AlertSink {
    tx: broadcast::Sender<EngineAlert>,
    counters: [AtomicU64; 5],
}

impl AlertSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            counters: Default::default(),
        }
    }

    pub fn raise(&self, alert: EngineAlert) {
        warn!(target = LOG_TARGET, ?alert, "engine alert");
        self.counters[alert.kind().slot()].fetch_add(1, Ordering::Relaxed);
        // no subscribers is fine; counters still move
        let _ = self.tx.send(alert);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineAlert> {
        self.tx.subscribe()
    }

    pub fn count(&self, kind: AlertKind) -> u64 {
        self.counters[kind.slot()].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> AlertCounts {
        AlertCounts {
            queue_action_failed: self.count(AlertKind::QueueActionFailed),
            ledger_credit_failed: self.count(AlertKind::LedgerCreditFailed),
            pot_unawarded: self.count(AlertKind::PotUnawarded),
            push_failed: self.count(AlertKind::PushFailed),
            advance_stalled: self.count(AlertKind::AdvanceStalled),
        }
    }
}

impl Default for AlertSink {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn raised_alerts_are_counted_and_delivered() -> anyhow::Result<()> {
        let sink = AlertSink::new(8);
        let mut rx = sink.subscribe();

        let alert = EngineAlert::PotUnawarded {
            table_id: "t1".into(),
            hand_seq: 3,
            amount: 40,
        };
        sink.raise(alert.clone());
        sink.raise(EngineAlert::PushFailed {
            table_id: "t1".into(),
            connection_id: "c1".into(),
            reason: "backlog".into(),
        });

        assert_eq!(rx.recv().await?, alert);
        let counts = sink.snapshot();
        assert_eq!(counts.pot_unawarded, 1);
        assert_eq!(counts.push_failed, 1);
        assert_eq!(counts.queue_action_failed, 0);
        Ok(())
    }

    #[test]
    fn alerts_serialize_with_a_kind_tag() {
        let alert = EngineAlert::LedgerCreditFailed {
            table_id: "t".into(),
            user_id: "u".into(),
            amount: 55,
            reason: "timeout".into(),
        };
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["kind"], "ledger_credit_failed");
        assert_eq!(json["amount"], 55);
    }
}
