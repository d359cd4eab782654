use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::TableId;
use crate::tokio_tools::spawn_named_task;

const LOG_TARGET: &str = "game::timer";

/// Expiry notice for the input the table was waiting on at `timer_seq`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimerFired {
    pub table_id: TableId,
    pub timer_seq: u64,
}

/// Schedules turn/declaration expiries. Firing is advisory: the consumer drops
/// any notice whose `timer_seq` no longer matches the persisted state.
#[derive(Clone)]
pub struct TurnTimer {
    timeout: Duration,
    tx: mpsc::UnboundedSender<TimerFired>,
    stop: CancellationToken,
}

impl TurnTimer {
    pub fn new(
        timeout: Duration,
        stop: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { timeout, tx, stop }, rx)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn arm(&self, table_id: &str, timer_seq: u64) {
        let fired = TimerFired {
            table_id: table_id.to_owned(),
            timer_seq,
        };
        let tx = self.tx.clone();
        let stop = self.stop.clone();
        let timeout = self.timeout;
        spawn_named_task(format!("turn-timer-{table_id}-{timer_seq}"), async move {
            tokio::select! {
                _ = stop.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    debug!(
                        target = LOG_TARGET,
                        table_id = %fired.table_id,
                        timer_seq = fired.timer_seq,
                        "turn timer fired"
                    );
                    let _ = tx.send(fired);
                }
            }
        });
    }
}
