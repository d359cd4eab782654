use std::future::Future;

use tokio::task::JoinHandle;
use tracing::Instrument;

/// Spawns a background task instrumented with a `task` span carrying `name`.
pub fn spawn_named_task<F, S>(name: S, future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
    S: Into<String>,
{
    let name = name.into();
    let span = tracing::debug_span!("task", task_name = %name);
    tokio::spawn(future.instrument(span))
}
