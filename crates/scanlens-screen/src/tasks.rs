//! Tasks owned by a state holder and aborted with it.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

/// In-flight operations of one state holder.
///
/// Dropping the scope aborts every task still running.
#[derive(Default)]
pub(crate) struct TaskScope {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskScope {
    /// Spawn onto the current Tokio runtime. Panics outside a runtime.
    pub(crate) fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        let mut handles = self.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Wait until every task spawned so far, and any they lead to, has finished.
    pub(crate) async fn wait_idle(&self) {
        loop {
            let pending = std::mem::take(&mut *self.lock());
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    if e.is_panic() {
                        tracing::error!(error = %e, "screen task panicked");
                    }
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TaskScope {
    fn drop(&mut self) {
        let handles = std::mem::take(&mut *self.lock());
        if !handles.is_empty() {
            tracing::debug!(pending = handles.len(), "aborting in-flight screen tasks");
        }
        for handle in handles {
            handle.abort();
        }
    }
}
