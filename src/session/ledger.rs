//! Bookkeeping for in-flight fetches.
//!
//! The set of in-flight tasks is owned by a single ledger task. Chains
//! talk to it over a channel, so registration, pruning and cancellation
//! are applied one at a time without a lock in the session API.

use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

use crate::logging::{NETWORKING, SESSION};

/// A fetch that has been issued and not yet pruned.
#[derive(Debug)]
pub struct InFlightTask {
    path: String,
    handle: AbortHandle,
    generation: CancellationToken,
}

impl InFlightTask {
    pub fn new(path: String, handle: AbortHandle, generation: CancellationToken) -> Self {
        Self {
            path,
            handle,
            generation,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_done(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }
}

#[derive(Debug)]
enum LedgerMessage {
    Register(InFlightTask),
    Prune,
    CancelAll(oneshot::Sender<usize>),
    Count(oneshot::Sender<usize>),
}

/// Handle used by the session and its chains to reach the ledger.
#[derive(Clone)]
pub(crate) struct LedgerHandle {
    tx: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    pub async fn register(&self, task: InFlightTask) {
        if let Err(e) = self.tx.send(LedgerMessage::Register(task)).await {
            // No ledger left to track it.
            if let LedgerMessage::Register(task) = e.0 {
                task.cancel();
            }
            tracing::warn!(target: SESSION, "In-flight ledger closed; fetch cancelled");
        }
    }

    pub async fn prune(&self) {
        let _ = self.tx.send(LedgerMessage::Prune).await;
    }

    /// Cancel every registered task. Returns how many were still running.
    pub async fn cancel_all(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(LedgerMessage::CancelAll(reply)).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    pub async fn count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(LedgerMessage::Count(reply)).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

struct Ledger {
    tasks: Vec<InFlightTask>,
    rx: mpsc::Receiver<LedgerMessage>,
}

impl Ledger {
    async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            match msg {
                LedgerMessage::Register(task) => {
                    if task.generation.is_cancelled() {
                        // Scheduled before a cancel_all that has already run.
                        tracing::debug!(
                            target: NETWORKING,
                            "cancelling late fetch for {}",
                            task.path()
                        );
                        task.cancel();
                    } else {
                        self.tasks.push(task);
                    }
                }
                LedgerMessage::Prune => {
                    let before = self.tasks.len();
                    self.tasks.retain(|task| !task.is_done());
                    let pruned = before - self.tasks.len();
                    if pruned > 0 {
                        tracing::trace!(target: SESSION, "pruned {} finished tasks", pruned);
                    }
                }
                LedgerMessage::CancelAll(reply) => {
                    let mut running = 0;
                    for task in self.tasks.drain(..) {
                        if !task.is_done() {
                            running += 1;
                        }
                        task.cancel();
                    }
                    tracing::info!(target: SESSION, "Cancelled {} in-flight requests", running);
                    let _ = reply.send(running);
                }
                LedgerMessage::Count(reply) => {
                    let _ = reply.send(self.tasks.len());
                }
            }
        }
    }
}

/// Spawn the ledger task. Must be called inside a Tokio runtime.
pub(crate) fn spawn_ledger() -> LedgerHandle {
    let (tx, rx) = mpsc::channel(100);
    let ledger = Ledger {
        tasks: Vec::new(),
        rx,
    };

    tokio::spawn(async move {
        ledger.run().await;
    });

    LedgerHandle { tx }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_task() -> tokio::task::JoinHandle<()> {
        tokio::spawn(std::future::pending::<()>())
    }

    #[tokio::test]
    async fn test_register_and_count() {
        let ledger = spawn_ledger();
        let generation = CancellationToken::new();
        let handle = pending_task();

        ledger
            .register(InFlightTask::new("a".into(), handle.abort_handle(), generation))
            .await;
        assert_eq!(ledger.count().await, 1);
    }

    #[tokio::test]
    async fn test_prune_drops_finished_tasks() {
        let ledger = spawn_ledger();
        let generation = CancellationToken::new();

        let done = tokio::spawn(async {});
        let done_abort = done.abort_handle();
        done.await.unwrap();
        let running = pending_task();

        ledger
            .register(InFlightTask::new("done".into(), done_abort, generation.clone()))
            .await;
        ledger
            .register(InFlightTask::new("running".into(), running.abort_handle(), generation))
            .await;
        ledger.prune().await;

        assert_eq!(ledger.count().await, 1);
    }

    #[tokio::test]
    async fn test_cancel_all_aborts_and_clears() {
        let ledger = spawn_ledger();
        let generation = CancellationToken::new();
        let running = pending_task();

        ledger
            .register(InFlightTask::new("x".into(), running.abort_handle(), generation))
            .await;

        assert_eq!(ledger.cancel_all().await, 1);
        assert_eq!(ledger.count().await, 0);
        assert!(running.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_register_after_revocation_cancels_immediately() {
        let ledger = spawn_ledger();
        let generation = CancellationToken::new();
        generation.cancel();
        let running = pending_task();

        ledger
            .register(InFlightTask::new("late".into(), running.abort_handle(), generation))
            .await;

        assert_eq!(ledger.count().await, 0);
        assert!(running.await.unwrap_err().is_cancelled());
    }
}
