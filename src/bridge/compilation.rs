//! Compilation waiter (C4): a broadcast latch resolving every registered
//! waiter on the next `compilation:complete` or `bridge:restarted` event.
//!
//! The required property, per §9, is "resolve-all-then-clear under a
//! lock": the set is drained under the mutex, the mutex is released, and
//! only then is each sender fired. That ordering is what lets a
//! `compilation:complete` arriving mid-dispatch on a sibling message still
//! resolve every waiter present at the moment of dispatch (§8).

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::types::CompilationResult;

#[derive(Default)]
pub struct CompilationWaiters {
    waiters: Mutex<HashMap<Uuid, oneshot::Sender<CompilationResult>>>,
}

impl CompilationWaiters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new waiter, returning an id (for timeout-driven removal)
    /// and the receiver the caller awaits.
    pub fn register(&self) -> (Uuid, oneshot::Receiver<CompilationResult>) {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().insert(id, tx);
        (id, rx)
    }

    /// Removes a single waiter without resolving it — used when a
    /// caller's own timeout elapses first.
    pub fn remove(&self, id: &Uuid) -> bool {
        self.waiters.lock().remove(id).is_some()
    }

    /// Resolves every currently-registered waiter with `result`, then
    /// clears the set. Safe to call with zero waiters registered (a no-op,
    /// per §8's boundary behaviors).
    pub fn resolve_all(&self, result: CompilationResult) {
        let drained: Vec<oneshot::Sender<CompilationResult>> =
            self.waiters.lock().drain().map(|(_, tx)| tx).collect();
        for tx in drained {
            let _ = tx.send(result.clone());
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.waiters.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(elapsed: f64) -> CompilationResult {
        CompilationResult {
            success: true,
            completed: true,
            has_errors: false,
            has_warnings: false,
            errors: Vec::new(),
            warnings: Vec::new(),
            error_count: 0,
            warning_count: 0,
            elapsed_seconds: elapsed,
            message: None,
            bridge_restarted: false,
            reason: None,
        }
    }

    #[tokio::test]
    async fn resolve_all_completes_every_registered_waiter() {
        let waiters = CompilationWaiters::new();
        let (_id1, rx1) = waiters.register();
        let (_id2, rx2) = waiters.register();
        waiters.resolve_all(success(1.5));
        assert_eq!(rx1.await.unwrap().elapsed_seconds, 1.5);
        assert_eq!(rx2.await.unwrap().elapsed_seconds, 1.5);
        assert_eq!(waiters.len(), 0);
    }

    #[tokio::test]
    async fn resolve_all_with_no_waiters_is_a_no_op() {
        let waiters = CompilationWaiters::new();
        waiters.resolve_all(success(0.0));
        assert_eq!(waiters.len(), 0);
    }

    #[tokio::test]
    async fn timeout_removes_only_that_waiter() {
        let waiters = CompilationWaiters::new();
        let (id1, _rx1) = waiters.register();
        let (_id2, rx2) = waiters.register();
        waiters.remove(&id1);
        assert_eq!(waiters.len(), 1);
        waiters.resolve_all(success(2.0));
        assert!(rx2.await.is_ok());
    }

    #[tokio::test]
    async fn bridge_restart_sentinel_is_distinguishable_from_real_completion() {
        let waiters = CompilationWaiters::new();
        let (_id, rx) = waiters.register();
        waiters.resolve_all(CompilationResult::bridge_restarted("assemblyReload".to_string()));
        let result = rx.await.unwrap();
        assert!(result.bridge_restarted);
        assert_eq!(result.reason.as_deref(), Some("assemblyReload"));
    }
}
