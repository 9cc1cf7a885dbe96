//! Command registry (C3): correlates an outbound `command:execute` frame
//! with its eventual `command:result` reply by a server-assigned id.
//!
//! Grounded on the pending-request map in `acp/rpc.rs`'s
//! `AgentRpcHandler` (`pending: Arc<Mutex<HashMap<RequestId,
//! ResponseHandler>>>`), generalized from a crossbeam/callback handoff to a
//! `tokio::sync::oneshot` per entry since this server is async-native with
//! no host-thread boundary to cross.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::BridgeError;

type Completion = Result<Value, BridgeError>;

struct Pending {
    tool_name: String,
    sender: oneshot::Sender<Completion>,
}

/// Map of in-flight commands, guarded by a single mutex so every public
/// operation is atomic. The deadline timer named in §4.3 is realized by
/// the caller of [`CommandRegistry::register`] racing the returned receiver
/// against a `tokio::time::timeout`, rather than the registry owning a
/// timer task of its own — see §9's note on equivalent realizations.
#[derive(Default)]
pub struct CommandRegistry {
    pending: Mutex<HashMap<Uuid, Pending>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a fresh 128-bit id, inserts a PendingCommand, and returns
    /// the id plus a completion receiver the caller awaits. This call
    /// happens-before the wire frame is written by every caller in this
    /// crate, satisfying the §5 ordering guarantee.
    pub fn register(&self, tool_name: impl Into<String>) -> (Uuid, oneshot::Receiver<Completion>) {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(
            id,
            Pending {
                tool_name: tool_name.into(),
                sender: tx,
            },
        );
        (id, rx)
    }

    /// Removes the entry (if still present) and fires its completion sink.
    /// A resolve for an unknown id — a late reply after the caller already
    /// timed out — is logged and ignored, never double-resolving anything.
    pub fn resolve(&self, command_id: Uuid, ok: bool, result: Option<Value>, error_message: Option<String>) {
        let Some(pending) = self.pending.lock().remove(&command_id) else {
            tracing::debug!(%command_id, "command result for unknown or already-resolved command");
            return;
        };
        let outcome = if ok {
            Ok(result.unwrap_or(Value::Null))
        } else {
            Err(BridgeError::ToolFailed(error_message.unwrap_or_else(|| {
                format!("tool \"{}\" failed without an error message", pending.tool_name)
            })))
        };
        let _ = pending.sender.send(outcome);
    }

    /// Removes a single entry without resolving it — used by the caller's
    /// own timeout path, which produces `ToolTimeout` itself rather than
    /// going through [`resolve`].
    pub fn remove(&self, command_id: &Uuid) -> bool {
        self.pending.lock().remove(command_id).is_some()
    }

    /// Atomically removes every entry and fires each completion with an
    /// error built from `make_error`. Used on reattach
    /// (`ErrBridgeReattached`) and on disconnect (`ErrBridgeDisconnected`).
    pub fn fail_all(&self, make_error: impl Fn() -> BridgeError) {
        let drained: Vec<Pending> = self.pending.lock().drain().map(|(_, v)| v).collect();
        for pending in drained {
            let _ = pending.sender.send(Err(make_error()));
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }
}

/// Helper used by callers that need the racing-against-timeout pattern
/// described above, kept here so the timeout/`remove`-on-elapse behavior
/// for a single pending command lives next to the registry it mutates.
pub async fn await_with_timeout(
    registry: &CommandRegistry,
    command_id: Uuid,
    tool_name: &str,
    rx: oneshot::Receiver<Completion>,
    timeout: Duration,
) -> Completion {
    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_dropped)) => Err(BridgeError::BridgeDisconnected),
        Err(_elapsed) => {
            registry.remove(&command_id);
            Err(BridgeError::ToolTimeout {
                tool: tool_name.to_string(),
                timeout,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn resolves_successfully() {
        let registry = CommandRegistry::new();
        let (id, rx) = registry.register("ping");
        registry.resolve(id, true, Some(json!({"ok": true})), None);
        let result = await_with_timeout(&registry, id, "ping", rx, Duration::from_secs(1)).await;
        assert_eq!(result.unwrap(), json!({"ok": true}));
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn resolve_for_unknown_id_is_a_no_op() {
        let registry = CommandRegistry::new();
        registry.resolve(Uuid::new_v4(), true, None, None);
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn timeout_leaves_registry_empty() {
        let registry = CommandRegistry::new();
        let (id, rx) = registry.register("slow_tool");
        let result = await_with_timeout(&registry, id, "slow_tool", rx, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(BridgeError::ToolTimeout { .. })));
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn late_reply_after_timeout_is_ignored_not_double_resolved() {
        let registry = CommandRegistry::new();
        let (id, rx) = registry.register("slow_tool");
        let _ = await_with_timeout(&registry, id, "slow_tool", rx, Duration::from_millis(10)).await;
        // Unity's reply arrives after the caller already observed ToolTimeout.
        registry.resolve(id, true, Some(json!(1)), None);
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn fail_all_resolves_every_pending_command() {
        let registry = CommandRegistry::new();
        let (_id1, rx1) = registry.register("a");
        let (_id2, rx2) = registry.register("b");
        registry.fail_all(|| BridgeError::BridgeReattached);
        assert!(matches!(rx1.await.unwrap(), Err(BridgeError::BridgeReattached)));
        assert!(matches!(rx2.await.unwrap(), Err(BridgeError::BridgeReattached)));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn concurrently_registered_ids_never_collide() {
        let registry = CommandRegistry::new();
        let mut ids = std::collections::HashSet::new();
        for _ in 0..100 {
            let (id, _rx) = registry.register("noop");
            assert!(ids.insert(id));
        }
    }
}
