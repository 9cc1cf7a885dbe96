//! Bridge manager (C5): the seam between transport (C2), correlation (C3),
//! compilation waiters (C4), and everything above. Grounded on
//! `bridge/runtime.rs`'s `BridgeRuntime`/`do_start`/`handle_connection`/
//! `do_send_command`, retargeted from accept-side (Lapce listens, the UE
//! plugin dials in) to dial-side (this server dials Unity); the inbound
//! dispatch table is grounded on `bridge_manager.py`'s `_handle_message`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::compilation::CompilationWaiters;
use super::registry::{self, CommandRegistry};
use super::session::{self, BridgeSession, WsStream};
use super::types::{CompilationResult, HelloMessage, InboundMessage, OutboundMessage};
use crate::error::BridgeError;

type Listener<T> = Box<dyn Fn(T) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    connected: Vec<Listener<()>>,
    disconnected: Vec<Listener<()>>,
    context_updated: Vec<Listener<Value>>,
}

struct SessionState {
    session: Option<Arc<BridgeSession>>,
    session_id: Option<String>,
    last_heartbeat_at: Option<i64>,
    context: Option<Value>,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState {
            session: None,
            session_id: None,
            last_heartbeat_at: None,
            context: None,
        }
    }
}

pub struct BridgeManager {
    state: Mutex<SessionState>,
    registry: CommandRegistry,
    waiters: CompilationWaiters,
    listeners: Mutex<Listeners>,
    compiling: AtomicBool,
    connected_tx: watch::Sender<bool>,
    bridge_token: Option<String>,
}

impl BridgeManager {
    pub fn new(bridge_token: Option<String>) -> Arc<Self> {
        let (connected_tx, _rx) = watch::channel(false);
        Arc::new(BridgeManager {
            state: Mutex::new(SessionState::default()),
            registry: CommandRegistry::new(),
            waiters: CompilationWaiters::new(),
            listeners: Mutex::new(Listeners::default()),
            compiling: AtomicBool::new(false),
            connected_tx,
            bridge_token,
        })
    }

    pub fn on_connected(&self, handler: impl Fn() + Send + Sync + 'static) {
        self.listeners.lock().connected.push(Box::new(move |_| handler()));
    }

    pub fn on_disconnected(&self, handler: impl Fn() + Send + Sync + 'static) {
        self.listeners.lock().disconnected.push(Box::new(move |_| handler()));
    }

    pub fn on_context_updated(&self, handler: impl Fn(Value) + Send + Sync + 'static) {
        self.listeners.lock().context_updated.push(Box::new(handler));
    }

    pub fn watch_connected(&self) -> watch::Receiver<bool> {
        self.connected_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        let guard = self.state.lock();
        matches!(&guard.session, Some(session) if !session.is_closed())
    }

    pub fn is_compiling(&self) -> bool {
        self.compiling.load(Ordering::Acquire)
    }

    pub fn last_heartbeat_at(&self) -> Option<i64> {
        self.state.lock().last_heartbeat_at
    }

    pub fn session_id(&self) -> Option<String> {
        self.state.lock().session_id.clone()
    }

    /// Tears down any existing session (failing its pending commands with
    /// `ErrBridgeReattached`), installs the new one, and starts its recv
    /// loop. Compilation waiters are deliberately left untouched — only
    /// pending commands are flushed on reattach, per §3.
    pub async fn attach(self: &Arc<Self>, stream: WsStream) {
        let old_session = {
            let mut guard = self.state.lock();
            let old = guard.session.take();
            guard.session_id = None;
            guard.last_heartbeat_at = None;
            old
        };
        if let Some(old) = old_session {
            self.registry.fail_all(|| BridgeError::BridgeReattached);
            old.close(1000, "reattached").await;
        }

        let (session, read_half) = BridgeSession::split(stream);
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(session::recv_loop(read_half, tx));
        self.state.lock().session = Some(session);

        let manager = self.clone();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                manager.dispatch_inbound(message).await;
            }
            manager.handle_disconnect().await;
        });
    }

    fn current_session(&self) -> Option<Arc<BridgeSession>> {
        self.state.lock().session.clone()
    }

    /// Registers a PendingCommand and emits `command:execute`; returns the
    /// result payload on reply, per the timeout policy in §4.3.
    pub async fn send_command(&self, tool_name: &str, payload: Value, timeout: Duration) -> Result<Value, BridgeError> {
        let session = self.current_session().ok_or(BridgeError::NotConnected)?;
        let (command_id, rx) = self.registry.register(tool_name);
        let message = OutboundMessage::CommandExecute {
            command_id: command_id.simple().to_string(),
            tool_name: tool_name.to_string(),
            payload,
        };
        if let Err(err) = session.send(&message).await {
            self.registry.remove(&command_id);
            return Err(err);
        }
        registry::await_with_timeout(&self.registry, command_id, tool_name, rx, timeout).await
    }

    /// Emits a `ping` frame; a silent no-op when disconnected.
    pub async fn send_ping(&self) {
        if let Some(session) = self.current_session() {
            let timestamp = now_millis();
            let _ = session.send(&OutboundMessage::Ping { timestamp }).await;
        }
    }

    pub async fn await_compilation(&self, timeout: Duration) -> Result<CompilationResult, BridgeError> {
        if !self.is_connected() {
            return Err(BridgeError::NotConnected);
        }
        let (id, rx) = self.waiters.register();
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_dropped)) => Err(BridgeError::BridgeDisconnected),
            Err(_elapsed) => {
                self.waiters.remove(&id);
                Err(BridgeError::CompilationTimeout { timeout })
            }
        }
    }

    /// Closes the current session cleanly (used by the reconnect
    /// supervisor on shutdown).
    pub async fn close_current_session(&self, code: u16, reason: &str) {
        if let Some(session) = self.current_session() {
            session.close(code, reason).await;
        }
    }

    async fn dispatch_inbound(self: &Arc<Self>, message: InboundMessage) {
        match message {
            InboundMessage::Hello(hello) => self.handle_hello(hello).await,
            InboundMessage::Heartbeat { timestamp } => {
                self.state.lock().last_heartbeat_at = Some(timestamp);
            }
            InboundMessage::ContextUpdate { payload } => {
                self.state.lock().context = Some(payload.clone());
                self.emit_context_updated(payload);
            }
            InboundMessage::CommandResult(result) => match Uuid::parse_str(&result.command_id) {
                Ok(id) => self.registry.resolve(id, result.ok, result.result, result.error_message),
                Err(_) => tracing::warn!(command_id = %result.command_id, "command result had a malformed id"),
            },
            InboundMessage::CompilationStarted { .. } => {
                self.compiling.store(true, Ordering::Release);
                tracing::debug!("unity compilation started");
            }
            InboundMessage::CompilationProgress { status, elapsed_seconds } => {
                tracing::trace!(%status, elapsed_seconds, "unity compilation progress");
            }
            InboundMessage::CompilationComplete { result } => {
                self.compiling.store(false, Ordering::Release);
                self.waiters.resolve_all(result);
            }
            InboundMessage::BridgeRestarted { reason, session_id } => {
                self.compiling.store(false, Ordering::Release);
                if let Some(id) = session_id {
                    self.state.lock().session_id = Some(id);
                }
                self.waiters.resolve_all(CompilationResult::bridge_restarted(reason));
            }
            InboundMessage::Unknown => {
                tracing::debug!("ignoring bridge frame of unrecognized type");
            }
        }
    }

    async fn handle_hello(self: &Arc<Self>, hello: HelloMessage) {
        if let Some(expected) = &self.bridge_token {
            if hello.token.as_deref() != Some(expected.as_str()) {
                tracing::warn!("bridge handshake token mismatch, closing link");
                self.close_current_session(4401, "token mismatch").await;
                return;
            }
        }

        self.state.lock().session_id = Some(hello.session_id.clone());
        tracing::info!(
            session_id = %hello.session_id,
            unity_version = %hello.unity_version,
            project_name = %hello.project_name,
            "unity bridge attached"
        );
        self.emit_connected();

        if let Some(session) = self.current_session() {
            let client_info = json!({"name": "unity-mcp-bridge", "version": env!("CARGO_PKG_VERSION")});
            let _ = session.send(&OutboundMessage::ServerInfo { client_info }).await;
        }
    }

    async fn handle_disconnect(&self) {
        let had_session = {
            let mut guard = self.state.lock();
            let had = guard.session.take().is_some();
            guard.session_id = None;
            guard.last_heartbeat_at = None;
            had
        };
        let _ = self.connected_tx.send(false);
        if had_session {
            self.emit_disconnected();
            self.registry.fail_all(|| BridgeError::BridgeDisconnected);
            // Compilation waiters are intentionally left pending: the
            // supervisor's reconnect will deliver bridge:restarted
            // (treated as success) or they will time out on their own.
        }
    }

    fn emit_connected(&self) {
        let _ = self.connected_tx.send(true);
        for handler in &self.listeners.lock().connected {
            handler(());
        }
    }

    fn emit_disconnected(&self) {
        for handler in &self.listeners.lock().disconnected {
            handler(());
        }
    }

    fn emit_context_updated(&self, payload: Value) {
        for handler in &self.listeners.lock().context_updated {
            handler(payload.clone());
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn is_not_connected_before_any_attach() {
        let manager = BridgeManager::new(None);
        assert!(!manager.is_connected());
        assert_eq!(manager.last_heartbeat_at(), None);
    }

    #[tokio::test]
    async fn send_command_without_attachment_fails_not_connected() {
        let manager = BridgeManager::new(None);
        let result = manager.send_command("ping", json!({}), Duration::from_millis(10)).await;
        assert!(matches!(result, Err(BridgeError::NotConnected)));
    }

    #[tokio::test]
    async fn await_compilation_without_attachment_fails_not_connected() {
        let manager = BridgeManager::new(None);
        let result = manager.await_compilation(Duration::from_millis(10)).await;
        assert!(matches!(result, Err(BridgeError::NotConnected)));
    }

    #[tokio::test]
    async fn ping_while_disconnected_is_a_silent_no_op() {
        let manager = BridgeManager::new(None);
        manager.send_ping().await;
    }
}
