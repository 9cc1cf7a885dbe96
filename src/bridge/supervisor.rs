//! Reconnect supervisor (C6): dials the configured Unity endpoint with
//! backoff, attaches new sockets to the manager, and restarts on disconnect
//! until shutdown. Grounded on `bridge_connector.py`'s `_run`/
//! `_connect_once`/`_monitor_connection`, whose `asyncio.wait(...,
//! FIRST_COMPLETED)` race becomes a `tokio::select!` here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use super::manager::BridgeManager;
use crate::config::Config;

const MIN_BACKOFF_MS: u64 = 1000;
const OPEN_TIMEOUT: Duration = Duration::from_secs(10);
const MIN_PING_INTERVAL: Duration = Duration::from_secs(5);

pub struct ReconnectSupervisor {
    manager: Arc<BridgeManager>,
    bridge_url: String,
    backoff: Duration,
    ping_interval: Duration,
    shutting_down: Arc<AtomicBool>,
    shutdown_notify: Arc<Notify>,
}

impl ReconnectSupervisor {
    pub fn new(manager: Arc<BridgeManager>, config: &Config) -> Self {
        let backoff = Duration::from_millis(config.reconnect_interval_ms.max(MIN_BACKOFF_MS));
        let ping_interval = Duration::from_millis(config.reconnect_interval_ms).max(MIN_PING_INTERVAL);
        ReconnectSupervisor {
            manager,
            bridge_url: config.bridge_url(),
            backoff,
            ping_interval,
            shutting_down: Arc::new(AtomicBool::new(false)),
            shutdown_notify: Arc::new(Notify::new()),
        }
    }

    /// Sets the shared shutdown signal and wakes any in-progress backoff
    /// sleep or connected-state select so the supervisor can exit promptly.
    pub fn stop(&self) {
        self.shutting_down.store(true, Ordering::Release);
        self.shutdown_notify.notify_waiters();
    }

    fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    pub async fn run(self: Arc<Self>) {
        loop {
            if self.is_shutting_down() {
                break;
            }

            match self.dial().await {
                Ok(stream) => {
                    tracing::info!(url = %self.bridge_url, "connected to unity bridge");
                    self.manager.attach(stream).await;
                    self.run_connected().await;
                    if self.is_shutting_down() {
                        break;
                    }
                    tracing::warn!("unity bridge link lost, reconnecting");
                }
                Err(err) => {
                    tracing::warn!(error = %err, url = %self.bridge_url, "unity bridge connection attempt failed");
                }
            }

            self.sleep_backoff().await;
        }
    }

    async fn dial(&self) -> anyhow::Result<super::session::WsStream> {
        let (stream, _response) = tokio::time::timeout(
            OPEN_TIMEOUT,
            tokio_tungstenite::connect_async(&self.bridge_url),
        )
        .await
        .map_err(|_| anyhow::anyhow!("timed out opening bridge connection"))??;
        Ok(stream)
    }

    /// Runs while a session is attached: a fixed-interval ping driver races
    /// a connectedness-changed observer and the shutdown signal. The first
    /// to complete wins.
    async fn run_connected(&self) {
        let mut connected_rx = self.manager.watch_connected();
        let mut ping_ticker = tokio::time::interval(self.ping_interval);
        ping_ticker.tick().await; // first tick fires immediately; consume it

        loop {
            tokio::select! {
                _ = ping_ticker.tick() => {
                    self.manager.send_ping().await;
                }
                changed = connected_rx.changed() => {
                    if changed.is_err() || !*connected_rx.borrow() {
                        break;
                    }
                }
                _ = self.shutdown_notify.notified() => {
                    if self.manager.is_connected() {
                        self.manager.close_current_session(1000, "shutdown").await;
                    }
                    break;
                }
            }
        }
    }

    async fn sleep_backoff(&self) {
        tokio::select! {
            _ = tokio::time::sleep(self.backoff) => {}
            _ = self.shutdown_notify.notified() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_interval_has_a_reasonable_floor() {
        let manager = BridgeManager::new(None);
        let config = Config {
            bridge_host: "127.0.0.1".to_string(),
            bridge_port: 1,
            reconnect_interval_ms: 10,
            bridge_token: None,
            state_dir: std::path::PathBuf::from("."),
            log_level: "info".to_string(),
            log_dir: None,
        };
        let supervisor = ReconnectSupervisor::new(manager, &config);
        assert!(supervisor.ping_interval >= MIN_PING_INTERVAL);
        assert!(supervisor.backoff >= Duration::from_millis(MIN_BACKOFF_MS));
    }
}
