//! Entry point: wires configuration, logging, the Unity bridge, and the MCP
//! stdio server together, then runs until shutdown. Grounded on the
//! teacher's top-level process wiring in `main.rs` and `logging.rs`.

mod bridge;
mod config;
mod error;
mod mcp;

use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use bridge::{BridgeManager, ReconnectSupervisor};
use config::Config;
use mcp::{BatchExecutor, ToolDispatcher};

fn init_logging(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    // All diagnostic logging goes to stderr, never stdout: stdout is the
    // MCP JSON-RPC channel and a stray log line there would corrupt it.
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(true);

    match &config.log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "unity-mcp-bridge.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer =
                tracing_subscriber::fmt::layer().with_writer(non_blocking).json().with_target(true);
            Registry::default().with(filter).with(stderr_layer).with(file_layer).init();
            Some(guard)
        }
        None => {
            Registry::default().with(filter).with(stderr_layer).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let _log_guard = init_logging(&config);

    tracing::info!(
        bridge_url = %config.bridge_url(),
        state_dir = %config.state_dir.display(),
        "starting unity-mcp-bridge"
    );

    let manager: Arc<BridgeManager> = BridgeManager::new(config.bridge_token.clone());
    manager.on_connected(|| tracing::info!("unity bridge connected"));
    manager.on_disconnected(|| tracing::warn!("unity bridge disconnected"));

    let supervisor = Arc::new(ReconnectSupervisor::new(manager.clone(), &config));
    let supervisor_handle = tokio::spawn(supervisor.clone().run());

    let batch = BatchExecutor::new(&config.state_dir);
    let dispatcher = ToolDispatcher::new(manager.clone(), batch);

    tokio::select! {
        result = mcp::run_stdio_server(dispatcher) => {
            if let Err(err) = result {
                tracing::error!(error = %err, "mcp stdio server exited with an error");
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    supervisor.stop();
    supervisor_handle.await.ok();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        signal.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
