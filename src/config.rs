//! Process configuration: CLI flags layered over environment variables
//! layered over defaults. Precedence is explicit flag, then env var, then
//! default — resolved by hand rather than via clap's `env` feature, since
//! the flag set otherwise mirrors the minimal clap feature selection this
//! codebase already uses elsewhere.

use std::path::PathBuf;

use clap::Parser;

const DEFAULT_BRIDGE_HOST: &str = "127.0.0.1";
const DEFAULT_BRIDGE_PORT: u16 = 8787;
const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 3000;
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Parser)]
#[command(name = "unity-mcp-bridge", about = "MCP server bridging an AI client to a Unity Editor session")]
struct Args {
    /// Host Unity's bridge WebSocket listener is bound to.
    #[arg(long)]
    bridge_host: Option<String>,

    /// Port Unity's bridge WebSocket listener is bound to.
    #[arg(long)]
    bridge_port: Option<u16>,

    /// Base delay, in milliseconds, between reconnect attempts.
    #[arg(long)]
    reconnect_interval_ms: Option<u64>,

    /// Shared token Unity's handshake must present; unset disables the check.
    #[arg(long)]
    bridge_token: Option<String>,

    /// Directory the batch queue state file is persisted under.
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Log filter, e.g. "info" or "unity_mcp_bridge=debug".
    #[arg(long)]
    log_level: Option<String>,

    /// Optional directory to additionally write rolling log files into.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

/// Resolved configuration for one process run.
#[derive(Debug, Clone)]
pub struct Config {
    pub bridge_host: String,
    pub bridge_port: u16,
    pub reconnect_interval_ms: u64,
    pub bridge_token: Option<String>,
    pub state_dir: PathBuf,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Parse `std::env::args()` and layer in environment variables, falling
    /// back to built-in defaults for anything left unset.
    pub fn load() -> Self {
        Self::from_args(Args::parse())
    }

    fn from_args(args: Args) -> Self {
        Config {
            bridge_host: args
                .bridge_host
                .or_else(|| std::env::var("UNITY_BRIDGE_HOST").ok())
                .unwrap_or_else(|| DEFAULT_BRIDGE_HOST.to_string()),
            bridge_port: args
                .bridge_port
                .or_else(|| {
                    std::env::var("UNITY_BRIDGE_PORT")
                        .ok()
                        .and_then(|v| v.parse().ok())
                })
                .unwrap_or(DEFAULT_BRIDGE_PORT),
            reconnect_interval_ms: args
                .reconnect_interval_ms
                .or_else(|| {
                    std::env::var("UNITY_BRIDGE_RECONNECT_MS")
                        .ok()
                        .and_then(|v| v.parse().ok())
                })
                .unwrap_or(DEFAULT_RECONNECT_INTERVAL_MS),
            bridge_token: args
                .bridge_token
                .or_else(|| std::env::var("UNITY_BRIDGE_TOKEN").ok())
                .filter(|v| !v.is_empty()),
            state_dir: args
                .state_dir
                .or_else(|| std::env::var("UNITY_MCP_STATE_DIR").ok().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(".")),
            log_level: args
                .log_level
                .or_else(|| std::env::var("UNITY_MCP_LOG_LEVEL").ok())
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            log_dir: args
                .log_dir
                .or_else(|| std::env::var("UNITY_MCP_LOG_DIR").ok().map(PathBuf::from)),
        }
    }

    pub fn bridge_url(&self) -> String {
        format!("ws://{}:{}/bridge", self.bridge_host, self.bridge_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_set() {
        let config = Config::from_args(Args {
            bridge_host: None,
            bridge_port: None,
            reconnect_interval_ms: None,
            bridge_token: None,
            state_dir: None,
            log_level: None,
            log_dir: None,
        });
        assert_eq!(config.bridge_host, DEFAULT_BRIDGE_HOST);
        assert_eq!(config.bridge_port, DEFAULT_BRIDGE_PORT);
        assert_eq!(config.bridge_url(), "ws://127.0.0.1:8787/bridge");
    }

    #[test]
    fn explicit_flag_wins_over_default() {
        let config = Config::from_args(Args {
            bridge_host: Some("10.0.0.5".to_string()),
            bridge_port: Some(9001),
            reconnect_interval_ms: None,
            bridge_token: None,
            state_dir: None,
            log_level: None,
            log_dir: None,
        });
        assert_eq!(config.bridge_url(), "ws://10.0.0.5:9001/bridge");
    }

    #[test]
    fn empty_token_is_treated_as_unset() {
        let config = Config::from_args(Args {
            bridge_host: None,
            bridge_port: None,
            reconnect_interval_ms: None,
            bridge_token: Some(String::new()),
            state_dir: None,
            log_level: None,
            log_dir: None,
        });
        assert!(config.bridge_token.is_none());
    }
}
