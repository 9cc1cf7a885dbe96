//! Error kinds shared by the bridge and the MCP tool surface.

use std::time::Duration;

/// Everything that can go wrong between a tool call arriving and a result
/// going back out. Named semantically so the dispatcher can shape a
/// different reply per kind rather than matching on message text.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Unity bridge is not connected")]
    NotConnected,

    #[error("tool \"{tool}\" timed out after {timeout:?}")]
    ToolTimeout { tool: String, timeout: Duration },

    #[error("{0}")]
    ToolFailed(String),

    #[error("Unity bridge disconnected")]
    BridgeDisconnected,

    #[error("Unity bridge reattached to a new session")]
    BridgeReattached,

    #[error(
        "compilation did not complete within {timeout:?}; consider increasing timeoutSeconds for large projects"
    )]
    CompilationTimeout { timeout: Duration },

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("failed to decode bridge frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to persist batch queue state: {0}")]
    Persist(#[source] std::io::Error),
}
