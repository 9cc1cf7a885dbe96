//! Wire protocol (C1): the tagged-union JSON messages exchanged with the
//! Unity Editor bridge plugin over the WebSocket link.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages this server ever sends to Unity.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "ping")]
    Ping { timestamp: i64 },

    #[serde(rename = "command:execute")]
    CommandExecute {
        #[serde(rename = "commandId")]
        command_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        payload: Value,
    },

    #[serde(rename = "server:info")]
    ServerInfo {
        #[serde(rename = "clientInfo")]
        client_info: Value,
    },
}

/// Messages Unity ever sends to this server. An unrecognized `type` decodes
/// to `Unknown` rather than failing, per the forward-compatibility rule in
/// §4.1 — only a recognized `type` with a malformed payload is a decode
/// error.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    #[serde(rename = "hello")]
    Hello(HelloMessage),

    #[serde(rename = "heartbeat")]
    Heartbeat { timestamp: i64 },

    #[serde(rename = "context:update")]
    ContextUpdate { payload: Value },

    #[serde(rename = "command:result")]
    CommandResult(CommandResultMessage),

    #[serde(rename = "compilation:started")]
    CompilationStarted { timestamp: i64 },

    #[serde(rename = "compilation:progress")]
    CompilationProgress {
        status: String,
        #[serde(rename = "elapsedSeconds")]
        elapsed_seconds: f64,
    },

    #[serde(rename = "compilation:complete")]
    CompilationComplete { result: CompilationResult },

    #[serde(rename = "bridge:restarted")]
    BridgeRestarted {
        reason: String,
        #[serde(rename = "sessionId")]
        session_id: Option<String>,
    },

    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloMessage {
    pub session_id: String,
    pub unity_version: String,
    pub project_name: String,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResultMessage {
    pub command_id: String,
    pub ok: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// The result record carried by `compilation:complete`, or synthesized for
/// `bridge:restarted` (see §4.4). `bridge_restarted`/`reason` are only
/// populated in the synthetic case, distinguishing the two per the
/// CompilationWaiter invariant in §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationResult {
    pub success: bool,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub has_errors: bool,
    #[serde(default)]
    pub has_warnings: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub error_count: u32,
    #[serde(default)]
    pub warning_count: u32,
    #[serde(default)]
    pub elapsed_seconds: f64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub bridge_restarted: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

impl CompilationResult {
    /// The sentinel result a `bridge:restarted` event resolves waiters
    /// with: a successful-looking result distinct from a true
    /// `compilation:complete`, per the §3 invariant.
    pub fn bridge_restarted(reason: String) -> Self {
        CompilationResult {
            success: true,
            completed: true,
            has_errors: false,
            has_warnings: false,
            errors: Vec::new(),
            warnings: Vec::new(),
            error_count: 0,
            warning_count: 0,
            elapsed_seconds: 0.0,
            message: None,
            bridge_restarted: true,
            reason: Some(reason),
        }
    }
}

/// Decodes a single JSON text frame into its tagged variant. A frame that
/// fails to decode (unknown structure for a known `type`, or invalid JSON
/// entirely) is returned as an error for the caller to log and drop — it
/// never closes the link.
pub fn decode_inbound(text: &str) -> Result<InboundMessage, serde_json::Error> {
    serde_json::from_str(text)
}

pub fn encode_outbound(message: &OutboundMessage) -> String {
    serde_json::to_string(message).expect("OutboundMessage variants are always representable as JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_hello() {
        let text = json!({
            "type": "hello",
            "sessionId": "abc",
            "unityVersion": "2022.3.10f1",
            "projectName": "Demo",
        })
        .to_string();
        match decode_inbound(&text).unwrap() {
            InboundMessage::Hello(hello) => {
                assert_eq!(hello.session_id, "abc");
                assert_eq!(hello.unity_version, "2022.3.10f1");
                assert!(hello.token.is_none());
            }
            other => panic!("expected Hello, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_type_decodes_to_unknown_not_error() {
        let text = json!({"type": "future:frame", "whatever": 1}).to_string();
        assert!(matches!(decode_inbound(&text).unwrap(), InboundMessage::Unknown));
    }

    #[test]
    fn malformed_known_type_is_a_decode_error() {
        let text = json!({"type": "command:result", "commandId": "x"}).to_string();
        assert!(decode_inbound(&text).is_err());
    }

    #[test]
    fn command_execute_encodes_expected_shape() {
        let message = OutboundMessage::CommandExecute {
            command_id: "c1".to_string(),
            tool_name: "ping".to_string(),
            payload: json!({}),
        };
        let encoded: Value = serde_json::from_str(&encode_outbound(&message)).unwrap();
        assert_eq!(encoded["type"], "command:execute");
        assert_eq!(encoded["commandId"], "c1");
        assert_eq!(encoded["toolName"], "ping");
    }

    #[test]
    fn bridge_restarted_sentinel_is_distinct_from_real_completion() {
        let sentinel = CompilationResult::bridge_restarted("assemblyReload".to_string());
        assert!(sentinel.bridge_restarted);
        assert_eq!(sentinel.reason.as_deref(), Some("assemblyReload"));

        let real = CompilationResult {
            success: true,
            completed: true,
            has_errors: false,
            has_warnings: false,
            errors: Vec::new(),
            warnings: Vec::new(),
            error_count: 0,
            warning_count: 0,
            elapsed_seconds: 1.2,
            message: None,
            bridge_restarted: false,
            reason: None,
        };
        assert!(!real.bridge_restarted);
    }
}
