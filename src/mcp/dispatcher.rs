//! Tool dispatcher (C7): resolves an MCP tool call into a bridge command,
//! shapes the reply, and special-cases the handful of tools called out in
//! §4.7. Grounded on `mcp/executor.rs`'s `execute_tool`/
//! `execute_bridge_tool`; the name-mapping table and timeout formula are
//! grounded on `original_source/.../register_tools.py` and
//! `batch_sequential.py`'s `resolve_tool_name`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use serde_json::{json, Value};

use super::batch::BatchExecutor;
use super::tools::{self, BATCH_EXECUTE_TOOL, COMPILATION_AWAIT_TOOL, PING_TOOL};
use super::types::{render_result_text, ToolCallResult};
use crate::bridge::BridgeManager;
use crate::error::BridgeError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);
const COMPILATION_AWAIT_DEFAULT: Duration = Duration::from_secs(60);
const TIMEOUT_BUFFER: Duration = Duration::from_secs(20);
const COMPILATION_POLL_WINDOW: Duration = Duration::from_secs(5);
const COMPILATION_POLL_INTERVAL: Duration = Duration::from_millis(200);
const ASSET_COMPILE_WAIT: Duration = Duration::from_secs(60);
const PING_ROUND_TRIP_TIMEOUT: Duration = Duration::from_secs(10);

/// MCP-facing name -> internal bridge-facing name, ported field for field
/// from `TOOL_NAME_MAPPING` in `batch_sequential.py`.
static TOOL_NAME_MAPPING: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("unity_ping", "ping"),
        ("unity_compilation_await", "compilationAwait"),
        ("unity_scene_crud", "scene"),
        ("unity_gameobject_crud", "gameObject"),
        ("unity_component_crud", "component"),
        ("unity_asset_crud", "asset"),
        ("unity_scriptableObject_crud", "scriptableObject"),
        ("unity_prefab_crud", "prefab"),
        ("unity_vector_sprite_convert", "sprite"),
        ("unity_projectSettings_crud", "projectSettingsManage"),
        ("unity_transform_batch", "transformBatch"),
        ("unity_rectTransform_batch", "rectTransformBatch"),
        ("unity_physics_bundle", "physicsBundle"),
        ("unity_camera_rig", "cameraRig"),
        ("unity_ui_foundation", "uiFoundation"),
        ("unity_audio_source_bundle", "audioSourceBundle"),
        ("unity_input_profile", "inputProfile"),
        ("unity_character_controller_bundle", "characterControllerBundle"),
        ("unity_tilemap_bundle", "tilemapBundle"),
        ("unity_sprite2d_bundle", "sprite2DBundle"),
        ("unity_animation2d_bundle", "animation2DBundle"),
        ("unity_ui_hierarchy", "uiHierarchy"),
        ("unity_ui_state", "uiState"),
        ("unity_ui_navigation", "uiNavigation"),
        ("unity_playmode_control", "playModeControl"),
        ("unity_console_log", "consoleLog"),
        ("unity_material_bundle", "materialBundle"),
        ("unity_light_bundle", "lightBundle"),
        ("unity_particle_bundle", "particleBundle"),
        ("unity_animation3d_bundle", "animation3DBundle"),
        ("unity_event_wiring", "eventWiring"),
        ("unity_gamekit_actor", "gamekitActor"),
        ("unity_gamekit_manager", "gamekitManager"),
        ("unity_gamekit_interaction", "gamekitInteraction"),
        ("unity_gamekit_ui_command", "gamekitUICommand"),
        ("unity_gamekit_machinations", "gamekitMachinations"),
        ("unity_gamekit_sceneflow", "gamekitSceneFlow"),
        ("unity_gamekit_health", "gamekitHealth"),
        ("unity_gamekit_spawner", "gamekitSpawner"),
        ("unity_gamekit_timer", "gamekitTimer"),
        ("unity_gamekit_ai", "gamekitAI"),
        ("unity_gamekit_collectible", "gamekitCollectible"),
        ("unity_gamekit_projectile", "gamekitProjectile"),
        ("unity_gamekit_waypoint", "gamekitWaypoint"),
        ("unity_gamekit_trigger_zone", "gamekitTriggerZone"),
        ("unity_gamekit_animation_sync", "gamekitAnimationSync"),
        ("unity_gamekit_effect", "gamekitEffect"),
        ("unity_gamekit_save", "gamekitSave"),
        ("unity_gamekit_inventory", "gamekitInventory"),
        ("unity_gamekit_dialogue", "gamekitDialogue"),
        ("unity_gamekit_quest", "gamekitQuest"),
        ("unity_gamekit_status_effect", "gamekitStatusEffect"),
        ("unity_gamekit_ui_binding", "gamekitUIBinding"),
        ("unity_gamekit_ui_list", "gamekitUIList"),
        ("unity_gamekit_ui_slot", "gamekitUISlot"),
        ("unity_gamekit_ui_selection", "gamekitUISelection"),
        ("unity_gamekit_combat", "gamekitCombat"),
        ("unity_gamekit_feedback", "gamekitFeedback"),
        ("unity_gamekit_vfx", "gamekitVFX"),
        ("unity_gamekit_audio", "gamekitAudio"),
    ])
});

/// Resolves an MCP-facing or already-internal tool name to its
/// bridge-facing form. Identity if `name` is already a known internal
/// name; `ErrUnknownTool` if it is neither.
pub fn resolve_tool_name(name: &str) -> Result<String, BridgeError> {
    if let Some(internal) = TOOL_NAME_MAPPING.get(name) {
        return Ok((*internal).to_string());
    }
    if TOOL_NAME_MAPPING.values().any(|internal| *internal == name) {
        return Ok(name.to_string());
    }
    Err(BridgeError::UnknownTool(name.to_string()))
}

/// `(arguments.timeoutSeconds + 20) * 1000ms` if present, else 45s.
pub fn compute_timeout(arguments: &Value) -> Duration {
    match arguments.get("timeoutSeconds").and_then(Value::as_u64) {
        Some(seconds) => Duration::from_secs(seconds) + TIMEOUT_BUFFER,
        None => DEFAULT_TIMEOUT,
    }
}

fn is_candidate_for_compile_wait(bridge_name: &str, arguments: &Value) -> bool {
    if bridge_name != "asset" {
        return false;
    }
    let operation = arguments.get("operation").and_then(Value::as_str).unwrap_or("");
    if !matches!(operation, "create" | "update" | "delete") {
        return false;
    }
    arguments
        .get("path")
        .and_then(Value::as_str)
        .map(|path| path.ends_with(".cs"))
        .unwrap_or(false)
}

pub struct ToolDispatcher {
    manager: Arc<BridgeManager>,
    batch: BatchExecutor,
}

impl ToolDispatcher {
    pub fn new(manager: Arc<BridgeManager>, batch: BatchExecutor) -> Self {
        ToolDispatcher { manager, batch }
    }

    pub fn list_tools(&self) -> Vec<super::types::McpTool> {
        tools::get_all_tools()
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> ToolCallResult {
        if tools::get_tool_by_name(name).is_none() {
            return ToolCallResult::error_text(BridgeError::UnknownTool(name.to_string()).to_string());
        }

        match name {
            PING_TOOL => return self.call_ping().await,
            COMPILATION_AWAIT_TOOL => return self.call_compilation_await(arguments).await,
            BATCH_EXECUTE_TOOL => return self.call_batch_execute(arguments).await,
            _ => {}
        }

        let bridge_name = match resolve_tool_name(name) {
            Ok(resolved) => resolved,
            Err(err) => return ToolCallResult::error_text(err.to_string()),
        };

        if !self.manager.is_connected() {
            return ToolCallResult::error_text(BridgeError::NotConnected.to_string());
        }

        let timeout = compute_timeout(&arguments);
        let wants_compile_wait = is_candidate_for_compile_wait(&bridge_name, &arguments);
        match self.manager.send_command(&bridge_name, arguments, timeout).await {
            Ok(result) => {
                if wants_compile_wait {
                    self.merge_compile_wait(result).await
                } else {
                    ToolCallResult::text(render_result_text(&result))
                }
            }
            Err(err) => ToolCallResult::error_text(err.to_string()),
        }
    }

    async fn call_ping(&self) -> ToolCallResult {
        let connected = self.manager.is_connected();
        let last_heartbeat_at = self.manager.last_heartbeat_at();
        let bridge_response = if connected {
            self.manager
                .send_command("pingUnityEditor", json!({}), PING_ROUND_TRIP_TIMEOUT)
                .await
                .ok()
        } else {
            None
        };
        let body = json!({
            "connected": connected,
            "lastHeartbeatAt": last_heartbeat_at,
            "bridgeResponse": bridge_response,
        });
        ToolCallResult::text(render_result_text(&body))
    }

    async fn call_compilation_await(&self, arguments: Value) -> ToolCallResult {
        let timeout_seconds = arguments.get("timeoutSeconds").and_then(Value::as_u64).unwrap_or(60);
        let total_timeout = Duration::from_secs(timeout_seconds);
        let start = Instant::now();

        let mut was_compiling = self.manager.is_compiling();
        if !was_compiling {
            let poll_deadline = start + COMPILATION_POLL_WINDOW.min(total_timeout);
            while Instant::now() < poll_deadline {
                if self.manager.is_compiling() {
                    was_compiling = true;
                    break;
                }
                tokio::time::sleep(COMPILATION_POLL_INTERVAL).await;
            }
        }

        let remaining = total_timeout.saturating_sub(start.elapsed()).max(Duration::from_millis(1));
        let outcome = self.manager.await_compilation(remaining).await;
        let elapsed_seconds = start.elapsed().as_secs_f64();

        match outcome {
            Ok(result) => ToolCallResult::text(render_result_text(&json!({
                "wasCompiling": was_compiling,
                "elapsedSeconds": elapsed_seconds,
                "result": result,
            }))),
            Err(err) => ToolCallResult::error_text(err.to_string()),
        }
    }

    async fn merge_compile_wait(&self, result: Value) -> ToolCallResult {
        match self.manager.await_compilation(ASSET_COMPILE_WAIT).await {
            Ok(compilation) => ToolCallResult::text(render_result_text(&json!({
                "result": result,
                "compilation": compilation,
            }))),
            Err(_) => ToolCallResult::text(render_result_text(&result)),
        }
    }

    async fn call_batch_execute(&self, arguments: Value) -> ToolCallResult {
        let operations = match serde_json::from_value(
            arguments.get("operations").cloned().unwrap_or(Value::Null),
        ) {
            Ok(operations) => operations,
            Err(err) => return ToolCallResult::error_text(format!("invalid operations: {err}")),
        };
        let resume = arguments.get("resume").and_then(Value::as_bool).unwrap_or(false);
        let stop_on_error = arguments.get("stop_on_error").and_then(Value::as_bool).unwrap_or(true);

        let report = self.batch.execute(&self.manager, operations, resume, stop_on_error).await;
        match report {
            Ok(report) => ToolCallResult::text(render_result_text(&serde_json::to_value(report).unwrap())),
            Err(err) => ToolCallResult::error_text(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mcp_name_resolves_to_internal_name() {
        assert_eq!(resolve_tool_name("unity_gameobject_crud").unwrap(), "gameObject");
    }

    #[test]
    fn internal_name_resolves_to_itself() {
        assert_eq!(resolve_tool_name("gameObject").unwrap(), "gameObject");
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert!(matches!(resolve_tool_name("not_a_tool"), Err(BridgeError::UnknownTool(_))));
    }

    #[test]
    fn timeout_uses_default_without_timeout_seconds() {
        assert_eq!(compute_timeout(&json!({})), DEFAULT_TIMEOUT);
    }

    #[test]
    fn timeout_adds_twenty_second_buffer() {
        assert_eq!(compute_timeout(&json!({"timeoutSeconds": 1})), Duration::from_secs(21));
    }

    #[test]
    fn cs_asset_write_is_a_compile_wait_candidate() {
        let arguments = json!({"operation": "create", "path": "Assets/Scripts/Foo.cs"});
        assert!(is_candidate_for_compile_wait("asset", &arguments));
    }

    #[test]
    fn non_cs_asset_write_is_not_a_compile_wait_candidate() {
        let arguments = json!({"operation": "create", "path": "Assets/Textures/Foo.png"});
        assert!(!is_candidate_for_compile_wait("asset", &arguments));
    }

    #[test]
    fn read_operation_is_never_a_compile_wait_candidate() {
        let arguments = json!({"operation": "read", "path": "Assets/Scripts/Foo.cs"});
        assert!(!is_candidate_for_compile_wait("asset", &arguments));
    }
}
