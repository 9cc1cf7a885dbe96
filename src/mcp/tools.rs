//! Tool catalog (data only — §9 explicitly calls large static schema
//! tables boring and not worth engineering). Grounded on `mcp/tools.rs`'s
//! `get_all_tools`/`get_tool_by_name` shape; tool names are the MCP-facing
//! names from `original_source/.../batch_sequential.py`'s
//! `TOOL_NAME_MAPPING` keys, which this catalog's entries mirror one for
//! one (see `dispatcher::resolve_tool_name` for the name mapping itself).

use serde_json::{json, Value};

use super::types::McpTool;

pub const PING_TOOL: &str = "unity_ping";
pub const COMPILATION_AWAIT_TOOL: &str = "unity_compilation_await";
pub const BATCH_EXECUTE_TOOL: &str = "unity_batch_sequential_execute";

/// `(mcp name, human description)`. Schemas are generated uniformly below
/// except for the handful of tools the dispatcher special-cases, which get
/// a schema that documents their distinct shape.
const GENERIC_TOOLS: &[(&str, &str)] = &[
    ("unity_scene_crud", "Create, read, update, or delete Unity scenes."),
    ("unity_gameobject_crud", "Create, read, update, or delete GameObjects."),
    ("unity_component_crud", "Create, read, update, or delete components on a GameObject."),
    ("unity_asset_crud", "Create, read, update, or delete a Unity asset (scripts, prefabs, etc.)."),
    ("unity_scriptableObject_crud", "Create, read, update, or delete a ScriptableObject asset."),
    ("unity_prefab_crud", "Create, read, update, or delete a prefab."),
    ("unity_vector_sprite_convert", "Convert a vector asset to a sprite."),
    ("unity_projectSettings_crud", "Read or update Unity project settings."),
    ("unity_transform_batch", "Apply a batch of transform operations."),
    ("unity_rectTransform_batch", "Apply a batch of RectTransform operations."),
    ("unity_physics_bundle", "Configure a bundle of physics components."),
    ("unity_camera_rig", "Configure a camera rig."),
    ("unity_ui_foundation", "Configure foundational UI elements (Canvas, EventSystem)."),
    ("unity_audio_source_bundle", "Configure an audio source bundle."),
    ("unity_input_profile", "Configure an input action profile."),
    ("unity_character_controller_bundle", "Configure a character controller bundle."),
    ("unity_tilemap_bundle", "Configure a tilemap bundle."),
    ("unity_sprite2d_bundle", "Configure a 2D sprite bundle."),
    ("unity_animation2d_bundle", "Configure a 2D animation bundle."),
    ("unity_ui_hierarchy", "Inspect or restructure a UI hierarchy."),
    ("unity_ui_state", "Read or set UI element state."),
    ("unity_ui_navigation", "Configure UI navigation wiring."),
    ("unity_playmode_control", "Enter, exit, or pause Play Mode."),
    ("unity_console_log", "Read the Unity console log."),
    ("unity_material_bundle", "Configure a material bundle."),
    ("unity_light_bundle", "Configure a light bundle."),
    ("unity_particle_bundle", "Configure a particle system bundle."),
    ("unity_animation3d_bundle", "Configure a 3D animation bundle."),
    ("unity_event_wiring", "Wire UnityEvent callbacks between components."),
    ("unity_gamekit_actor", "Configure a GameKit actor."),
    ("unity_gamekit_manager", "Configure a GameKit manager."),
    ("unity_gamekit_interaction", "Configure a GameKit interaction."),
    ("unity_gamekit_ui_command", "Issue a GameKit UI command."),
    ("unity_gamekit_machinations", "Configure GameKit machinations."),
    ("unity_gamekit_sceneflow", "Configure GameKit scene flow."),
    ("unity_gamekit_health", "Configure GameKit health."),
    ("unity_gamekit_spawner", "Configure a GameKit spawner."),
    ("unity_gamekit_timer", "Configure a GameKit timer."),
    ("unity_gamekit_ai", "Configure GameKit AI."),
    ("unity_gamekit_collectible", "Configure a GameKit collectible."),
    ("unity_gamekit_projectile", "Configure a GameKit projectile."),
    ("unity_gamekit_waypoint", "Configure a GameKit waypoint."),
    ("unity_gamekit_trigger_zone", "Configure a GameKit trigger zone."),
    ("unity_gamekit_animation_sync", "Configure GameKit animation sync."),
    ("unity_gamekit_effect", "Configure a GameKit effect."),
    ("unity_gamekit_save", "Configure GameKit save data."),
    ("unity_gamekit_inventory", "Configure a GameKit inventory."),
    ("unity_gamekit_dialogue", "Configure GameKit dialogue."),
    ("unity_gamekit_quest", "Configure a GameKit quest."),
    ("unity_gamekit_status_effect", "Configure a GameKit status effect."),
    ("unity_gamekit_ui_binding", "Configure a GameKit UI binding."),
    ("unity_gamekit_ui_list", "Configure a GameKit UI list."),
    ("unity_gamekit_ui_slot", "Configure a GameKit UI slot."),
    ("unity_gamekit_ui_selection", "Configure GameKit UI selection."),
    ("unity_gamekit_combat", "Configure GameKit combat."),
    ("unity_gamekit_feedback", "Configure GameKit feedback."),
    ("unity_gamekit_vfx", "Configure GameKit VFX."),
    ("unity_gamekit_audio", "Configure GameKit audio."),
];

fn generic_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "operation": {
                "type": "string",
                "description": "The operation to perform; tool-specific.",
            },
            "timeoutSeconds": {
                "type": "integer",
                "description": "Optional per-call deadline hint passed through to Unity.",
            },
        },
        "additionalProperties": true,
    })
}

fn ping_schema() -> Value {
    json!({"type": "object", "additionalProperties": false})
}

fn compilation_await_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "timeoutSeconds": {
                "type": "integer",
                "description": "How long to wait for the next compilation to complete.",
                "default": 60,
            },
        },
        "additionalProperties": false,
    })
}

fn batch_execute_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "operations": {
                "type": "array",
                "description": "Operations to run in order. Each has 'tool' and 'arguments'.",
                "items": {
                    "type": "object",
                    "properties": {
                        "tool": {"type": "string"},
                        "arguments": {"type": "object"},
                    },
                    "required": ["tool", "arguments"],
                },
            },
            "resume": {
                "type": "boolean",
                "description": "Resume from the previously failed operation instead of starting fresh.",
                "default": false,
            },
            "stop_on_error": {
                "type": "boolean",
                "description": "Stop at the first failing operation so it can be retried with resume=true.",
                "default": true,
            },
        },
        "required": ["operations"],
    })
}

pub fn get_all_tools() -> Vec<McpTool> {
    let mut tools = vec![
        McpTool {
            name: PING_TOOL.to_string(),
            description: "Check whether the Unity Editor bridge is connected and responsive.".to_string(),
            input_schema: ping_schema(),
        },
        McpTool {
            name: COMPILATION_AWAIT_TOOL.to_string(),
            description: "Wait for the next Unity script compilation to finish.".to_string(),
            input_schema: compilation_await_schema(),
        },
        McpTool {
            name: BATCH_EXECUTE_TOOL.to_string(),
            description: "Execute a list of Unity operations sequentially, stopping on the first error and allowing resume.".to_string(),
            input_schema: batch_execute_schema(),
        },
    ];
    tools.extend(GENERIC_TOOLS.iter().map(|(name, description)| McpTool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: generic_schema(),
    }));
    tools
}

pub fn get_tool_by_name(name: &str) -> Option<McpTool> {
    get_all_tools().into_iter().find(|tool| tool.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_pure_across_repeated_calls() {
        let first = get_all_tools();
        let second = get_all_tools();
        let first_json = serde_json::to_string(&first).unwrap();
        let second_json = serde_json::to_string(&second).unwrap();
        assert_eq!(first_json, second_json);
    }

    #[test]
    fn special_cased_tools_are_present() {
        assert!(get_tool_by_name(PING_TOOL).is_some());
        assert!(get_tool_by_name(COMPILATION_AWAIT_TOOL).is_some());
        assert!(get_tool_by_name(BATCH_EXECUTE_TOOL).is_some());
    }

    #[test]
    fn unknown_tool_name_is_absent() {
        assert!(get_tool_by_name("unity_does_not_exist").is_none());
    }
}
