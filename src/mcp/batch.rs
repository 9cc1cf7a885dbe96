//! Sequential batch executor (C8): runs a list of tool calls against the
//! bridge one at a time, persisting queue state to disk so a failed batch
//! can be resumed. Grounded field-for-field on
//! `original_source/.../batch_sequential.py`'s `BatchQueueState`/
//! `BatchQueueManager`/`execute_batch_sequential`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use super::dispatcher::resolve_tool_name;
use crate::bridge::BridgeManager;
use crate::error::BridgeError;

const STATE_FILE_NAME: &str = ".batch_queue_state.json";
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchOperation {
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchErrorEntry {
    pub index: usize,
    pub tool: String,
    pub error: String,
    pub exception: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub success: bool,
    pub completed: Vec<Value>,
    pub errors: Vec<BatchErrorEntry>,
    pub total_operations: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped_at_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_operations: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct BatchQueueState {
    #[serde(default)]
    operations: Vec<BatchOperation>,
    #[serde(default)]
    current_index: usize,
    #[serde(default)]
    last_error: Option<String>,
    #[serde(default)]
    last_error_index: Option<usize>,
    #[serde(default)]
    started_at: Option<i64>,
    #[serde(default)]
    last_updated: Option<i64>,
}

impl BatchQueueState {
    fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
            Err(_) => BatchQueueState::default(),
        }
    }

    /// The on-disk/tool-facing form: the stored fields plus the computed
    /// `remaining_count`/`completed_count`/`total_count` trio the persisted
    /// state layout requires alongside them.
    fn to_dict(&self) -> Value {
        let mut body = serde_json::to_value(self).expect("BatchQueueState is always representable as JSON");
        let total_count = self.operations.len();
        let completed_count = self.current_index;
        let remaining_count = total_count - completed_count;
        let object = body.as_object_mut().expect("BatchQueueState serializes to a JSON object");
        object.insert("remaining_count".to_string(), json!(remaining_count));
        object.insert("completed_count".to_string(), json!(completed_count));
        object.insert("total_count".to_string(), json!(total_count));
        body
    }

    fn save(&self, path: &Path) -> Result<(), BridgeError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(BridgeError::Persist)?;
        }
        let body = serde_json::to_string_pretty(&self.to_dict())?;
        let mut temp = tempfile::NamedTempFile::new_in(path.parent().unwrap_or_else(|| Path::new(".")))
            .map_err(BridgeError::Persist)?;
        use std::io::Write;
        temp.write_all(body.as_bytes()).map_err(BridgeError::Persist)?;
        temp.persist(path).map_err(|err| BridgeError::Persist(err.error))?;
        Ok(())
    }

    fn clear(&mut self, path: &Path) {
        *self = BatchQueueState::default();
        let _ = std::fs::remove_file(path);
    }
}

pub struct BatchExecutor {
    state_path: PathBuf,
    state: Mutex<BatchQueueState>,
}

impl BatchExecutor {
    pub fn new(state_dir: &Path) -> Self {
        let state_path = state_dir.join(STATE_FILE_NAME);
        let state = BatchQueueState::load(&state_path);
        BatchExecutor { state_path, state: Mutex::new(state) }
    }

    pub async fn execute(
        &self,
        manager: &BridgeManager,
        operations: Vec<BatchOperation>,
        resume: bool,
        stop_on_error: bool,
    ) -> Result<BatchReport, BridgeError> {
        let mut state = self.state.lock().await;

        if !resume || state.operations.is_empty() {
            state.operations = operations;
            state.current_index = 0;
            state.last_error = None;
            state.last_error_index = None;
            state.started_at = Some(now_millis());
        }
        state.last_updated = Some(now_millis());
        state.save(&self.state_path)?;

        let mut completed = Vec::new();
        let mut errors = Vec::new();

        while state.current_index < state.operations.len() {
            let index = state.current_index;
            let operation = state.operations[index].clone();

            let tool_name = match resolve_tool_name(&operation.tool) {
                Ok(name) => name,
                Err(err) => {
                    let entry = BatchErrorEntry {
                        index,
                        tool: operation.tool.clone(),
                        error: err.to_string(),
                        exception: true,
                    };
                    state.last_error = Some(entry.error.clone());
                    state.last_error_index = Some(index);
                    errors.push(entry);
                    if stop_on_error {
                        return Ok(self.stop_report(&mut state, completed, errors, index).await?);
                    }
                    state.current_index += 1;
                    state.save(&self.state_path)?;
                    continue;
                }
            };

            match manager.send_command(&tool_name, operation.arguments.clone(), DEFAULT_COMMAND_TIMEOUT).await {
                Ok(result) => {
                    completed.push(result);
                    state.current_index += 1;
                    state.save(&self.state_path)?;
                }
                Err(err) => {
                    let entry = BatchErrorEntry {
                        index,
                        tool: operation.tool.clone(),
                        error: err.to_string(),
                        exception: true,
                    };
                    state.last_error = Some(entry.error.clone());
                    state.last_error_index = Some(index);
                    errors.push(entry);
                    if stop_on_error {
                        return Ok(self.stop_report(&mut state, completed, errors, index).await?);
                    }
                    state.current_index += 1;
                    state.save(&self.state_path)?;
                }
            }
        }

        let total_operations = state.operations.len();
        state.clear(&self.state_path);

        let message = if errors.is_empty() {
            format!("All {total_operations} operations completed successfully.")
        } else {
            format!("Completed with {} error(s).", errors.len())
        };

        Ok(BatchReport {
            success: errors.is_empty(),
            completed,
            errors,
            total_operations,
            message,
            stopped_at_index: None,
            remaining_operations: None,
        })
    }

    async fn stop_report(
        &self,
        state: &mut BatchQueueState,
        completed: Vec<Value>,
        errors: Vec<BatchErrorEntry>,
        stopped_at_index: usize,
    ) -> Result<BatchReport, BridgeError> {
        state.save(&self.state_path)?;
        let remaining = state.operations.len() - stopped_at_index;
        let total_operations = state.operations.len();
        Ok(BatchReport {
            success: false,
            completed,
            errors,
            total_operations,
            message: "Stopped due to error. Use resume=true to continue.".to_string(),
            stopped_at_index: Some(stopped_at_index),
            remaining_operations: Some(remaining),
        })
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_state_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[tokio::test]
    async fn unknown_tool_name_stops_the_batch_with_stop_on_error() {
        let dir = temp_state_dir();
        let executor = BatchExecutor::new(dir.path());
        let manager = BridgeManager::new(None);
        let ops = vec![BatchOperation { tool: "not_a_real_tool".to_string(), arguments: json!({}) }];
        let report = executor.execute(&manager, ops, false, true).await.unwrap();
        assert!(!report.success);
        assert_eq!(report.stopped_at_index, Some(0));
        assert_eq!(report.remaining_operations, Some(1));
    }

    #[tokio::test]
    async fn disconnected_bridge_fails_every_operation_when_not_stopping() {
        let dir = temp_state_dir();
        let executor = BatchExecutor::new(dir.path());
        let manager = BridgeManager::new(None);
        let ops = vec![
            BatchOperation { tool: "ping".to_string(), arguments: json!({}) },
            BatchOperation { tool: "ping".to_string(), arguments: json!({}) },
        ];
        let report = executor.execute(&manager, ops, false, false).await.unwrap();
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.total_operations, 2);
        assert!(report.stopped_at_index.is_none());
    }

    #[tokio::test]
    async fn state_file_is_cleared_after_full_completion_with_no_errors() {
        let dir = temp_state_dir();
        let executor = BatchExecutor::new(dir.path());
        let manager = BridgeManager::new(None);
        let report = executor.execute(&manager, Vec::new(), false, true).await.unwrap();
        assert!(report.success);
        assert!(!executor.state_path.exists());
    }

    #[tokio::test]
    async fn persisted_state_carries_the_computed_count_fields() {
        let dir = temp_state_dir();
        let executor = BatchExecutor::new(dir.path());
        let manager = BridgeManager::new(None);
        let ops = vec![BatchOperation { tool: "not_a_real_tool".to_string(), arguments: json!({}) }];
        let _ = executor.execute(&manager, ops, false, true).await.unwrap();

        let text = std::fs::read_to_string(&executor.state_path).unwrap();
        let persisted: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(persisted["total_count"], json!(1));
        assert_eq!(persisted["completed_count"], json!(0));
        assert_eq!(persisted["remaining_count"], json!(1));
    }
}
