// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::context::LogEntry;
use crate::works::workflow::types::NodeType;

/// Progress notifications emitted while a workflow runs, streamed over SSE
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEvent {
    Started {
        execution_id: String,
        workflow_id: String,
    },
    NodeStarted {
        node_id: String,
        node_type: NodeType,
    },
    NodeCompleted {
        node_id: String,
        output: Value,
        duration_ms: u64,
    },
    NodeFailed {
        node_id: String,
        error: String,
    },
    Log(LogEntry),
    Completed {
        execution_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
    },
    Failed {
        execution_id: String,
        error: String,
    },
}

impl ExecutionEvent {
    /// Whether this is the last event of a run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionEvent::Completed { .. } | ExecutionEvent::Failed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_format() {
        let event = ExecutionEvent::NodeStarted {
            node_id: "fetch".to_string(),
            node_type: NodeType::ApiCall,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "node_started", "node_id": "fetch", "node_type": "api-call"})
        );
        assert!(!event.is_terminal());

        let done = ExecutionEvent::Completed {
            execution_id: "x".to_string(),
            output: None,
        };
        assert_eq!(
            serde_json::to_value(&done).unwrap(),
            json!({"type": "completed", "execution_id": "x"})
        );
        assert!(done.is_terminal());
    }
}
