// SPDX-License-Identifier: MIT

//! Per-run execution state

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::works::workflow::state::{Variables, INPUT_KEY};
use crate::works::workflow::types::{NodeType, Workflow};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Success,
    Failed,
}

/// Outcome of one node execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeResult {
    pub node_id: String,
    pub node_type: NodeType,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl NodeResult {
    pub fn is_success(&self) -> bool {
        self.status == NodeStatus::Success
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

/// A message written by a `log` node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub node_id: String,
    pub message: String,
}

/// Everything recorded while running one workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub execution_id: String,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub input: Value,
    pub variables: Variables,
    pub node_results: Vec<NodeResult>,
    pub logs: Vec<LogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Node whose edge scheduled the node currently running
    #[serde(skip)]
    pub(crate) predecessor: Option<String>,
}

impl ExecutionContext {
    /// Fresh running context with the workflow's variable defaults and the input
    pub fn new(workflow: &Workflow, input: Value) -> Self {
        let mut variables = Variables::new(&workflow.variables);
        variables.update(INPUT_KEY, input.clone());

        Self {
            execution_id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow.id.clone(),
            status: ExecutionStatus::Running,
            input,
            variables,
            node_results: Vec::new(),
            logs: Vec::new(),
            final_output: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
            predecessor: None,
        }
    }

    /// Output of the node that led to the running one along its incoming edge.
    ///
    /// `None` for the start node.
    pub fn previous_output(&self) -> Option<&Value> {
        let id = self.predecessor.as_deref()?;
        self.result(id)
            .filter(|r| r.is_success())
            .and_then(|r| r.output.as_ref())
    }

    pub fn result(&self, node_id: &str) -> Option<&NodeResult> {
        self.node_results.iter().find(|r| r.node_id == node_id)
    }

    pub fn is_completed(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }

    /// Wall time of the run so far, or in total once finished
    pub fn duration_ms(&self) -> i64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds()
    }

    pub(crate) fn complete(&mut self) {
        self.status = ExecutionStatus::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn fail(&mut self, error: impl Into<String>) {
        self.status = ExecutionStatus::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
    }
}
