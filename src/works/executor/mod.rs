// SPDX-License-Identifier: MIT

//! Node executors
//!
//! Each [`NodeType`] is handled by one [`NodeExecutor`], looked up by type in
//! an [`ExecutorRegistry`]. Executors read their settings from `Node.config`
//! and return the node's output as JSON.

mod ai_generate;
mod api_call;
mod delay;
mod flow;
mod logging;
mod transform;

pub use ai_generate::{AiGenerateConfig, AiGenerateExecutor};
pub use api_call::{ApiCallConfig, ApiCallExecutor};
pub use delay::{DelayConfig, DelayExecutor, DEFAULT_MAX_DELAY_MS};
pub use flow::{ConditionConfig, ConditionExecutor, EndConfig, EndExecutor, StartExecutor};
pub use logging::{LogConfig, LogExecutor};
pub use transform::{TransformConfig, TransformExecutor, TransformOperation};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::adk::error::ExecutorError;
use crate::adk::model::ModelProvider;
use crate::works::engine::ExecutionContext;
use crate::works::workflow::types::{Node, NodeType};

/// Runs nodes of one type
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    fn node_type(&self) -> NodeType;

    /// JSON schema of the node's `config`
    fn config_schema(&self) -> Value;

    /// Execute `node` against the current run state and return its output
    async fn execute(&self, node: &Node, ctx: &ExecutionContext) -> Result<Value, ExecutorError>;
}

/// A node type together with its config schema
#[derive(Debug, Clone, Serialize)]
pub struct NodeTypeInfo {
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub config_schema: Value,
}

#[derive(Clone)]
pub struct ExecutorRegistry {
    executors: Arc<RwLock<HashMap<NodeType, Arc<dyn NodeExecutor>>>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registry with an executor for every built-in node type.
    ///
    /// `ai-generate` nodes fail at run time when `models` is `None`.
    pub fn with_builtins(models: Option<Arc<dyn ModelProvider>>, max_delay_ms: u64) -> Self {
        let builtins: Vec<Arc<dyn NodeExecutor>> = vec![
            Arc::new(StartExecutor),
            Arc::new(EndExecutor),
            Arc::new(ApiCallExecutor::new()),
            Arc::new(TransformExecutor),
            Arc::new(ConditionExecutor),
            Arc::new(DelayExecutor::new(max_delay_ms)),
            Arc::new(LogExecutor),
            Arc::new(AiGenerateExecutor::new(models)),
        ];
        let executors = builtins
            .into_iter()
            .map(|e| (e.node_type(), e))
            .collect::<HashMap<_, _>>();

        Self {
            executors: Arc::new(RwLock::new(executors)),
        }
    }

    /// Register an executor, replacing any previous one for the same type
    pub async fn register(&self, executor: Arc<dyn NodeExecutor>) {
        let mut executors = self.executors.write().await;
        executors.insert(executor.node_type(), executor);
    }

    pub async fn get(&self, node_type: NodeType) -> Option<Arc<dyn NodeExecutor>> {
        let executors = self.executors.read().await;
        executors.get(&node_type).cloned()
    }

    /// Registered node types with their config schemas, in declaration order
    pub async fn node_types(&self) -> Vec<NodeTypeInfo> {
        let executors = self.executors.read().await;
        let mut types: Vec<NodeTypeInfo> = executors
            .values()
            .map(|e| NodeTypeInfo {
                node_type: e.node_type(),
                config_schema: e.config_schema(),
            })
            .collect();
        types.sort_by_key(|t| t.node_type);
        types
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Deserialize a node's config into its typed form
pub(crate) fn parse_config<T: DeserializeOwned>(node: &Node) -> Result<T, ExecutorError> {
    serde_json::from_value(node.config.clone())
        .map_err(|e| ExecutorError::invalid_config(&node.id, e.to_string()))
}

pub(crate) fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
}
