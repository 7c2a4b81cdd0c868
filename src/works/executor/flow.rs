// SPDX-License-Identifier: MIT

//! Control nodes: `start`, `end` and `condition`

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_config, schema_of, NodeExecutor};
use crate::adk::error::ExecutorError;
use crate::works::engine::ExecutionContext;
use crate::works::workflow::condition;
use crate::works::workflow::template;
use crate::works::workflow::types::{Node, NodeType};

/// Passes the run input on as `{ "input": ... }`
pub struct StartExecutor;

#[derive(Debug, Deserialize, JsonSchema)]
struct StartConfig {}

#[async_trait]
impl NodeExecutor for StartExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::Start
    }

    fn config_schema(&self) -> Value {
        schema_of::<StartConfig>()
    }

    async fn execute(&self, _node: &Node, ctx: &ExecutionContext) -> Result<Value, ExecutorError> {
        Ok(json!({ "input": ctx.input }))
    }
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct EndConfig {
    /// Template for the run's final output; defaults to the previous node's output
    #[serde(default)]
    pub output: Option<String>,
}

pub struct EndExecutor;

#[async_trait]
impl NodeExecutor for EndExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::End
    }

    fn config_schema(&self) -> Value {
        schema_of::<EndConfig>()
    }

    async fn execute(&self, node: &Node, ctx: &ExecutionContext) -> Result<Value, ExecutorError> {
        let config: EndConfig = parse_config(node)?;
        let output = match config.output {
            Some(t) => template::render_value(&Value::String(t), &ctx.variables),
            None => ctx.previous_output().cloned().unwrap_or(Value::Null),
        };
        Ok(json!({ "output": output }))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConditionConfig {
    /// e.g. `nodes.fetch.status == 200 and input != null`
    pub expression: String,
}

/// Evaluates a boolean expression; the runner picks `true`/`false` edges from the result
pub struct ConditionExecutor;

#[async_trait]
impl NodeExecutor for ConditionExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::Condition
    }

    fn config_schema(&self) -> Value {
        schema_of::<ConditionConfig>()
    }

    async fn execute(&self, node: &Node, ctx: &ExecutionContext) -> Result<Value, ExecutorError> {
        let config: ConditionConfig = parse_config(node)?;
        let result = condition::check(&config.expression, &ctx.variables)?;
        log::debug!("Condition '{}' -> {}", config.expression, result);
        Ok(json!({ "result": result }))
    }
}
