// SPDX-License-Identifier: MIT

//! `log` nodes

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_config, schema_of, NodeExecutor};
use crate::adk::error::ExecutorError;
use crate::works::engine::{ExecutionContext, LogLevel};
use crate::works::workflow::template;
use crate::works::workflow::types::{Node, NodeType};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LogConfig {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub level: LogLevel,
}

/// Renders the message and writes it to the process log.
///
/// The runner copies `{message, level}` from the output into the run's log list.
pub struct LogExecutor;

#[async_trait]
impl NodeExecutor for LogExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::Log
    }

    fn config_schema(&self) -> Value {
        schema_of::<LogConfig>()
    }

    async fn execute(&self, node: &Node, ctx: &ExecutionContext) -> Result<Value, ExecutorError> {
        let config: LogConfig = parse_config(node)?;
        let message = template::render(&config.message, &ctx.variables);

        let level: log::Level = config.level.into();
        log::log!(
            level,
            "[{}] {}: {}",
            ctx.execution_id,
            node.display_name(),
            message
        );
        Ok(json!({ "message": message, "level": config.level }))
    }
}
