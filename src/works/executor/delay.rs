// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{parse_config, schema_of, NodeExecutor};
use crate::adk::error::ExecutorError;
use crate::works::engine::ExecutionContext;
use crate::works::workflow::types::{Node, NodeType};

pub const DEFAULT_MAX_DELAY_MS: u64 = 300_000;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DelayConfig {
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,
}

fn default_duration_ms() -> u64 {
    1_000
}

/// Sleeps for `duration_ms`, refusing anything above the configured maximum
pub struct DelayExecutor {
    max_delay_ms: u64,
}

impl DelayExecutor {
    pub fn new(max_delay_ms: u64) -> Self {
        Self { max_delay_ms }
    }
}

#[async_trait]
impl NodeExecutor for DelayExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::Delay
    }

    fn config_schema(&self) -> Value {
        schema_of::<DelayConfig>()
    }

    async fn execute(&self, node: &Node, _ctx: &ExecutionContext) -> Result<Value, ExecutorError> {
        let config: DelayConfig = parse_config(node)?;
        if config.duration_ms > self.max_delay_ms {
            return Err(ExecutorError::DelayTooLong {
                requested_ms: config.duration_ms,
                max_ms: self.max_delay_ms,
            });
        }

        tokio::time::sleep(Duration::from_millis(config.duration_ms)).await;
        Ok(json!({ "waited_ms": config.duration_ms }))
    }
}
