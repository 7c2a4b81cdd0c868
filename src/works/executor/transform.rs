// SPDX-License-Identifier: MIT

//! `transform` nodes: reshape data already in the run

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use super::{parse_config, schema_of, NodeExecutor};
use crate::adk::error::ExecutorError;
use crate::works::engine::ExecutionContext;
use crate::works::workflow::state::lookup;
use crate::works::workflow::template;
use crate::works::workflow::types::{Node, NodeType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransformOperation {
    /// Render `template` against the run variables
    #[default]
    Template,
    Uppercase,
    Lowercase,
    Trim,
    JsonParse,
    JsonStringify,
    /// Dot path into the input value
    Extract,
    /// Build an object from `fields` (output key -> variable path)
    Map,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TransformConfig {
    #[serde(default)]
    pub operation: TransformOperation,
    /// Variable path of the value to transform; defaults to the previous node's output
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

pub struct TransformExecutor;

#[async_trait]
impl NodeExecutor for TransformExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::Transform
    }

    fn config_schema(&self) -> Value {
        schema_of::<TransformConfig>()
    }

    async fn execute(&self, node: &Node, ctx: &ExecutionContext) -> Result<Value, ExecutorError> {
        let config: TransformConfig = parse_config(node)?;
        let vars = &ctx.variables;

        let input = match config.input.as_deref() {
            Some(path) => vars.get_path(path).cloned().unwrap_or(Value::Null),
            None => ctx.previous_output().cloned().unwrap_or(Value::Null),
        };

        let result = match config.operation {
            TransformOperation::Template => {
                let tpl = config
                    .template
                    .as_deref()
                    .ok_or_else(|| ExecutorError::invalid_config(&node.id, "template operation needs `template`"))?;
                Value::String(template::render(tpl, vars))
            }
            TransformOperation::Uppercase => Value::String(template::value_to_text(&input).to_uppercase()),
            TransformOperation::Lowercase => Value::String(template::value_to_text(&input).to_lowercase()),
            TransformOperation::Trim => Value::String(template::value_to_text(&input).trim().to_string()),
            TransformOperation::JsonParse => match input {
                Value::String(text) => serde_json::from_str(&text)
                    .map_err(|e| ExecutorError::Transform(format!("invalid JSON: {}", e)))?,
                other => other,
            },
            TransformOperation::JsonStringify => Value::String(input.to_string()),
            TransformOperation::Extract => {
                let path = config
                    .path
                    .as_deref()
                    .ok_or_else(|| ExecutorError::invalid_config(&node.id, "extract operation needs `path`"))?;
                extract(&input, path).cloned().unwrap_or(Value::Null)
            }
            TransformOperation::Map => {
                let mut out = Map::new();
                for (key, path) in &config.fields {
                    out.insert(
                        key.clone(),
                        vars.get_path(path).cloned().unwrap_or(Value::Null),
                    );
                }
                Value::Object(out)
            }
        };

        Ok(json!({ "result": result }))
    }
}

fn extract<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|p| !p.is_empty())
        .try_fold(value, |current, part| lookup(current, part))
}
