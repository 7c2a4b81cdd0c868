// SPDX-License-Identifier: MIT

//! `ai-generate` nodes: one model turn with a templated prompt

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{parse_config, schema_of, NodeExecutor};
use crate::adk::error::ExecutorError;
use crate::adk::model::{Content, GenerationConfig, ModelProvider};
use crate::works::engine::ExecutionContext;
use crate::works::workflow::template;
use crate::works::workflow::types::{Node, NodeType};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AiGenerateConfig {
    pub prompt: String,
    #[serde(default)]
    pub system: Option<String>,
    /// Model name; the provider's default when unset
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
}

pub struct AiGenerateExecutor {
    models: Option<Arc<dyn ModelProvider>>,
}

impl AiGenerateExecutor {
    pub fn new(models: Option<Arc<dyn ModelProvider>>) -> Self {
        Self { models }
    }
}

#[async_trait]
impl NodeExecutor for AiGenerateExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::AiGenerate
    }

    fn config_schema(&self) -> Value {
        schema_of::<AiGenerateConfig>()
    }

    async fn execute(&self, node: &Node, ctx: &ExecutionContext) -> Result<Value, ExecutorError> {
        let config: AiGenerateConfig = parse_config(node)?;
        let models = self.models.as_ref().ok_or(ExecutorError::ModelNotConfigured)?;
        let model = models.model(config.model.as_deref())?;

        let mut history = Vec::with_capacity(2);
        if let Some(system) = config.system.as_deref().filter(|s| !s.trim().is_empty()) {
            history.push(Content::system(template::render(system, &ctx.variables)));
        }
        let prompt = template::render(&config.prompt, &ctx.variables);
        log::debug!("Prompt for '{}': {}", node.id, prompt);
        history.push(Content::user(prompt));

        let generation = GenerationConfig {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            ..Default::default()
        };
        let generation = (!generation.is_empty()).then_some(generation);

        let reply = model
            .generate_content(&history, generation.as_ref())
            .await?;

        Ok(json!({
            "text": reply.text_content(),
            "model": model.model_name(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::model::testing::MockModel;
    use crate::adk::model::FixedModelProvider;
    use crate::works::executor::tests::context;

    #[tokio::test]
    async fn test_generates_with_rendered_prompt() {
        let mock = Arc::new(MockModel::new(&["A haiku about Rust"]));
        let executor =
            AiGenerateExecutor::new(Some(Arc::new(FixedModelProvider::new(mock.clone()))));

        let node = Node::new("write", NodeType::AiGenerate).with_config(json!({
            "prompt": "Write about {{ input.topic }}",
            "system": "You are a poet.",
            "temperature": 0.3
        }));
        let out = executor
            .execute(&node, &context(json!({"topic": "Rust"})))
            .await
            .unwrap();
        assert_eq!(out["text"], json!("A haiku about Rust"));
        assert_eq!(out["model"], json!("mock"));

        let calls = mock.calls.lock().unwrap();
        let (history, config) = &calls[0];
        assert_eq!(history[0], Content::system("You are a poet."));
        assert_eq!(history[1], Content::user("Write about Rust"));
        assert_eq!(config.as_ref().unwrap().temperature, Some(0.3));
    }

    #[tokio::test]
    async fn test_without_model_fails() {
        let node = Node::new("write", NodeType::AiGenerate).with_config(json!({"prompt": "hi"}));
        let err = AiGenerateExecutor::new(None)
            .execute(&node, &context(Value::Null))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::ModelNotConfigured));
    }
}
