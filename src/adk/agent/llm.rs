// SPDX-License-Identifier: MIT

//! LLM Agent - a persona answering with a single model turn

use super::Agent;
use crate::adk::error::AiWorksError;
use crate::adk::model::{Content, GenerationConfig, Model};
use async_trait::async_trait;
use std::sync::Arc;

/// Agent defined by its instructions and model
pub struct LLMAgent {
    pub name: String,
    pub description: String,
    pub instruction: String,
    pub model: Arc<dyn Model>,
    pub config: GenerationConfig,
}

impl LLMAgent {
    pub fn new(
        name: String,
        description: String,
        instruction: String,
        model: Arc<dyn Model>,
    ) -> Self {
        Self {
            name,
            description,
            instruction,
            model,
            config: GenerationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl Agent for LLMAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, input: String) -> Result<String, AiWorksError> {
        let mut history = Vec::with_capacity(2);
        if !self.instruction.trim().is_empty() {
            history.push(Content::system(self.instruction.clone()));
        }
        history.push(Content::user(input));

        log::info!(
            "Agent {} calling model {}",
            self.name,
            self.model.model_name()
        );
        let response = self
            .model
            .generate_content(&history, Some(&self.config))
            .await?;

        let text = response.text_content();
        if text.is_empty() {
            log::warn!("Agent {} received an empty response", self.name);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::model::testing::MockModel;

    #[tokio::test]
    async fn test_llm_agent_sends_instructions_as_system() {
        let model = Arc::new(MockModel::new(&["Bonjour"]));
        let agent = LLMAgent::new(
            "translator".to_string(),
            "Translates".to_string(),
            "Translate to French.".to_string(),
            model.clone(),
        );

        let result = agent.run("Hello".to_string()).await.unwrap();
        assert_eq!(result, "Bonjour");

        let calls = model.calls.lock().unwrap();
        let (history, _) = &calls[0];
        assert_eq!(history[0], Content::system("Translate to French."));
        assert_eq!(history[1], Content::user("Hello"));
    }

    #[tokio::test]
    async fn test_llm_agent_without_instructions() {
        let model = Arc::new(MockModel::new(&["ok"]));
        let agent = LLMAgent::new(
            "plain".to_string(),
            String::new(),
            "  ".to_string(),
            model.clone(),
        )
        .with_config(GenerationConfig {
            temperature: Some(0.1),
            ..Default::default()
        });

        agent.run("ping".to_string()).await.unwrap();

        let calls = model.calls.lock().unwrap();
        let (history, config) = &calls[0];
        assert_eq!(history.len(), 1);
        assert_eq!(config.as_ref().unwrap().temperature, Some(0.1));
    }
}
