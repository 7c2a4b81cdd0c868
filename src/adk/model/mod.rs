// SPDX-License-Identifier: MIT

//! Model module - defines the LLM model trait and shared types
//!
//! Implementations live in their own submodules:
//! - [gemini] - Google's Gemini generative-language API

pub mod gemini;

use crate::adk::error::ModelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for model generation
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
}

impl GenerationConfig {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.max_output_tokens.is_none()
            && self.top_p.is_none()
            && self.top_k.is_none()
    }
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    /// "system", "user" or "model"
    pub role: String,
    pub parts: Vec<Part>,
}

/// Parts of a message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Part {
    /// Regular text output from the model
    Text(String),
    /// Thinking/reasoning content from thinking models
    Thinking(String),
}

impl Content {
    pub fn system(text: impl Into<String>) -> Self {
        Self::text("system", text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text("user", text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::text("model", text)
    }

    fn text(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Concatenated text parts, thinking excluded
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::Thinking(_) => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Core trait for LLM model implementations
#[async_trait]
pub trait Model: Send + Sync {
    /// Name of the underlying model, e.g. `gemini-1.5-flash`
    fn model_name(&self) -> &str;

    /// Generate the next turn for `history`.
    ///
    /// Entries with role `system` are sent as system instructions.
    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> Result<Content, ModelError>;
}

/// Hands out models by name so agents and nodes can pick their own model
pub trait ModelProvider: Send + Sync {
    /// `None` selects the provider's default model
    fn model(&self, name: Option<&str>) -> Result<Arc<dyn Model>, ModelError>;
}

/// Provider that always returns the same model instance
pub struct FixedModelProvider {
    model: Arc<dyn Model>,
}

impl FixedModelProvider {
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self { model }
    }
}

impl ModelProvider for FixedModelProvider {
    fn model(&self, name: Option<&str>) -> Result<Arc<dyn Model>, ModelError> {
        if let Some(name) = name.filter(|n| *n != self.model.model_name()) {
            log::debug!(
                "Requested model '{}', using '{}'",
                name,
                self.model.model_name()
            );
        }
        Ok(self.model.clone())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Mock model that replays scripted replies and records what it was sent
    pub struct MockModel {
        replies: Mutex<Vec<String>>,
        pub calls: Mutex<Vec<(Vec<Content>, Option<GenerationConfig>)>>,
    }

    impl MockModel {
        pub fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Model for MockModel {
        fn model_name(&self) -> &str {
            "mock"
        }

        async fn generate_content(
            &self,
            history: &[Content],
            config: Option<&GenerationConfig>,
        ) -> Result<Content, ModelError> {
            self.calls
                .lock()
                .unwrap()
                .push((history.to_vec(), config.cloned()));
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| "Max responses reached".to_string());
            Ok(Content::model(reply))
        }
    }
}
