// SPDX-License-Identifier: MIT

//! Multi-turn chat with a hosted model

use crate::adk::error::ModelError;
use crate::adk::model::{Content, GenerationConfig, Model};
use std::sync::Arc;

/// A conversation that keeps its own history
pub struct ChatSession {
    model: Arc<dyn Model>,
    system: Option<String>,
    config: GenerationConfig,
    history: Vec<Content>,
}

impl ChatSession {
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self {
            model,
            system: None,
            config: GenerationConfig::default(),
            history: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    /// Seed the conversation with earlier turns (e.g. from an HTTP client)
    pub fn with_history(mut self, history: Vec<Content>) -> Self {
        self.history = history;
        self
    }

    /// Send a user message and return the model's reply.
    ///
    /// On error the user turn is rolled back so the session can be retried.
    pub async fn send(&mut self, message: &str) -> Result<String, ModelError> {
        self.history.push(Content::user(message));

        let mut request = Vec::with_capacity(self.history.len() + 1);
        if let Some(system) = &self.system {
            request.push(Content::system(system.clone()));
        }
        request.extend(self.history.iter().cloned());

        log::debug!(
            "Chat turn {} on {}",
            self.history.len(),
            self.model.model_name()
        );

        match self.model.generate_content(&request, Some(&self.config)).await {
            Ok(reply) => {
                let text = reply.text_content();
                self.history.push(Content::model(text.clone()));
                Ok(text)
            }
            Err(e) => {
                self.history.pop();
                Err(e)
            }
        }
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}
