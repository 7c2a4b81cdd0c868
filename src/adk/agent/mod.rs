// SPDX-License-Identifier: MIT

//! Agent module - defines agent types
//!
//! This module provides the core Agent trait and implementations:
//! - `LLMAgent` - a persona (instructions + model) answering one turn
//! - `SequentialAgent` / `ParallelAgent` - teams of agents
//! - `AgentFactory` - builds agents and teams from YAML definitions

mod factory;
mod llm;
mod team;

pub use factory::{
    AgentDefinition, AgentFactory, AgentSpec, ModelSettings, TeamDefinition, TeamExecution,
};
pub use llm::LLMAgent;
pub use team::{ParallelAgent, SequentialAgent};

use crate::adk::error::AiWorksError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AgentEvent {
    /// An agent inside a team started working
    Started(String),
    Answer(String),
    Error(String),
}

/// Core agent trait for all agent types
#[async_trait]
pub trait Agent: Send + Sync {
    /// Returns the agent name
    fn name(&self) -> &str;

    /// Run the agent with the given input
    async fn run(&self, input: String) -> Result<String, AiWorksError>;

    /// Run the agent with streaming events
    async fn run_stream(
        &self,
        input: String,
        tx: mpsc::Sender<AgentEvent>,
    ) -> Result<String, AiWorksError> {
        // Default implementation falls back to run()
        let _ = tx.send(AgentEvent::Started(self.name().to_string())).await;
        match self.run(input).await {
            Ok(res) => {
                let _ = tx.send(AgentEvent::Answer(res.clone())).await;
                Ok(res)
            }
            Err(e) => {
                let _ = tx.send(AgentEvent::Error(e.to_string())).await;
                Err(e)
            }
        }
    }
}
