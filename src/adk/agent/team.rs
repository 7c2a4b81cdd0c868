// SPDX-License-Identifier: MIT

//! Teams - agents composed of other agents

use super::{Agent, AgentEvent};
use crate::adk::error::AiWorksError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Runs members in order, feeding each output into the next member
pub struct SequentialAgent {
    pub name: String,
    pub description: String,
    pub sub_agents: Vec<Arc<dyn Agent>>,
}

impl SequentialAgent {
    pub fn new(name: String, description: String, sub_agents: Vec<Arc<dyn Agent>>) -> Self {
        Self {
            name,
            description,
            sub_agents,
        }
    }
}

#[async_trait]
impl Agent for SequentialAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, input: String) -> Result<String, AiWorksError> {
        let mut current_input = input;
        for agent in &self.sub_agents {
            log::info!("Team {}: running {}", self.name, agent.name());
            current_input = agent.run(current_input).await?;
        }
        Ok(current_input)
    }

    async fn run_stream(
        &self,
        input: String,
        tx: mpsc::Sender<AgentEvent>,
    ) -> Result<String, AiWorksError> {
        let mut current_input = input;
        for agent in &self.sub_agents {
            let _ = tx.send(AgentEvent::Started(agent.name().to_string())).await;
            match agent.run(current_input).await {
                Ok(out) => current_input = out,
                Err(e) => {
                    let _ = tx.send(AgentEvent::Error(e.to_string())).await;
                    return Err(e);
                }
            }
        }
        let _ = tx.send(AgentEvent::Answer(current_input.clone())).await;
        Ok(current_input)
    }
}

/// Runs every member on the same input concurrently
pub struct ParallelAgent {
    pub name: String,
    pub description: String,
    pub sub_agents: Vec<Arc<dyn Agent>>,
}

impl ParallelAgent {
    pub fn new(name: String, description: String, sub_agents: Vec<Arc<dyn Agent>>) -> Self {
        Self {
            name,
            description,
            sub_agents,
        }
    }
}

#[async_trait]
impl Agent for ParallelAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, input: String) -> Result<String, AiWorksError> {
        let mut handles = vec![];

        for agent in &self.sub_agents {
            let agent = agent.clone();
            let input = input.clone();
            handles.push(tokio::spawn(async move { agent.run(input).await }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let res = handle
                .await
                .map_err(|e| AiWorksError::other(format!("team member panicked: {}", e)))??;
            results.push(res);
        }

        Ok(results.join("\n---\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::agent::tests::MockAgent;

    #[tokio::test]
    async fn test_sequential_agent_chains_output() {
        let team = SequentialAgent::new(
            "chain".to_string(),
            String::new(),
            vec![
                Arc::new(MockAgent::new("a", |s| format!("{}-a", s))),
                Arc::new(MockAgent::new("b", |s| format!("{}-b", s))),
            ],
        );

        let result = team.run("x".to_string()).await.unwrap();
        assert_eq!(result, "x-a-b");
    }

    #[tokio::test]
    async fn test_sequential_agent_empty() {
        let team = SequentialAgent::new("empty".to_string(), String::new(), vec![]);
        let result = team.run("unchanged".to_string()).await.unwrap();
        assert_eq!(result, "unchanged");
    }

    #[tokio::test]
    async fn test_sequential_stream_reports_each_member() {
        let team = SequentialAgent::new(
            "chain".to_string(),
            String::new(),
            vec![
                Arc::new(MockAgent::new("first", |s| s)),
                Arc::new(MockAgent::new("second", |s| s.to_uppercase())),
            ],
        );
        let (tx, mut rx) = mpsc::channel(8);
        team.run_stream("go".to_string(), tx).await.unwrap();

        assert_eq!(rx.recv().await, Some(AgentEvent::Started("first".to_string())));
        assert_eq!(rx.recv().await, Some(AgentEvent::Started("second".to_string())));
        assert_eq!(rx.recv().await, Some(AgentEvent::Answer("GO".to_string())));
    }

    #[tokio::test]
    async fn test_parallel_agent_combines_output() {
        let team = ParallelAgent::new(
            "fanout".to_string(),
            String::new(),
            vec![
                Arc::new(MockAgent::new("a", |s| format!("{}-a", s))),
                Arc::new(MockAgent::new("b", |s| format!("{}-b", s))),
            ],
        );

        let result = team.run("x".to_string()).await.unwrap();
        assert_eq!(result, "x-a\n---\nx-b");
    }
}
