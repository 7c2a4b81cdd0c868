// SPDX-License-Identifier: MIT

//! Agent factory - constructs agents and teams from definitions

use super::{Agent, LLMAgent, ParallelAgent, SequentialAgent};
use crate::adk::error::AiWorksError;
use crate::adk::model::{GenerationConfig, ModelProvider};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// An agent or team definition file, tagged by `kind`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind")]
pub enum AgentSpec {
    Agent(AgentDefinition),
    Team(TeamDefinition),
}

impl AgentSpec {
    pub fn name(&self) -> &str {
        match self {
            AgentSpec::Agent(a) => &a.name,
            AgentSpec::Team(t) => &t.name,
        }
    }
}

/// A single agent persona
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub instructions: String,
    #[serde(default)]
    pub model: ModelSettings,
}

/// Model selection and sampling parameters for an agent
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ModelSettings {
    pub model_name: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl ModelSettings {
    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            ..Default::default()
        }
    }
}

/// A team of agents
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TeamDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub execution: TeamExecution,
    pub agents: Vec<AgentDefinition>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TeamExecution {
    #[default]
    Sequential,
    Parallel,
}

/// Factory for creating Agent instances from definitions
pub struct AgentFactory {
    models: Arc<dyn ModelProvider>,
}

impl AgentFactory {
    pub fn new(models: Arc<dyn ModelProvider>) -> Self {
        Self { models }
    }

    /// Load an agent or team definition from a YAML file
    pub fn load_spec<P: AsRef<Path>>(path: P) -> Result<AgentSpec, AiWorksError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn build(&self, spec: &AgentSpec) -> Result<Arc<dyn Agent>, AiWorksError> {
        match spec {
            AgentSpec::Agent(def) => self.build_agent(def),
            AgentSpec::Team(def) => self.build_team(def),
        }
    }

    /// Build an agent from an AgentDefinition
    pub fn build_agent(&self, def: &AgentDefinition) -> Result<Arc<dyn Agent>, AiWorksError> {
        let model = self.models.model(def.model.model_name.as_deref())?;
        log::info!(
            "Building agent '{}' with model '{}'",
            def.name,
            model.model_name()
        );

        Ok(Arc::new(
            LLMAgent::new(
                def.name.clone(),
                def.description.clone(),
                def.instructions.clone(),
                model,
            )
            .with_config(def.model.generation_config()),
        ))
    }

    pub fn build_team(&self, def: &TeamDefinition) -> Result<Arc<dyn Agent>, AiWorksError> {
        if def.agents.is_empty() {
            return Err(AiWorksError::config(format!(
                "Team '{}' has no agents",
                def.name
            )));
        }

        let members = def
            .agents
            .iter()
            .map(|a| self.build_agent(a))
            .collect::<Result<Vec<_>, _>>()?;

        log::info!(
            "Building {:?} team '{}' with {} agents",
            def.execution,
            def.name,
            members.len()
        );

        let team: Arc<dyn Agent> = match def.execution {
            TeamExecution::Sequential => Arc::new(SequentialAgent::new(
                def.name.clone(),
                def.description.clone(),
                members,
            )),
            TeamExecution::Parallel => Arc::new(ParallelAgent::new(
                def.name.clone(),
                def.description.clone(),
                members,
            )),
        };
        Ok(team)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::model::testing::MockModel;
    use crate::adk::model::FixedModelProvider;

    fn factory(replies: &[&str]) -> AgentFactory {
        AgentFactory::new(Arc::new(FixedModelProvider::new(Arc::new(
            MockModel::new(replies),
        ))))
    }

    #[test]
    fn test_parse_agent_spec() {
        let yaml = r#"
kind: Agent
name: Writer
instructions: "Write short poems."
model:
  model_name: gemini-1.5-pro
  temperature: 0.9
"#;
        let spec: AgentSpec = serde_yaml::from_str(yaml).unwrap();
        match spec {
            AgentSpec::Agent(def) => {
                assert_eq!(def.name, "Writer");
                assert_eq!(def.model.model_name.as_deref(), Some("gemini-1.5-pro"));
                assert_eq!(def.model.generation_config().temperature, Some(0.9));
            }
            AgentSpec::Team(_) => panic!("Expected Agent"),
        }
    }

    #[test]
    fn test_parse_team_spec_defaults_to_sequential() {
        let yaml = r#"
kind: Team
name: Editorial
agents:
  - name: Drafter
    instructions: Draft it.
  - name: Editor
    instructions: Edit it.
"#;
        let spec: AgentSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.name(), "Editorial");
        match spec {
            AgentSpec::Team(def) => {
                assert_eq!(def.execution, TeamExecution::Sequential);
                assert_eq!(def.agents.len(), 2);
            }
            AgentSpec::Agent(_) => panic!("Expected Team"),
        }
    }

    #[tokio::test]
    async fn test_build_team_runs_members_in_order() {
        let spec: AgentSpec = serde_yaml::from_str(
            r#"
kind: Team
name: Pipeline
execution: sequential
agents:
  - name: One
    instructions: first
  - name: Two
    instructions: second
"#,
        )
        .unwrap();

        let agent = factory(&["draft", "final"]).build(&spec).unwrap();
        assert_eq!(agent.name(), "Pipeline");
        assert_eq!(agent.run("topic".to_string()).await.unwrap(), "final");
    }

    #[test]
    fn test_empty_team_rejected() {
        let def = TeamDefinition {
            name: "Nobody".to_string(),
            description: String::new(),
            execution: TeamExecution::Parallel,
            agents: vec![],
        };
        assert!(factory(&[]).build_team(&def).is_err());
    }
}
