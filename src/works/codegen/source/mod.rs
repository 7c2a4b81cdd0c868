// SPDX-License-Identifier: MIT

//! Illustrative source code for workflows and agents
//!
//! The output is a readable starting point, one function per node in
//! breadth-first order plus an entry point. Nothing here is compiled or run.

mod python;
mod rust;
mod typescript;

use serde_json::{Map, Value};
use std::collections::HashSet;

use super::Language;
use crate::adk::agent::AgentDefinition;
use crate::adk::model::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::works::workflow::types::{Node, Workflow};

/// Source for running `workflow` outside the engine
pub fn generate_workflow_code(workflow: &Workflow, language: Language) -> String {
    let nodes = workflow.bfs_order();
    let steps: Vec<Step> = function_names(&nodes)
        .into_iter()
        .zip(nodes)
        .map(|(name, node)| Step {
            guard: guard(workflow, node),
            name,
            node,
        })
        .collect();

    log::debug!(
        "Generating {} code for workflow '{}' ({} steps)",
        language,
        workflow.name,
        steps.len()
    );
    match language {
        Language::Python => python::workflow(workflow, &steps),
        Language::TypeScript => typescript::workflow(workflow, &steps),
        Language::Rust => rust::workflow(workflow, &steps),
    }
}

/// A client that sends a prompt to the agent's model with its instructions
pub fn generate_agent_code(agent: &AgentDefinition, language: Language) -> String {
    let model = agent.model.model_name.as_deref().unwrap_or(DEFAULT_MODEL);
    let config = generation_config(agent.model.temperature, agent.model.max_output_tokens);
    match language {
        Language::Python => python::agent(agent, model, &config),
        Language::TypeScript => typescript::agent(agent, model, &config),
        Language::Rust => rust::agent(agent, model, &config),
    }
}

/// One node of the generated program
struct Step<'a> {
    name: String,
    node: &'a Node,
    /// Condition node id and the branch value this node hangs off
    guard: Option<(&'a str, bool)>,
}

/// Line buffer with indentation
struct Code {
    unit: &'static str,
    depth: usize,
    lines: Vec<String>,
}

impl Code {
    fn new(unit: &'static str) -> Self {
        Self {
            unit,
            depth: 0,
            lines: Vec::new(),
        }
    }

    fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            self.lines.push(String::new());
        } else {
            self.lines
                .push(format!("{}{}", self.unit.repeat(self.depth), text));
        }
    }

    fn blank(&mut self) {
        self.lines.push(String::new());
    }

    /// Multi-line text at the current depth
    fn block(&mut self, text: &str) {
        for l in text.trim_matches('\n').lines() {
            self.line(l);
        }
    }

    fn indent(&mut self) {
        self.depth += 1;
    }

    fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn finish(self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

/// JSON string literal, which Python and TypeScript accept as-is
fn quote(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Snake-case function names, unique within the program
fn function_names(nodes: &[&Node]) -> Vec<String> {
    let mut seen = HashSet::new();
    nodes
        .iter()
        .map(|node| {
            let base: String = node
                .id
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() {
                        c.to_ascii_lowercase()
                    } else {
                        '_'
                    }
                })
                .collect();
            let base = format!("node_{}", base.trim_matches('_'));
            let mut name = base.clone();
            let mut n = 2;
            while !seen.insert(name.clone()) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            name
        })
        .collect()
}

fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper = false;
    for c in snake.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// A node whose only way in is one branch of a condition runs under that guard
fn guard<'a>(workflow: &'a Workflow, node: &Node) -> Option<(&'a str, bool)> {
    let mut incoming = workflow.edges.iter().filter(|e| e.target == node.id);
    match (incoming.next(), incoming.next()) {
        (Some(edge), None) => {
            let branch = edge.branch.as_deref()?.parse::<bool>().ok()?;
            Some((edge.source.as_str(), branch))
        }
        _ => None,
    }
}

/// `generationConfig` object with only the settings that are present
fn generation_config(temperature: Option<f32>, max_output_tokens: Option<u32>) -> Value {
    let mut config = Map::new();
    if let Some(t) = temperature {
        // Round-trip through the decimal form so 0.7f32 prints as 0.7
        let t = t.to_string().parse::<f64>().unwrap_or(t as f64);
        config.insert("temperature".to_string(), Value::from(t));
    }
    if let Some(m) = max_output_tokens {
        config.insert("maxOutputTokens".to_string(), Value::from(m));
    }
    Value::Object(config)
}

fn with_base_url(helper: &str) -> String {
    helper.replace("__BASE_URL__", DEFAULT_BASE_URL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::agent::ModelSettings;
    use crate::works::workflow::types::{Edge, NodeType};
    use serde_json::json;

    pub(super) fn sample() -> Workflow {
        Workflow::new("Status check", "Checks a service and reports")
            .with_node(Node::new("start", NodeType::Start))
            .with_node(
                Node::new("fetch-status", NodeType::ApiCall).with_config(json!({
                    "url": "https://status.example.com/{{ input.service }}",
                    "headers": {"accept": "application/json"},
                    "allow_error_status": true
                })),
            )
            .with_node(
                Node::new("is-up", NodeType::Condition)
                    .with_config(json!({"expression": "nodes.fetch-status.status == 200"})),
            )
            .with_node(
                Node::new("ok", NodeType::Log).with_config(json!({"message": "{{ input.service }} is up"})),
            )
            .with_node(
                Node::new("down", NodeType::AiGenerate)
                    .with_config(json!({"prompt": "Write an outage notice", "temperature": 0.2})),
            )
            .with_node(Node::new("end", NodeType::End))
            .with_edge(Edge::new("start", "fetch-status"))
            .with_edge(Edge::new("fetch-status", "is-up"))
            .with_edge(Edge::new("is-up", "ok").on_branch(true))
            .with_edge(Edge::new("is-up", "down").on_branch(false))
            .with_edge(Edge::new("ok", "end"))
            .with_edge(Edge::new("down", "end"))
    }

    pub(super) fn agent() -> AgentDefinition {
        AgentDefinition {
            name: "Poet".to_string(),
            description: "Writes short poems".to_string(),
            instructions: "You write \"haiku\" only.".to_string(),
            model: ModelSettings {
                model_name: Some("gemini-1.5-pro".to_string()),
                temperature: Some(0.7),
                max_output_tokens: None,
            },
        }
    }

    #[test]
    fn test_function_names_are_unique_identifiers() {
        let a = Node::new("fetch-status", NodeType::ApiCall);
        let b = Node::new("fetch_status", NodeType::ApiCall);
        let c = Node::new("Start", NodeType::Start);
        assert_eq!(
            function_names(&[&a, &b, &c]),
            vec!["node_fetch_status", "node_fetch_status_2", "node_start"]
        );
        assert_eq!(camel_case("node_fetch_status"), "nodeFetchStatus");
    }

    #[test]
    fn test_guards_follow_single_branch_edges() {
        let wf = sample();
        assert_eq!(guard(&wf, wf.node("ok").unwrap()), Some(("is-up", true)));
        assert_eq!(guard(&wf, wf.node("down").unwrap()), Some(("is-up", false)));
        // Two ways in, no guard
        assert_eq!(guard(&wf, wf.node("end").unwrap()), None);
    }

    #[test]
    fn test_generation_config() {
        assert_eq!(generation_config(None, None), json!({}));
        assert_eq!(
            generation_config(Some(0.7), Some(256)),
            json!({"temperature": 0.7, "maxOutputTokens": 256})
        );
    }

    #[test]
    fn test_every_language_mentions_every_node() {
        let wf = sample();
        for language in [Language::Python, Language::TypeScript, Language::Rust] {
            let code = generate_workflow_code(&wf, language);
            for id in ["start", "fetch-status", "is-up", "ok", "down", "end"] {
                assert!(code.contains(&quote(id)) || code.contains(&format!("{:?}", id)), "{} missing {}", language, id);
            }
            assert!(code.contains("Status check"));
        }
    }

    #[test]
    fn test_agent_code_carries_instructions_and_model() {
        for language in [Language::Python, Language::TypeScript, Language::Rust] {
            let code = generate_agent_code(&agent(), language);
            assert!(code.contains("gemini-1.5-pro"), "{}", language);
            assert!(code.contains(r#"You write \"haiku\" only."#), "{}", language);
            assert!(code.contains(DEFAULT_BASE_URL), "{}", language);
            assert!(!code.contains("__BASE_URL__"));
        }
    }
}
