// SPDX-License-Identifier: MIT

//! Workflow graph types
//!
//! A [`Workflow`] is a set of typed [`Node`]s joined by directed [`Edge`]s.
//! Workflows are stored as JSON and can also be written by hand in YAML.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use super::state::{VariableSchema, INPUT_KEY, NODES_KEY};
use crate::adk::error::WorkflowError;

/// The fixed set of node kinds the engine can execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    Start,
    End,
    ApiCall,
    Transform,
    Condition,
    Delay,
    Log,
    AiGenerate,
}

impl NodeType {
    pub const ALL: [NodeType; 8] = [
        NodeType::Start,
        NodeType::End,
        NodeType::ApiCall,
        NodeType::Transform,
        NodeType::Condition,
        NodeType::Delay,
        NodeType::Log,
        NodeType::AiGenerate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Start => "start",
            NodeType::End => "end",
            NodeType::ApiCall => "api-call",
            NodeType::Transform => "transform",
            NodeType::Condition => "condition",
            NodeType::Delay => "delay",
            NodeType::Log => "log",
            NodeType::AiGenerate => "ai-generate",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canvas coordinates; the engine never reads them
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A step in the workflow
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub label: String,
    /// Per-type settings, see the executor for each node type
    #[serde(default = "empty_object")]
    pub config: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl Node {
    pub fn new(id: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            label: String::new(),
            config: empty_object(),
            position: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Label if set, otherwise the id
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }

    /// `config.output_variable`: extra variable receiving this node's output
    pub fn output_variable(&self) -> Option<&str> {
        self.config
            .get("output_variable")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// A directed connection between two nodes
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Edge {
    #[serde(default)]
    pub id: String,
    pub source: String,
    pub target: String,
    /// `"true"` / `"false"` on edges leaving a condition node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{}->{}", source, target),
            source,
            target,
            branch: None,
            label: None,
        }
    }

    pub fn on_branch(mut self, branch: bool) -> Self {
        self.branch = Some(branch.to_string());
        self.id = format!("{}:{}", self.id, branch);
        self
    }

    /// Whether this edge is followed after its source produced `result`
    pub fn follows(&self, result: bool) -> bool {
        match self.branch.as_deref() {
            None => true,
            Some(b) => b == if result { "true" } else { "false" },
        }
    }
}

/// A complete workflow definition
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Workflow {
    #[serde(default = "new_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "VariableSchema::is_empty")]
    pub variables: VariableSchema,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Result of [`Workflow::validate`]
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<WorkflowError>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Workflow {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            description: description.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            variables: VariableSchema::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// The unique start node, if there is exactly one
    pub fn start_node(&self) -> Option<&Node> {
        let mut starts = self.nodes.iter().filter(|n| n.node_type == NodeType::Start);
        match (starts.next(), starts.next()) {
            (Some(start), None) => Some(start),
            _ => None,
        }
    }

    /// Edges leaving `node_id`, in definition order
    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// Mark the workflow as modified
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Node ids in breadth-first order from the start node, following every edge
    pub fn bfs_order(&self) -> Vec<&Node> {
        let Some(start) = self.start_node() else {
            return Vec::new();
        };
        let index: HashMap<&str, &Node> = self.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        let mut order = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue = VecDeque::from([start.id.as_str()]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(node) = index.get(id) {
                order.push(*node);
            }
            for edge in self.outgoing(id) {
                queue.push_back(edge.target.as_str());
            }
        }
        order
    }

    /// Check the structure of the graph.
    ///
    /// Errors make the workflow unrunnable; warnings (unreachable nodes,
    /// reserved variable names) do not.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        let starts = self
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Start)
            .count();
        match starts {
            0 => report.errors.push(WorkflowError::MissingStart),
            1 => {}
            n => report.errors.push(WorkflowError::MultipleStarts(n)),
        }

        let mut node_ids = HashSet::new();
        for node in &self.nodes {
            if !node_ids.insert(node.id.as_str()) {
                report
                    .errors
                    .push(WorkflowError::DuplicateNodeId(node.id.clone()));
            }
        }

        let mut edge_ids = HashSet::new();
        for edge in &self.edges {
            if !edge.id.is_empty() && !edge_ids.insert(edge.id.as_str()) {
                report
                    .errors
                    .push(WorkflowError::DuplicateEdgeId(edge.id.clone()));
            }

            for end in [&edge.source, &edge.target] {
                if !node_ids.contains(end.as_str()) {
                    report.errors.push(WorkflowError::UnknownNode {
                        edge: edge.id.clone(),
                        node: end.clone(),
                    });
                }
            }

            if let Some(branch) = &edge.branch {
                let source_type = self.node(&edge.source).map(|n| n.node_type);
                if source_type.is_some_and(|t| t != NodeType::Condition) {
                    report.errors.push(WorkflowError::InvalidBranch {
                        edge: edge.id.clone(),
                        reason: "only edges leaving a condition node can have a branch"
                            .to_string(),
                    });
                } else if branch != "true" && branch != "false" {
                    report.errors.push(WorkflowError::InvalidBranch {
                        edge: edge.id.clone(),
                        reason: format!("expected 'true' or 'false', got '{}'", branch),
                    });
                }
            }
        }

        for node in self.nodes.iter().filter(|n| n.node_type == NodeType::End) {
            if self.outgoing(&node.id).next().is_some() {
                report
                    .errors
                    .push(WorkflowError::EndHasOutgoing(node.id.clone()));
            }
        }

        for node in &self.nodes {
            if let Some(name) = node.output_variable() {
                if name == INPUT_KEY || name == NODES_KEY {
                    report.errors.push(WorkflowError::ReservedOutputVariable {
                        node: node.id.clone(),
                        name: name.to_string(),
                    });
                }
            }
        }

        if report.is_valid() {
            let reachable: HashSet<&str> =
                self.bfs_order().into_iter().map(|n| n.id.as_str()).collect();
            for node in &self.nodes {
                if !reachable.contains(node.id.as_str()) {
                    report.warnings.push(format!(
                        "Node '{}' is not reachable from the start node",
                        node.display_name()
                    ));
                }
            }
        }

        for reserved in [INPUT_KEY, NODES_KEY] {
            if self.variables.fields.contains_key(reserved) {
                report.warnings.push(format!(
                    "Variable '{}' is reserved and will be overwritten during runs",
                    reserved
                ));
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn linear() -> Workflow {
        Workflow::new("linear", "start -> log -> end")
            .with_node(Node::new("start", NodeType::Start))
            .with_node(Node::new("log", NodeType::Log).with_config(json!({"message": "hi"})))
            .with_node(Node::new("end", NodeType::End))
            .with_edge(Edge::new("start", "log"))
            .with_edge(Edge::new("log", "end"))
    }

    #[test]
    fn test_node_type_wire_names() {
        assert_eq!(serde_json::to_value(NodeType::ApiCall).unwrap(), json!("api-call"));
        assert_eq!(
            serde_json::from_value::<NodeType>(json!("ai-generate")).unwrap(),
            NodeType::AiGenerate
        );
        for t in NodeType::ALL {
            assert_eq!(serde_json::to_value(t).unwrap(), json!(t.as_str()));
        }
    }

    #[test]
    fn test_deserialize_minimal_json() {
        let wf: Workflow = serde_json::from_value(json!({
            "name": "tiny",
            "nodes": [{"id": "s", "type": "start"}],
        }))
        .unwrap();
        assert!(!wf.id.is_empty());
        assert_eq!(wf.nodes[0].config, json!({}));
        assert!(wf.edges.is_empty());
    }

    #[test]
    fn test_valid_linear_workflow() {
        let report = linear().validate();
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_start_node_count() {
        let wf = Workflow::new("none", "").with_node(Node::new("end", NodeType::End));
        assert_eq!(wf.validate().errors, vec![WorkflowError::MissingStart]);
        assert!(wf.start_node().is_none());

        let wf = linear().with_node(Node::new("start2", NodeType::Start));
        assert!(wf.validate().errors.contains(&WorkflowError::MultipleStarts(2)));
        assert!(wf.start_node().is_none());
    }

    #[test]
    fn test_duplicate_ids_and_dangling_edges() {
        let wf = linear()
            .with_node(Node::new("log", NodeType::Log))
            .with_edge(Edge::new("log", "ghost"))
            .with_edge(Edge::new("start", "log"));
        let errors = wf.validate().errors;

        assert!(errors.contains(&WorkflowError::DuplicateNodeId("log".to_string())));
        assert!(errors.contains(&WorkflowError::DuplicateEdgeId("start->log".to_string())));
        assert!(errors.contains(&WorkflowError::UnknownNode {
            edge: "log->ghost".to_string(),
            node: "ghost".to_string()
        }));
    }

    #[test]
    fn test_branch_rules() {
        let wf = linear().with_edge(Edge::new("start", "end").on_branch(true));
        assert!(wf
            .validate()
            .errors
            .iter()
            .any(|e| matches!(e, WorkflowError::InvalidBranch { .. })));

        let mut edge = Edge::new("check", "end");
        edge.branch = Some("maybe".to_string());
        let wf = Workflow::new("cond", "")
            .with_node(Node::new("start", NodeType::Start))
            .with_node(Node::new("check", NodeType::Condition))
            .with_node(Node::new("end", NodeType::End))
            .with_edge(Edge::new("start", "check"))
            .with_edge(edge);
        assert!(matches!(
            &wf.validate().errors[..],
            [WorkflowError::InvalidBranch { .. }]
        ));
    }

    #[test]
    fn test_end_node_cannot_continue() {
        let wf = linear().with_edge(Edge::new("end", "log"));
        assert!(wf
            .validate()
            .errors
            .contains(&WorkflowError::EndHasOutgoing("end".to_string())));
    }

    #[test]
    fn test_output_variable_cannot_be_reserved() {
        for name in ["nodes", "input"] {
            let wf = Workflow::new("clobber", "")
                .with_node(Node::new("start", NodeType::Start))
                .with_node(
                    Node::new("log", NodeType::Log)
                        .with_config(json!({"message": "hi", "output_variable": name})),
                )
                .with_node(Node::new("end", NodeType::End))
                .with_edge(Edge::new("start", "log"))
                .with_edge(Edge::new("log", "end"));
            assert_eq!(
                wf.validate().errors,
                vec![WorkflowError::ReservedOutputVariable {
                    node: "log".to_string(),
                    name: name.to_string(),
                }]
            );
        }
    }

    #[test]
    fn test_unreachable_node_is_a_warning() {
        let wf = linear().with_node(Node::new("orphan", NodeType::Delay).with_label("Orphan"));
        let report = wf.validate();
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("Orphan"));
    }

    #[test]
    fn test_bfs_order_visits_each_node_once() {
        let wf = Workflow::new("diamond", "")
            .with_node(Node::new("s", NodeType::Start))
            .with_node(Node::new("a", NodeType::Log))
            .with_node(Node::new("b", NodeType::Log))
            .with_node(Node::new("e", NodeType::End))
            .with_edge(Edge::new("s", "a"))
            .with_edge(Edge::new("s", "b"))
            .with_edge(Edge::new("a", "e"))
            .with_edge(Edge::new("b", "e"));
        let ids: Vec<&str> = wf.bfs_order().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["s", "a", "b", "e"]);
    }

    #[test]
    fn test_edge_follows_branch() {
        let plain = Edge::new("a", "b");
        assert!(plain.follows(true) && plain.follows(false));

        let yes = Edge::new("a", "b").on_branch(true);
        assert!(yes.follows(true));
        assert!(!yes.follows(false));
    }

    #[test]
    fn test_output_variable() {
        let node = Node::new("n", NodeType::Transform)
            .with_config(json!({"output_variable": "summary"}));
        assert_eq!(node.output_variable(), Some("summary"));
        assert_eq!(Node::new("m", NodeType::Log).output_variable(), None);
    }
}
