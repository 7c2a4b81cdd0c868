// SPDX-License-Identifier: MIT

//! Ready-made workflows

use chrono::Utc;
use serde::Serialize;

use crate::works::workflow::loader::WorkflowLoader;
use crate::works::workflow::types::Workflow;

const HELLO_WORLD: &str = r#"
name: Hello World
description: Greets whoever is passed as input
nodes:
  - id: start
    type: start
    position: { x: 100, y: 100 }
  - id: greet
    type: log
    label: Greet
    config:
      message: "Hello, {{ input }}!"
    position: { x: 300, y: 100 }
  - id: end
    type: end
    config:
      output: "{{ nodes.greet.message }}"
    position: { x: 500, y: 100 }
edges:
  - source: start
    target: greet
  - source: greet
    target: end
"#;

const API_MONITOR: &str = r#"
name: API Monitor
description: Calls an endpoint and reports whether it is healthy
nodes:
  - id: start
    type: start
  - id: check
    type: api-call
    label: Call endpoint
    config:
      url: "{{ input.url }}"
      method: GET
      timeout_ms: 10000
      allow_error_status: true
  - id: healthy
    type: condition
    label: Healthy?
    config:
      expression: "nodes.check.ok == true"
  - id: report-up
    type: log
    config:
      message: "{{ input.url }} is healthy ({{ nodes.check.status }})"
  - id: report-down
    type: log
    config:
      message: "{{ input.url }} is DOWN ({{ nodes.check.status }})"
      level: error
  - id: end
    type: end
edges:
  - source: start
    target: check
  - source: check
    target: healthy
  - source: healthy
    target: report-up
    branch: "true"
  - source: healthy
    target: report-down
    branch: "false"
  - source: report-up
    target: end
  - source: report-down
    target: end
"#;

const CONTENT_PIPELINE: &str = r#"
name: Content Pipeline
description: Outlines, drafts and tidies an article on a topic
nodes:
  - id: start
    type: start
  - id: outline
    type: ai-generate
    label: Outline
    config:
      system: "You are a concise technical editor."
      prompt: "Write a five point outline for an article about {{ input.topic }}."
      temperature: 0.4
  - id: draft
    type: ai-generate
    label: Draft
    config:
      prompt: "Write the article following this outline:\n{{ nodes.outline.text }}"
      max_output_tokens: 2048
  - id: polish
    type: transform
    label: Tidy whitespace
    config:
      operation: trim
      input: nodes.draft.text
  - id: done
    type: log
    config:
      message: "Draft about {{ input.topic }} is ready"
  - id: end
    type: end
    config:
      output: "{{ nodes.polish.result }}"
edges:
  - source: start
    target: outline
  - source: outline
    target: draft
  - source: draft
    target: polish
  - source: polish
    target: done
  - source: done
    target: end
"#;

const TEMPLATES: [(&str, &str); 3] = [
    ("hello-world", HELLO_WORLD),
    ("api-monitor", API_MONITOR),
    ("content-pipeline", CONTENT_PIPELINE),
];

/// A built-in workflow and the id it is requested by
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowTemplate {
    pub id: String,
    pub workflow: Workflow,
}

/// All built-in templates
pub fn builtin() -> Vec<WorkflowTemplate> {
    TEMPLATES
        .iter()
        .filter_map(|(id, yaml)| match WorkflowLoader::parse_yaml(yaml) {
            Ok(workflow) => Some(WorkflowTemplate {
                id: id.to_string(),
                workflow,
            }),
            Err(e) => {
                log::error!("Built-in template '{}' does not parse: {}", id, e);
                None
            }
        })
        .collect()
}

/// A new copy of template `id` with its own workflow id and timestamps
pub fn instantiate(id: &str) -> Option<Workflow> {
    let template = builtin().into_iter().find(|t| t.id == id)?;
    let mut workflow = template.workflow;
    let now = Utc::now();
    workflow.id = uuid::Uuid::new_v4().to_string();
    workflow.created_at = now;
    workflow.updated_at = now;
    Some(workflow)
}
