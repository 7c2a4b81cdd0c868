// SPDX-License-Identifier: MIT

//! Drafting workflows with a model
//!
//! The model is asked for a single JSON document. Replies are often not
//! quite JSON, so [`repair_json`] cleans them up before parsing.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::adk::error::{AiWorksError, EngineError};
use crate::adk::model::{Content, GenerationConfig, Model};
use crate::works::workflow::types::{Position, Workflow};

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)```").expect("code fence regex is valid")
});

const SYSTEM_PROMPT: &str = r#"You design workflows for an automation engine.
Reply with one JSON object and nothing else:
{
  "name": string,
  "description": string,
  "nodes": [{"id": string, "type": string, "label": string, "config": object}],
  "edges": [{"source": node id, "target": node id, "branch": "true" | "false" (only from condition nodes)}]
}
Node types and their config:
- start: {} (exactly one)
- end: {"output": "template"} (no outgoing edges)
- api-call: {"url", "method", "headers", "body", "allow_error_status"}
- transform: {"operation": template|uppercase|lowercase|trim|json_parse|json_stringify|extract|map, "input": "variable path", "template", "path", "fields"}
- condition: {"expression": "nodes.<id>.<field> == 'value'"} using == != > >= < <= contains and or not
- delay: {"duration_ms": number}
- log: {"message": "template", "level": debug|info|warn|error}
- ai-generate: {"prompt": "template", "system": "template", "temperature": number}
Templates use {{ path }} placeholders: {{ input }} is the run input and
{{ nodes.<id>.<field> }} a node output. Outputs: start {input}, api-call
{status, ok, data}, transform {result}, condition {result}, log {message},
ai-generate {text}."#;

/// Best-effort cleanup of almost-JSON model output.
///
/// Handles code fences, prose around the object, smart quotes, trailing
/// commas and `//` line comments.
pub fn repair_json(raw: &str) -> String {
    let text = match CODE_FENCE.captures(raw) {
        Some(caps) => caps[1].to_string(),
        None => raw.to_string(),
    };

    let text = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text.as_str(),
    };

    normalize_outside_strings(text)
}

fn is_curly_quote(c: char) -> bool {
    matches!(c, '\u{201C}' | '\u{201D}' | '\u{201E}')
}

/// Turns curly-quoted strings into JSON strings and drops `//` comments and
/// trailing commas. Contents of ASCII-quoted strings are copied unchanged.
fn normalize_outside_strings(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    // Some(true) while inside a string opened by a curly quote
    let mut string: Option<bool> = None;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some(curly) = string {
            if escaped {
                escaped = false;
                out.push(c);
            } else if c == '\\' {
                escaped = true;
                out.push(c);
            } else if curly && is_curly_quote(c) {
                string = None;
                out.push('"');
            } else if curly && c == '"' {
                out.push_str("\\\"");
            } else {
                if c == '"' {
                    string = None;
                }
                out.push(c);
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                string = Some(false);
                out.push(c);
            }
            c if is_curly_quote(c) => {
                string = Some(true);
                out.push('"');
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
        i += 1;
    }
    out
}

/// Ask `model` for a workflow matching `description`.
///
/// The result has a fresh id, current timestamps and a left-to-right layout,
/// and is guaranteed to pass validation.
pub async fn generate_workflow(
    model: &dyn Model,
    description: &str,
) -> Result<Workflow, AiWorksError> {
    let history = vec![Content::system(SYSTEM_PROMPT), Content::user(description)];
    let config = GenerationConfig {
        temperature: Some(0.2),
        ..Default::default()
    };

    log::info!("Generating workflow with {}", model.model_name());
    let reply = model.generate_content(&history, Some(&config)).await?;
    let raw = reply.text_content();
    log::debug!("Model reply: {}", raw);

    let mut workflow: Workflow = serde_json::from_str(&repair_json(&raw))?;
    let report = workflow.validate();
    if !report.is_valid() {
        return Err(EngineError::InvalidWorkflow(report.errors).into());
    }

    let now = Utc::now();
    workflow.id = uuid::Uuid::new_v4().to_string();
    workflow.created_at = now;
    workflow.updated_at = now;
    layout(&mut workflow);
    Ok(workflow)
}

/// Place nodes without a position in columns by breadth-first order
fn layout(workflow: &mut Workflow) {
    let order: Vec<String> = workflow.bfs_order().iter().map(|n| n.id.clone()).collect();
    for node in workflow.nodes.iter_mut().filter(|n| n.position.is_none()) {
        let column = order
            .iter()
            .position(|id| *id == node.id)
            .unwrap_or(order.len());
        node.position = Some(Position {
            x: 100.0 + 250.0 * column as f64,
            y: 100.0,
        });
    }
}
