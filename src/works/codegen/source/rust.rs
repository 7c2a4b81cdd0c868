// SPDX-License-Identifier: MIT

use serde_json::Value;

use super::{number, with_base_url, Code, Step};
use crate::adk::agent::AgentDefinition;
use crate::adk::model::gemini::DEFAULT_MODEL;
use crate::works::engine::LogLevel;
use crate::works::executor::{
    parse_config, AiGenerateConfig, ApiCallConfig, ConditionConfig, DelayConfig, EndConfig,
    LogConfig, TransformConfig, TransformOperation,
};
use crate::works::workflow::condition::{self, Expression, Literal};
use crate::works::workflow::types::{Node, NodeType, Workflow};

const HELPERS: &str = r##"
use serde_json::{json, Value};

fn lookup(value: &Value, path: &str) -> Value {
    let mut current = value;
    for part in path.split('.') {
        let next = match current {
            Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
            other => other.get(part),
        };
        match next {
            Some(v) => current = v,
            None => return Value::Null,
        }
    }
    current.clone()
}

fn text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render(template: &str, ctx: &Value) -> String {
    let placeholder = regex::Regex::new(r"\{\{\s*([\w.-]+)\s*\}\}").unwrap();
    placeholder
        .replace_all(template, |caps: &regex::Captures| text(&lookup(ctx, &caps[1])))
        .into_owned()
}

fn render_value(value: &Value, ctx: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(render(s, ctx)),
        Value::Array(items) => items.iter().map(|v| render_value(v, ctx)).collect(),
        Value::Object(map) => Value::Object(
            map.iter().map(|(k, v)| (k.clone(), render_value(v, ctx))).collect(),
        ),
        other => other.clone(),
    }
}

fn compare(left: &Value, op: &str, right: &Value) -> bool {
    match op {
        "==" => left == right,
        "!=" => left != right,
        "contains" => match (left, right) {
            (Value::String(s), Value::String(r)) => s.contains(r.as_str()),
            (Value::Array(items), r) => items.contains(r),
            (Value::Object(map), Value::String(key)) => map.contains_key(key),
            _ => false,
        },
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(l), Some(r)) => match op {
                ">" => l > r,
                ">=" => l >= r,
                "<" => l < r,
                _ => l <= r,
            },
            _ => false,
        },
    }
}
"##;

const GENERATE: &str = r##"
fn generate(prompt: &str, system: Option<&str>, model: &str, generation_config: Value) -> String {
    let mut body = json!({
        "contents": [{"role": "user", "parts": [{"text": prompt}]}],
        "generationConfig": generation_config,
    });
    if let Some(system) = system {
        body["systemInstruction"] = json!({"parts": [{"text": system}]});
    }
    let key = std::env::var("GOOGLE_API_KEY").expect("GOOGLE_API_KEY must be set");
    let url = format!("__BASE_URL__/v1beta/models/{}:generateContent", model);
    let response: Value = reqwest::blocking::Client::new()
        .post(url)
        .header("x-goog-api-key", key)
        .json(&body)
        .send()
        .and_then(|r| r.error_for_status())
        .and_then(|r| r.json())
        .expect("Gemini request failed");
    response["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default()
}
"##;

/// Rust string literal
fn quote(s: &str) -> String {
    format!("{:?}", s)
}

pub(super) fn workflow(workflow: &Workflow, steps: &[Step]) -> String {
    let mut code = Code::new("    ");
    code.line(format!("//! {}", workflow.name));
    if !workflow.description.is_empty() {
        code.line("//!");
        code.line(format!("//! {}", workflow.description));
    }
    code.line("//!");
    code.line("//! Generated by AI Works. Dependencies: serde_json, regex,");
    code.line("//! reqwest with the \"blocking\" and \"json\" features.");
    code.blank();
    code.block(HELPERS);

    if steps.iter().any(|s| s.node.node_type == NodeType::AiGenerate) {
        code.blank();
        code.block(&with_base_url(GENERATE));
    }

    for step in steps {
        code.blank();
        code.line(format!("/// {} ({})", step.node.display_name(), step.node.node_type));
        code.line(format!("fn {}(ctx: &Value) -> Value {{", step.name));
        code.indent();
        node_body(&mut code, step.node);
        code.dedent();
        code.line("}");
    }

    code.blank();
    code.line("pub fn run_workflow(input: Value) -> Value {");
    code.indent();
    code.line("let mut ctx = json!({\"input\": input, \"nodes\": {}, \"last\": null});");
    for step in steps {
        let id = quote(&step.node.id);
        if let Some((condition, branch)) = step.guard {
            code.line(format!(
                "if ctx[\"nodes\"][{}][\"result\"] == json!({}) {{",
                quote(condition),
                branch
            ));
            code.indent();
        }
        code.line(format!("let output = {}(&ctx);", step.name));
        code.line(format!("ctx[\"nodes\"][{}] = output.clone();", id));
        code.line("ctx[\"last\"] = output;");
        if step.guard.is_some() {
            code.dedent();
            code.line("}");
        }
    }
    code.line("ctx");
    code.dedent();
    code.line("}");
    code.blank();
    code.block(
        r#"
fn main() {
    let input = std::env::args().nth(1).map(Value::String).unwrap_or(Value::Null);
    let ctx = run_workflow(input);
    println!("{}", serde_json::to_string_pretty(&ctx).unwrap());
}
"#,
    );
    code.finish()
}

fn node_body(code: &mut Code, node: &Node) {
    if let Err(message) = try_node_body(code, node) {
        code.line(format!("panic!(\"{{}}\", {})", quote(&message)));
    }
}

fn try_node_body(code: &mut Code, node: &Node) -> Result<(), String> {
    match node.node_type {
        NodeType::Start => code.line("json!({\"input\": ctx[\"input\"].clone()})"),
        NodeType::End => {
            let config: EndConfig = parse_config(node).map_err(|e| e.to_string())?;
            match config.output {
                Some(t) => code.line(format!("json!({{\"output\": render({}, ctx)}})", quote(&t))),
                None => code.line("json!({\"output\": ctx[\"last\"].clone()})"),
            }
        }
        NodeType::ApiCall => {
            let config: ApiCallConfig = parse_config(node).map_err(|e| e.to_string())?;
            code.line(format!(
                "let method = reqwest::Method::from_bytes({}.as_bytes()).unwrap();",
                quote(&config.method.to_uppercase())
            ));
            code.line("let mut request = reqwest::blocking::Client::new()");
            code.indent();
            code.line(format!(".request(method, render({}, ctx))", quote(&config.url)));
            code.line(format!(
                ".timeout(std::time::Duration::from_millis({}));",
                config.timeout_ms
            ));
            code.dedent();
            for (name, value) in &config.headers {
                code.line(format!(
                    "request = request.header({}, render({}, ctx));",
                    quote(name),
                    quote(value)
                ));
            }
            match &config.body {
                None | Some(Value::Null) => {}
                Some(Value::String(s)) => {
                    code.line(format!("request = request.body(render({}, ctx));", quote(s)))
                }
                Some(body) => code.line(format!(
                    "request = request.json(&render_value(&json!({}), ctx));",
                    body
                )),
            }
            code.line("let response = request.send().expect(\"request failed\");");
            code.line("let status = response.status();");
            if !config.allow_error_status {
                code.line("assert!(status.is_success(), \"HTTP {}\", status);");
            }
            code.line("let raw = response.text().unwrap_or_default();");
            code.line("let data = serde_json::from_str(&raw).unwrap_or(Value::String(raw));");
            code.line(
                "json!({\"status\": status.as_u16(), \"ok\": status.is_success(), \"data\": data})",
            );
        }
        NodeType::Transform => {
            let config: TransformConfig = parse_config(node).map_err(|e| e.to_string())?;
            match &config.input {
                Some(path) => code.line(format!("let value = lookup(ctx, {});", quote(path))),
                None => code.line("let value = ctx[\"last\"].clone();"),
            }
            let result = match config.operation {
                TransformOperation::Template => {
                    let t = config.template.as_deref().ok_or("template operation needs `template`")?;
                    format!("Value::String(render({}, ctx))", quote(t))
                }
                TransformOperation::Uppercase => "Value::String(text(&value).to_uppercase())".to_string(),
                TransformOperation::Lowercase => "Value::String(text(&value).to_lowercase())".to_string(),
                TransformOperation::Trim => "Value::String(text(&value).trim().to_string())".to_string(),
                TransformOperation::JsonParse => {
                    "serde_json::from_str(&text(&value)).unwrap_or(value)".to_string()
                }
                TransformOperation::JsonStringify => "Value::String(value.to_string())".to_string(),
                TransformOperation::Extract => {
                    let path = config.path.as_deref().ok_or("extract operation needs `path`")?;
                    format!("lookup(&value, {})", quote(path))
                }
                TransformOperation::Map => {
                    let fields: Vec<String> = config
                        .fields
                        .iter()
                        .map(|(k, p)| format!("{}: lookup(ctx, {})", quote(k), quote(p)))
                        .collect();
                    format!("json!({{{}}})", fields.join(", "))
                }
            };
            code.line(format!("json!({{\"result\": {}}})", result));
        }
        NodeType::Condition => {
            let config: ConditionConfig = parse_config(node).map_err(|e| e.to_string())?;
            let expr = condition::parse(&config.expression).map_err(|e| e.to_string())?;
            code.line(format!("// {}", config.expression));
            code.line(format!("json!({{\"result\": {}}})", expression(&expr)));
        }
        NodeType::Delay => {
            let config: DelayConfig = parse_config(node).map_err(|e| e.to_string())?;
            code.line(format!(
                "std::thread::sleep(std::time::Duration::from_millis({}));",
                config.duration_ms
            ));
            code.line(format!("json!({{\"waited_ms\": {}}})", config.duration_ms));
        }
        NodeType::Log => {
            let config: LogConfig = parse_config(node).map_err(|e| e.to_string())?;
            let level = match config.level {
                LogLevel::Debug => "debug",
                LogLevel::Info => "info",
                LogLevel::Warn => "warn",
                LogLevel::Error => "error",
            };
            code.line(format!("let message = render({}, ctx);", quote(&config.message)));
            let print = match config.level {
                LogLevel::Warn | LogLevel::Error => "eprintln",
                _ => "println",
            };
            code.line(format!("{}!(\"[{}] {{}}\", message);", print, level));
            code.line("json!({\"message\": message})");
        }
        NodeType::AiGenerate => {
            let config: AiGenerateConfig = parse_config(node).map_err(|e| e.to_string())?;
            let system = match &config.system {
                Some(s) => format!("Some(render({}, ctx).as_str())", quote(s)),
                None => "None".to_string(),
            };
            let generation = super::generation_config(config.temperature, config.max_output_tokens);
            code.line("let reply = generate(");
            code.indent();
            code.line(format!("&render({}, ctx),", quote(&config.prompt)));
            code.line(format!("{},", system));
            code.line(format!(
                "{},",
                quote(config.model.as_deref().unwrap_or(DEFAULT_MODEL))
            ));
            code.line(format!("json!({}),", generation));
            code.dedent();
            code.line(");");
            code.line("json!({\"text\": reply})");
        }
    }
    Ok(())
}

fn expression(expr: &Expression) -> String {
    match expr {
        Expression::Compare { left, op, right } => format!(
            "compare(&lookup(ctx, {}), {}, &{})",
            quote(left),
            quote(&op.to_string()),
            literal(right)
        ),
        Expression::And(l, r) => format!("({} && {})", expression(l), expression(r)),
        Expression::Or(l, r) => format!("({} || {})", expression(l), expression(r)),
        Expression::Not(inner) => format!("!{}", expression(inner)),
        Expression::True => "true".to_string(),
        Expression::False => "false".to_string(),
    }
}

fn literal(lit: &Literal) -> String {
    match lit {
        Literal::String(s) => format!("json!({})", quote(s)),
        Literal::Number(n) => format!("json!({})", number(*n)),
        Literal::Boolean(b) => format!("json!({})", b),
        Literal::Null => "Value::Null".to_string(),
    }
}

pub(super) fn agent(agent: &AgentDefinition, model: &str, config: &Value) -> String {
    let mut code = Code::new("    ");
    code.line(format!("//! {}: {}", agent.name, agent.description));
    code.line("//!");
    code.line("//! Generated by AI Works. Dependencies: serde_json,");
    code.line("//! reqwest with the \"blocking\" and \"json\" features.");
    code.blank();
    code.line("use serde_json::{json, Value};");
    code.blank();
    code.line(format!("const INSTRUCTIONS: &str = {};", quote(&agent.instructions)));
    code.line(format!("const MODEL: &str = {};", quote(model)));
    code.block(&with_base_url(GENERATE));
    code.blank();
    code.line("fn main() {");
    code.indent();
    code.line("let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(\" \");");
    code.line(format!(
        "println!(\"{{}}\", generate(&prompt, Some(INSTRUCTIONS), MODEL, json!({})));",
        config
    ));
    code.dedent();
    code.line("}");
    code.finish()
}
