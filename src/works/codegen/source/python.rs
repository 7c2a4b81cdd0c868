// SPDX-License-Identifier: MIT

use serde_json::Value;

use super::{number, quote, with_base_url, Code, Step};
use crate::adk::agent::AgentDefinition;
use crate::works::executor::{
    parse_config, AiGenerateConfig, ApiCallConfig, ConditionConfig, DelayConfig, EndConfig,
    LogConfig, TransformConfig, TransformOperation,
};
use crate::works::workflow::condition::{self, Expression, Literal};
use crate::works::workflow::types::{Node, NodeType, Workflow};

const HELPERS: &str = r##"
def lookup(value, path):
    for part in path.split("."):
        if isinstance(value, dict):
            value = value.get(part)
        elif isinstance(value, list) and part.isdigit() and int(part) < len(value):
            value = value[int(part)]
        else:
            return None
    return value


def text(value):
    if value is None:
        return ""
    return value if isinstance(value, str) else json.dumps(value)


def render(template, ctx):
    return re.sub(r"\{\{\s*([\w.-]+)\s*\}\}", lambda m: text(lookup(ctx, m.group(1))), template)


def render_value(value, ctx):
    if isinstance(value, str):
        return render(value, ctx)
    if isinstance(value, list):
        return [render_value(v, ctx) for v in value]
    if isinstance(value, dict):
        return {k: render_value(v, ctx) for k, v in value.items()}
    return value


def compare(left, op, right):
    if op == "==":
        return left == right
    if op == "!=":
        return left != right
    if op == "contains":
        return isinstance(left, (str, list, dict)) and right in left
    if isinstance(left, bool) or not isinstance(left, (int, float)):
        return False
    return {">": left > right, ">=": left >= right, "<": left < right, "<=": left <= right}[op]
"##;

const GENERATE: &str = r##"
def generate(prompt, system=None, model="gemini-1.5-flash", generation_config=None):
    body = {"contents": [{"role": "user", "parts": [{"text": prompt}]}]}
    if system:
        body["systemInstruction"] = {"parts": [{"text": system}]}
    if generation_config:
        body["generationConfig"] = generation_config
    response = requests.post(
        f"__BASE_URL__/v1beta/models/{model}:generateContent",
        headers={"x-goog-api-key": os.environ["GOOGLE_API_KEY"]},
        json=body,
        timeout=60,
    )
    response.raise_for_status()
    parts = response.json()["candidates"][0]["content"]["parts"]
    return "".join(part.get("text", "") for part in parts)
"##;

pub(super) fn workflow(workflow: &Workflow, steps: &[Step]) -> String {
    let mut code = Code::new("    ");
    code.line("\"\"\"");
    code.line(&workflow.name);
    if !workflow.description.is_empty() {
        code.blank();
        code.line(&workflow.description);
    }
    code.blank();
    code.line("Generated by AI Works. Requires: pip install requests");
    code.line("\"\"\"");
    code.block("import json\nimport os\nimport re\nimport time\n\nimport requests");
    code.blank();
    code.block(HELPERS);

    if steps.iter().any(|s| s.node.node_type == NodeType::AiGenerate) {
        code.blank();
        code.block(&with_base_url(GENERATE));
    }

    for step in steps {
        code.blank();
        code.blank();
        code.line(format!("def {}(ctx):", step.name));
        code.indent();
        code.line(format!(
            "\"\"\"{} ({})\"\"\"",
            step.node.display_name().replace('"', "'"),
            step.node.node_type
        ));
        node_body(&mut code, step.node);
        code.dedent();
    }

    code.blank();
    code.blank();
    code.line("def run_workflow(input_data=None):");
    code.indent();
    code.line("ctx = {\"input\": input_data, \"nodes\": {}, \"last\": None}");
    for step in steps {
        let id = quote(&step.node.id);
        if let Some((condition, branch)) = step.guard {
            code.line(format!(
                "if ctx[\"nodes\"].get({}, {{}}).get(\"result\") is {}:",
                quote(condition),
                if branch { "True" } else { "False" }
            ));
            code.indent();
        }
        code.line(format!("ctx[\"nodes\"][{}] = {}(ctx)", id, step.name));
        code.line(format!("ctx[\"last\"] = ctx[\"nodes\"][{}]", id));
        if step.guard.is_some() {
            code.dedent();
        }
    }
    code.line("return ctx");
    code.dedent();

    code.blank();
    code.blank();
    code.block(
        r#"
if __name__ == "__main__":
    import sys

    result = run_workflow(sys.argv[1] if len(sys.argv) > 1 else None)
    print(json.dumps(result, indent=2))
"#,
    );
    code.finish()
}

fn node_body(code: &mut Code, node: &Node) {
    if let Err(message) = try_node_body(code, node) {
        code.line(format!("raise ValueError({})", quote(&message)));
    }
}

fn try_node_body(code: &mut Code, node: &Node) -> Result<(), String> {
    match node.node_type {
        NodeType::Start => code.line("return {\"input\": ctx[\"input\"]}"),
        NodeType::End => {
            let config: EndConfig = parse_config(node).map_err(|e| e.to_string())?;
            match config.output {
                Some(t) => code.line(format!("return {{\"output\": render({}, ctx)}}", quote(&t))),
                None => code.line("return {\"output\": ctx[\"last\"]}"),
            }
        }
        NodeType::ApiCall => {
            let config: ApiCallConfig = parse_config(node).map_err(|e| e.to_string())?;
            let headers: Vec<String> = config
                .headers
                .iter()
                .map(|(k, v)| format!("{}: render({}, ctx)", quote(k), quote(v)))
                .collect();
            code.line("response = requests.request(");
            code.indent();
            code.line(format!("{},", quote(&config.method.to_uppercase())));
            code.line(format!("render({}, ctx),", quote(&config.url)));
            code.line(format!("headers={{{}}},", headers.join(", ")));
            match &config.body {
                None | Some(Value::Null) => {}
                Some(Value::String(s)) => code.line(format!("data=render({}, ctx),", quote(s))),
                Some(body) => code.line(format!(
                    "json=render_value(json.loads({}), ctx),",
                    quote(&body.to_string())
                )),
            }
            code.line(format!("timeout={},", number(config.timeout_ms as f64 / 1000.0)));
            code.dedent();
            code.line(")");
            if !config.allow_error_status {
                code.line("response.raise_for_status()");
            }
            code.line("try:");
            code.line("    data = response.json()");
            code.line("except ValueError:");
            code.line("    data = response.text");
            code.line("return {\"status\": response.status_code, \"ok\": response.ok, \"data\": data}");
        }
        NodeType::Transform => {
            let config: TransformConfig = parse_config(node).map_err(|e| e.to_string())?;
            match &config.input {
                Some(path) => code.line(format!("value = lookup(ctx, {})", quote(path))),
                None => code.line("value = ctx[\"last\"]"),
            }
            let result = match config.operation {
                TransformOperation::Template => {
                    let t = config.template.as_deref().ok_or("template operation needs `template`")?;
                    format!("render({}, ctx)", quote(t))
                }
                TransformOperation::Uppercase => "text(value).upper()".to_string(),
                TransformOperation::Lowercase => "text(value).lower()".to_string(),
                TransformOperation::Trim => "text(value).strip()".to_string(),
                TransformOperation::JsonParse => {
                    "json.loads(value) if isinstance(value, str) else value".to_string()
                }
                TransformOperation::JsonStringify => "json.dumps(value)".to_string(),
                TransformOperation::Extract => {
                    let path = config.path.as_deref().ok_or("extract operation needs `path`")?;
                    format!("lookup(value, {})", quote(path))
                }
                TransformOperation::Map => {
                    let fields: Vec<String> = config
                        .fields
                        .iter()
                        .map(|(k, p)| format!("{}: lookup(ctx, {})", quote(k), quote(p)))
                        .collect();
                    format!("{{{}}}", fields.join(", "))
                }
            };
            code.line(format!("return {{\"result\": {}}}", result));
        }
        NodeType::Condition => {
            let config: ConditionConfig = parse_config(node).map_err(|e| e.to_string())?;
            let expr = condition::parse(&config.expression).map_err(|e| e.to_string())?;
            code.line(format!("# {}", config.expression));
            code.line(format!("return {{\"result\": {}}}", expression(&expr)));
        }
        NodeType::Delay => {
            let config: DelayConfig = parse_config(node).map_err(|e| e.to_string())?;
            code.line(format!("time.sleep({})", number(config.duration_ms as f64 / 1000.0)));
            code.line(format!("return {{\"waited_ms\": {}}}", config.duration_ms));
        }
        NodeType::Log => {
            let config: LogConfig = parse_config(node).map_err(|e| e.to_string())?;
            let level = serde_json::to_value(config.level)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            code.line(format!("message = render({}, ctx)", quote(&config.message)));
            code.line(format!("print({} + message)", quote(&format!("[{}] ", level))));
            code.line("return {\"message\": message}");
        }
        NodeType::AiGenerate => {
            let config: AiGenerateConfig = parse_config(node).map_err(|e| e.to_string())?;
            let system = match &config.system {
                Some(s) => format!("render({}, ctx)", quote(s)),
                None => "None".to_string(),
            };
            let model = config
                .model
                .as_deref()
                .unwrap_or(crate::adk::model::gemini::DEFAULT_MODEL);
            let generation = super::generation_config(config.temperature, config.max_output_tokens);
            code.line("reply = generate(");
            code.indent();
            code.line(format!("render({}, ctx),", quote(&config.prompt)));
            code.line(format!("{},", system));
            code.line(format!("{},", quote(model)));
            code.line(format!("json.loads({}),", quote(&generation.to_string())));
            code.dedent();
            code.line(")");
            code.line("return {\"text\": reply}");
        }
    }
    Ok(())
}

fn expression(expr: &Expression) -> String {
    match expr {
        Expression::Compare { left, op, right } => format!(
            "compare(lookup(ctx, {}), {}, {})",
            quote(left),
            quote(&op.to_string()),
            literal(right)
        ),
        Expression::And(l, r) => format!("({} and {})", expression(l), expression(r)),
        Expression::Or(l, r) => format!("({} or {})", expression(l), expression(r)),
        Expression::Not(inner) => format!("not {}", group(inner)),
        Expression::True => "True".to_string(),
        Expression::False => "False".to_string(),
    }
}

fn group(expr: &Expression) -> String {
    match expr {
        Expression::Compare { .. } => format!("({})", expression(expr)),
        _ => expression(expr),
    }
}

fn literal(lit: &Literal) -> String {
    match lit {
        Literal::String(s) => quote(s),
        Literal::Number(n) => number(*n),
        Literal::Boolean(true) => "True".to_string(),
        Literal::Boolean(false) => "False".to_string(),
        Literal::Null => "None".to_string(),
    }
}

pub(super) fn agent(agent: &AgentDefinition, model: &str, config: &Value) -> String {
    let mut code = Code::new("    ");
    code.line(format!(
        "\"\"\"{}: {}\"\"\"",
        agent.name.replace('"', "'"),
        agent.description.replace('"', "'")
    ));
    code.block("import os\nimport sys\n\nimport requests");
    code.blank();
    code.line(format!("INSTRUCTIONS = {}", quote(&agent.instructions)));
    code.line(format!("MODEL = {}", quote(model)));
    code.line(format!("GENERATION_CONFIG = {}", config));
    code.blank();
    code.block(&with_base_url(GENERATE));
    code.blank();
    code.blank();
    code.block(
        r#"
if __name__ == "__main__":
    prompt = " ".join(sys.argv[1:]) or input("> ")
    print(generate(prompt, INSTRUCTIONS, MODEL, GENERATION_CONFIG))
"#,
    );
    code.finish()
}
