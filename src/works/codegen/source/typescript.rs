// SPDX-License-Identifier: MIT

use serde_json::Value;

use super::{camel_case, number, quote, with_base_url, Code, Step};
use crate::adk::agent::AgentDefinition;
use crate::adk::model::gemini::DEFAULT_MODEL;
use crate::works::executor::{
    parse_config, AiGenerateConfig, ApiCallConfig, ConditionConfig, DelayConfig, EndConfig,
    LogConfig, TransformConfig, TransformOperation,
};
use crate::works::engine::LogLevel;
use crate::works::workflow::condition::{self, Expression, Literal};
use crate::works::workflow::types::{Node, NodeType, Workflow};

const HELPERS: &str = r##"
type Ctx = Record<string, any>;

function lookup(value: any, path: string): any {
  for (const part of path.split(".")) {
    if (value === null || value === undefined || typeof value !== "object") return null;
    value = value[part];
  }
  return value ?? null;
}

function text(value: unknown): string {
  if (value === null || value === undefined) return "";
  return typeof value === "string" ? value : JSON.stringify(value);
}

function render(template: string, ctx: Ctx): string {
  return template.replace(/\{\{\s*([\w.-]+)\s*\}\}/g, (_match, path: string) => text(lookup(ctx, path)));
}

function renderValue(value: any, ctx: Ctx): any {
  if (typeof value === "string") return render(value, ctx);
  if (Array.isArray(value)) return value.map((v) => renderValue(v, ctx));
  if (value && typeof value === "object") {
    return Object.fromEntries(Object.entries(value).map(([k, v]) => [k, renderValue(v, ctx)]));
  }
  return value;
}

function compare(left: any, op: string, right: any): boolean {
  switch (op) {
    case "==":
      return JSON.stringify(left) === JSON.stringify(right);
    case "!=":
      return JSON.stringify(left) !== JSON.stringify(right);
    case "contains":
      if (typeof left === "string" || Array.isArray(left)) return left.includes(right);
      if (left && typeof left === "object") return right in left;
      return false;
    default:
      if (typeof left !== "number" || typeof right !== "number") return false;
      if (op === ">") return left > right;
      if (op === ">=") return left >= right;
      if (op === "<") return left < right;
      return left <= right;
  }
}
"##;

const GENERATE: &str = r##"
async function generate(
  prompt: string,
  system: string | null,
  model: string,
  generationConfig: Record<string, number> = {},
): Promise<string> {
  const body: Record<string, unknown> = {
    contents: [{ role: "user", parts: [{ text: prompt }] }],
    generationConfig,
  };
  if (system) body.systemInstruction = { parts: [{ text: system }] };
  const response = await fetch(`__BASE_URL__/v1beta/models/${model}:generateContent`, {
    method: "POST",
    headers: { "Content-Type": "application/json", "x-goog-api-key": process.env.GOOGLE_API_KEY ?? "" },
    body: JSON.stringify(body),
  });
  if (!response.ok) throw new Error(`Gemini returned ${response.status}`);
  const data = await response.json();
  const parts: { text?: string }[] = data.candidates?.[0]?.content?.parts ?? [];
  return parts.map((part) => part.text ?? "").join("");
}
"##;

pub(super) fn workflow(workflow: &Workflow, steps: &[Step]) -> String {
    let mut code = Code::new("  ");
    code.line("/**");
    code.line(format!(" * {}", workflow.name));
    if !workflow.description.is_empty() {
        code.line(" *");
        code.line(format!(" * {}", workflow.description));
    }
    code.line(" *");
    code.line(" * Generated by AI Works. Runs on Node 18+ (global fetch).");
    code.line(" */");
    code.blank();
    code.block(HELPERS);

    if steps.iter().any(|s| s.node.node_type == NodeType::AiGenerate) {
        code.blank();
        code.block(&with_base_url(GENERATE));
    }

    for step in steps {
        code.blank();
        code.line(format!("// {} ({})", step.node.display_name(), step.node.node_type));
        code.line(format!(
            "async function {}(ctx: Ctx): Promise<unknown> {{",
            camel_case(&step.name)
        ));
        code.indent();
        node_body(&mut code, step.node);
        code.dedent();
        code.line("}");
    }

    code.blank();
    code.line("export async function runWorkflow(input: unknown = null): Promise<Ctx> {");
    code.indent();
    code.line("const ctx: Ctx = { input, nodes: {}, last: null };");
    for step in steps {
        let id = quote(&step.node.id);
        if let Some((condition, branch)) = step.guard {
            code.line(format!(
                "if (ctx.nodes[{}]?.result === {}) {{",
                quote(condition),
                branch
            ));
            code.indent();
        }
        code.line(format!(
            "ctx.nodes[{}] = await {}(ctx);",
            id,
            camel_case(&step.name)
        ));
        code.line(format!("ctx.last = ctx.nodes[{}];", id));
        if step.guard.is_some() {
            code.dedent();
            code.line("}");
        }
    }
    code.line("return ctx;");
    code.dedent();
    code.line("}");
    code.blank();
    code.line(
        "runWorkflow(process.argv[2] ?? null).then((ctx) => console.log(JSON.stringify(ctx, null, 2)));",
    );
    code.finish()
}

fn node_body(code: &mut Code, node: &Node) {
    if let Err(message) = try_node_body(code, node) {
        code.line(format!("throw new Error({});", quote(&message)));
    }
}

fn try_node_body(code: &mut Code, node: &Node) -> Result<(), String> {
    match node.node_type {
        NodeType::Start => code.line("return { input: ctx.input };"),
        NodeType::End => {
            let config: EndConfig = parse_config(node).map_err(|e| e.to_string())?;
            match config.output {
                Some(t) => code.line(format!("return {{ output: render({}, ctx) }};", quote(&t))),
                None => code.line("return { output: ctx.last };"),
            }
        }
        NodeType::ApiCall => {
            let config: ApiCallConfig = parse_config(node).map_err(|e| e.to_string())?;
            let headers: Vec<String> = config
                .headers
                .iter()
                .map(|(k, v)| format!("{}: render({}, ctx)", quote(k), quote(v)))
                .collect();
            code.line(format!(
                "const response = await fetch(render({}, ctx), {{",
                quote(&config.url)
            ));
            code.indent();
            code.line(format!("method: {},", quote(&config.method.to_uppercase())));
            code.line(format!("headers: {{ {} }},", headers.join(", ")));
            match &config.body {
                None | Some(Value::Null) => {}
                Some(Value::String(s)) => code.line(format!("body: render({}, ctx),", quote(s))),
                Some(body) => code.line(format!(
                    "body: JSON.stringify(renderValue({}, ctx)),",
                    body
                )),
            }
            code.line(format!("signal: AbortSignal.timeout({}),", config.timeout_ms));
            code.dedent();
            code.line("});");
            if !config.allow_error_status {
                code.line("if (!response.ok) throw new Error(`HTTP ${response.status}`);");
            }
            code.line("const raw = await response.text();");
            code.line("let data: unknown;");
            code.line("try {");
            code.line("  data = JSON.parse(raw);");
            code.line("} catch {");
            code.line("  data = raw;");
            code.line("}");
            code.line("return { status: response.status, ok: response.ok, data };");
        }
        NodeType::Transform => {
            let config: TransformConfig = parse_config(node).map_err(|e| e.to_string())?;
            match &config.input {
                Some(path) => code.line(format!("const value = lookup(ctx, {});", quote(path))),
                None => code.line("const value = ctx.last;"),
            }
            let result = match config.operation {
                TransformOperation::Template => {
                    let t = config.template.as_deref().ok_or("template operation needs `template`")?;
                    format!("render({}, ctx)", quote(t))
                }
                TransformOperation::Uppercase => "text(value).toUpperCase()".to_string(),
                TransformOperation::Lowercase => "text(value).toLowerCase()".to_string(),
                TransformOperation::Trim => "text(value).trim()".to_string(),
                TransformOperation::JsonParse => {
                    "typeof value === \"string\" ? JSON.parse(value) : value".to_string()
                }
                TransformOperation::JsonStringify => "JSON.stringify(value)".to_string(),
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
                    format!("{{ {} }}", fields.join(", "))
                }
            };
            code.line(format!("return {{ result: {} }};", result));
        }
        NodeType::Condition => {
            let config: ConditionConfig = parse_config(node).map_err(|e| e.to_string())?;
            let expr = condition::parse(&config.expression).map_err(|e| e.to_string())?;
            code.line(format!("// {}", config.expression));
            code.line(format!("return {{ result: {} }};", expression(&expr)));
        }
        NodeType::Delay => {
            let config: DelayConfig = parse_config(node).map_err(|e| e.to_string())?;
            code.line(format!(
                "await new Promise((resolve) => setTimeout(resolve, {}));",
                config.duration_ms
            ));
            code.line(format!("return {{ waited_ms: {} }};", config.duration_ms));
        }
        NodeType::Log => {
            let config: LogConfig = parse_config(node).map_err(|e| e.to_string())?;
            let method = match config.level {
                LogLevel::Debug => "debug",
                LogLevel::Info => "log",
                LogLevel::Warn => "warn",
                LogLevel::Error => "error",
            };
            code.line(format!("const message = render({}, ctx);", quote(&config.message)));
            code.line(format!("console.{}(message);", method));
            code.line("return { message };");
        }
        NodeType::AiGenerate => {
            let config: AiGenerateConfig = parse_config(node).map_err(|e| e.to_string())?;
            let system = match &config.system {
                Some(s) => format!("render({}, ctx)", quote(s)),
                None => "null".to_string(),
            };
            let generation = super::generation_config(config.temperature, config.max_output_tokens);
            code.line("const reply = await generate(");
            code.indent();
            code.line(format!("render({}, ctx),", quote(&config.prompt)));
            code.line(format!("{},", system));
            code.line(format!(
                "{},",
                quote(config.model.as_deref().unwrap_or(DEFAULT_MODEL))
            ));
            code.line(format!("{},", generation));
            code.dedent();
            code.line(");");
            code.line("return { text: reply };");
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
        Expression::And(l, r) => format!("({} && {})", expression(l), expression(r)),
        Expression::Or(l, r) => format!("({} || {})", expression(l), expression(r)),
        Expression::Not(inner) => format!("!{}", expression(inner)),
        Expression::True => "true".to_string(),
        Expression::False => "false".to_string(),
    }
}

fn literal(lit: &Literal) -> String {
    match lit {
        Literal::String(s) => quote(s),
        Literal::Number(n) => number(*n),
        Literal::Boolean(b) => b.to_string(),
        Literal::Null => "null".to_string(),
    }
}

pub(super) fn agent(agent: &AgentDefinition, model: &str, config: &Value) -> String {
    let mut code = Code::new("  ");
    code.line("/**");
    code.line(format!(" * {}: {}", agent.name, agent.description));
    code.line(" *");
    code.line(" * Generated by AI Works. Runs on Node 18+ (global fetch).");
    code.line(" */");
    code.blank();
    code.line(format!("const INSTRUCTIONS = {};", quote(&agent.instructions)));
    code.line(format!("const MODEL = {};", quote(model)));
    code.line(format!("const GENERATION_CONFIG = {};", config));
    code.blank();
    code.block(&with_base_url(GENERATE));
    code.blank();
    code.line("const prompt = process.argv.slice(2).join(\" \");");
    code.line("generate(prompt, INSTRUCTIONS, MODEL, GENERATION_CONFIG).then((reply) => console.log(reply));");
    code.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::works::codegen::source::tests::{agent as sample_agent, sample};
    use crate::works::codegen::{generate_agent_code, generate_workflow_code, Language};

    #[test]
    fn test_workflow_program() {
        let code = generate_workflow_code(&sample(), Language::TypeScript);
        assert!(code.contains("async function nodeFetchStatus(ctx: Ctx): Promise<unknown> {"));
        assert!(code.contains("  method: \"GET\","));
        assert!(code.contains("  if (ctx.nodes[\"is-up\"]?.result === true) {"));
        assert!(code.contains("    ctx.nodes[\"ok\"] = await nodeOk(ctx);"));
        assert!(code.contains("return { result: compare(lookup(ctx, \"nodes.fetch-status.status\"), \"==\", 200) };"));
        assert!(code.contains("export async function runWorkflow"));
    }

    #[test]
    fn test_expressions() {
        let expr = condition::parse("not a == 'x' or b <= 2.5").unwrap();
        assert_eq!(
            expression(&expr),
            "(!compare(lookup(ctx, \"a\"), \"==\", \"x\") || compare(lookup(ctx, \"b\"), \"<=\", 2.5))"
        );
    }

    #[test]
    fn test_agent_program() {
        let code = generate_agent_code(&sample_agent(), Language::TypeScript);
        assert!(code.contains("const MODEL = \"gemini-1.5-pro\";"));
        assert!(code.contains("const GENERATION_CONFIG = {\"temperature\":0.7};"));
    }
}
