//! Integration tests for workflow loading, execution and persistence
//!
//! These tests drive the public API end to end using mock components and a
//! local HTTP server.

use async_trait::async_trait;
use aiworks_rs::adk::agent::{AgentFactory, AgentSpec};
use aiworks_rs::adk::error::{EngineError, ExecutorError, ModelError};
use aiworks_rs::adk::model::{Content, FixedModelProvider, GenerationConfig, Model, ModelProvider};
use aiworks_rs::works::codegen::{self, templates, Language};
use aiworks_rs::works::engine::{
    ExecutionContext, ExecutionEvent, ExecutionStatus, LogLevel, WorkflowRunner,
};
use aiworks_rs::works::executor::{ExecutorRegistry, NodeExecutor};
use aiworks_rs::works::store::WorkflowStore;
use aiworks_rs::works::workflow::{Node, NodeType, WorkflowLoader};
use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

// ============================================================================
// Mock Components
// ============================================================================

/// Mock model that returns predefined responses and remembers prompts
struct MockModel {
    responses: Vec<String>,
    response_index: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockModel {
    fn new(responses: &[&str]) -> Self {
        Self {
            responses: responses.iter().map(|r| r.to_string()).collect(),
            response_index: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Model for MockModel {
    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn generate_content(
        &self,
        history: &[Content],
        _config: Option<&GenerationConfig>,
    ) -> Result<Content, ModelError> {
        if let Some(last) = history.last() {
            self.prompts.lock().unwrap().push(last.text_content());
        }
        let idx = self.response_index.fetch_add(1, Ordering::SeqCst);
        match self.responses.get(idx) {
            Some(text) => Ok(Content::model(text.clone())),
            None => Err(ModelError::InvalidResponse("Max responses reached".into())),
        }
    }
}

fn provider(model: Arc<MockModel>) -> Arc<dyn ModelProvider> {
    Arc::new(FixedModelProvider::new(model))
}

fn runner(models: Option<Arc<dyn ModelProvider>>) -> WorkflowRunner {
    WorkflowRunner::new(ExecutorRegistry::with_builtins(models, 5_000))
}

/// Local stand-in for a monitored service
async fn spawn_service() -> String {
    let app = Router::new()
        .route("/health", get(|| async { Json(json!({"status": "up"})) }))
        .route(
            "/down",
            get(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

// ============================================================================
// Workflow Loading Tests
// ============================================================================

#[test]
fn test_load_yaml_workflow() {
    let yaml = r#"
name: Shout
description: Upper-cases the input
nodes:
  - id: start
    type: start
  - id: shout
    type: transform
    config:
      operation: uppercase
      input: input
  - id: end
    type: end
    config:
      output: "{{ nodes.shout.result }}"
edges:
  - source: start
    target: shout
  - source: shout
    target: end
"#;

    let workflow = WorkflowLoader::parse_yaml(yaml).expect("Failed to parse YAML");
    assert_eq!(workflow.name, "Shout");
    assert_eq!(workflow.nodes.len(), 3);
    assert_eq!(workflow.node("shout").unwrap().node_type, NodeType::Transform);
    assert!(workflow.validate().is_valid());
}

#[test]
fn test_load_workflow_file_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("flow.json");
    let workflow = templates::instantiate("hello-world").unwrap();
    std::fs::write(&json_path, serde_json::to_string(&workflow).unwrap()).unwrap();

    let loaded = WorkflowLoader::load(&json_path).unwrap();
    assert_eq!(loaded, workflow);

    let txt_path = dir.path().join("flow.txt");
    std::fs::write(&txt_path, "name: x").unwrap();
    assert!(WorkflowLoader::load(&txt_path).is_err());
}

#[test]
fn test_invalid_yaml_returns_error() {
    let yaml = r#"
name:
  - invalid structure
"#;

    let result = WorkflowLoader::parse_yaml(yaml);
    assert!(result.is_err());
}

// ============================================================================
// Execution Tests
// ============================================================================

#[tokio::test]
async fn test_hello_world_template_runs() {
    let workflow = templates::instantiate("hello-world").unwrap();
    let ctx = runner(None).run(&workflow, json!("Ada")).await.unwrap();

    assert_eq!(ctx.status, ExecutionStatus::Completed);
    assert_eq!(ctx.final_output, Some(json!("Hello, Ada!")));
    assert_eq!(ctx.logs.len(), 1);
    assert_eq!(ctx.logs[0].level, LogLevel::Info);
    assert_eq!(ctx.node_results.len(), 3);
}

#[tokio::test]
async fn test_api_monitor_follows_the_matching_branch() {
    let base = spawn_service().await;
    let workflow = templates::instantiate("api-monitor").unwrap();
    let runner = runner(None);

    let up = runner
        .run(&workflow, json!({"url": format!("{}/health", base)}))
        .await
        .unwrap();
    assert_eq!(up.status, ExecutionStatus::Completed);
    assert!(up.result("report-up").is_some());
    assert!(up.result("report-down").is_none());
    assert_eq!(up.result("check").unwrap().output.as_ref().unwrap()["data"]["status"], "up");

    let down = runner
        .run(&workflow, json!({"url": format!("{}/down", base)}))
        .await
        .unwrap();
    assert_eq!(down.status, ExecutionStatus::Completed);
    assert!(down.result("report-down").is_some());
    assert!(down.result("report-up").is_none());
    assert_eq!(down.logs[0].level, LogLevel::Error);
}

#[tokio::test]
async fn test_content_pipeline_with_mock_model() {
    let model = Arc::new(MockModel::new(&["1. Intro\n2. Body", "  The article.  "]));
    let workflow = templates::instantiate("content-pipeline").unwrap();

    let ctx = runner(Some(provider(model.clone())))
        .run(&workflow, json!({"topic": "Rust"}))
        .await
        .unwrap();

    assert_eq!(ctx.status, ExecutionStatus::Completed, "{:?}", ctx.error);
    assert_eq!(ctx.final_output, Some(json!("The article.")));

    let prompts = model.prompts.lock().unwrap();
    assert!(prompts[0].contains("about Rust"));
    assert!(prompts[1].contains("1. Intro\n2. Body"));
}

#[tokio::test]
async fn test_ai_node_without_model_fails_the_run() {
    let workflow = templates::instantiate("content-pipeline").unwrap();
    let ctx = runner(None)
        .run(&workflow, json!({"topic": "Rust"}))
        .await
        .unwrap();

    assert_eq!(ctx.status, ExecutionStatus::Failed);
    assert!(ctx.error.as_deref().unwrap().contains("Outline"));
    assert!(!ctx.result("outline").unwrap().is_success());
    assert!(ctx.result("draft").is_none());
}

#[tokio::test]
async fn test_invalid_workflow_is_rejected() {
    let mut workflow = templates::instantiate("hello-world").unwrap();
    workflow.nodes.retain(|n| n.node_type != NodeType::Start);

    let err = runner(None).run(&workflow, Value::Null).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidWorkflow(_)));
}

#[tokio::test]
async fn test_event_stream_matches_context() {
    let workflow = templates::instantiate("hello-world").unwrap();
    let (tx, mut rx) = mpsc::channel(100);

    let ctx = runner(None)
        .run_with_events(&workflow, json!("Bo"), tx)
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(matches!(events.first(), Some(ExecutionEvent::Started { .. })));
    assert!(matches!(
        events.last(),
        Some(ExecutionEvent::Completed { execution_id, .. }) if *execution_id == ctx.execution_id
    ));
    let completed = events
        .iter()
        .filter(|e| matches!(e, ExecutionEvent::NodeCompleted { .. }))
        .count();
    assert_eq!(completed, ctx.node_results.len());
    assert!(events.iter().any(|e| matches!(e, ExecutionEvent::Log(_))));
}

/// Executor that counts how often it ran
struct CountingExecutor {
    runs: AtomicUsize,
}

#[async_trait]
impl NodeExecutor for CountingExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::Log
    }

    fn config_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn execute(&self, node: &Node, _ctx: &ExecutionContext) -> Result<Value, ExecutorError> {
        let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({"message": format!("{} #{}", node.id, n), "level": "debug"}))
    }
}

#[tokio::test]
async fn test_custom_executor_replaces_builtin() {
    let registry = ExecutorRegistry::with_builtins(None, 1_000);
    let counter = Arc::new(CountingExecutor {
        runs: AtomicUsize::new(0),
    });
    registry.register(counter.clone()).await;

    let workflow = templates::instantiate("hello-world").unwrap();
    let ctx = WorkflowRunner::new(registry)
        .run(&workflow, json!("x"))
        .await
        .unwrap();

    assert_eq!(counter.runs.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.final_output, Some(json!("greet #1")));
    assert_eq!(ctx.logs[0].level, LogLevel::Debug);
}

// ============================================================================
// Persistence Tests
// ============================================================================

#[tokio::test]
async fn test_store_keeps_workflows_and_runs() {
    let dir = tempfile::tempdir().unwrap();
    let workflow = templates::instantiate("hello-world").unwrap();
    let ctx = runner(None).run(&workflow, json!("Cy")).await.unwrap();

    {
        let store = WorkflowStore::open(dir.path()).await.unwrap();
        store.save(&workflow).await.unwrap();
        store.record_execution(&ctx).await.unwrap();
    }

    let store = WorkflowStore::open(dir.path()).await.unwrap();
    assert_eq!(store.get(&workflow.id).await.unwrap().name, "Hello World");
    let runs = store.executions(&workflow.id, 10).await;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].final_output, Some(json!("Hello, Cy!")));
}

// ============================================================================
// Generator Tests
// ============================================================================

#[test]
fn test_codegen_for_every_template_and_language() {
    for template in templates::builtin() {
        for language in [Language::Python, Language::TypeScript, Language::Rust] {
            let code = codegen::generate_workflow_code(&template.workflow, language);
            assert!(
                code.contains(&template.workflow.name),
                "{} / {} is missing the workflow name",
                template.id,
                language
            );
        }
    }
}

#[tokio::test]
async fn test_generated_workflow_runs() {
    let reply = r#"Here you go:
{
  "name": "Echo",
  "nodes": [
    {"id": "start", "type": "start"},
    {"id": "end", "type": "end", "config": {"output": "echo: {{ input }}"}},
  ],
  "edges": [{"source": "start", "target": "end"}]
}"#;
    let model = MockModel::new(&[reply]);
    let workflow = codegen::generate_workflow(&model, "echo the input")
        .await
        .unwrap();

    let ctx = runner(None).run(&workflow, json!("hi")).await.unwrap();
    assert_eq!(ctx.final_output, Some(json!("echo: hi")));
}

// ============================================================================
// Agent Tests
// ============================================================================

#[tokio::test]
async fn test_agent_team_from_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("team.yaml");
    std::fs::write(
        &path,
        r#"
kind: Team
name: Writers
execution: sequential
agents:
  - name: Drafter
    instructions: Draft it.
  - name: Editor
    instructions: Edit it.
    model:
      temperature: 0.1
"#,
    )
    .unwrap();

    let spec = AgentFactory::load_spec(&path).unwrap();
    assert!(matches!(spec, AgentSpec::Team(_)));
    assert_eq!(spec.name(), "Writers");

    let model = Arc::new(MockModel::new(&["draft", "final"]));
    let team = AgentFactory::new(provider(model.clone()))
        .build(&spec)
        .unwrap();
    let result = team.run("topic".to_string()).await.unwrap();

    assert_eq!(result, "final");
    let prompts = model.prompts.lock().unwrap();
    assert_eq!(*prompts, vec!["topic".to_string(), "draft".to_string()]);
}
