// SPDX-License-Identifier: MIT

//! HTTP API for the workflow editor

mod error;

pub use error::{ApiError, ApiJson};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::adk::agent::AgentDefinition;
use crate::adk::chat::ChatSession;
use crate::adk::error::{AiWorksError, EngineError};
use crate::adk::model::{Content, ModelProvider};
use crate::works::codegen::{self, templates, Language};
use crate::works::config::Config;
use crate::works::engine::{ExecutionContext, ExecutionEvent, WorkflowRunner};
use crate::works::executor::{ExecutorRegistry, NodeTypeInfo};
use crate::works::store::WorkflowStore;
use crate::works::workflow::{ValidationReport, Workflow};

const DEFAULT_EXECUTION_LIMIT: usize = 20;

/// Shared handles for every request
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<WorkflowStore>,
    pub runner: WorkflowRunner,
    pub models: Option<Arc<dyn ModelProvider>>,
}

impl AppState {
    pub fn new(
        store: Arc<WorkflowStore>,
        runner: WorkflowRunner,
        models: Option<Arc<dyn ModelProvider>>,
    ) -> Self {
        Self {
            store,
            runner,
            models,
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self, AiWorksError> {
        let models = config
            .model_provider()
            .map(|p| p as Arc<dyn ModelProvider>);
        if models.is_none() {
            log::warn!("No API key configured; ai-generate nodes and chat are disabled");
        }
        let registry = ExecutorRegistry::with_builtins(models.clone(), config.max_delay_ms);
        let runner = WorkflowRunner::new(registry).with_max_steps(config.max_steps);
        let store = WorkflowStore::open(config.data_dir.clone()).await?;
        Ok(Self::new(Arc::new(store), runner, models))
    }

    fn models(&self) -> Result<&Arc<dyn ModelProvider>, ApiError> {
        self.models.as_ref().ok_or_else(|| {
            ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "AI model not configured; set GOOGLE_API_KEY",
            )
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/node-types", get(node_types))
        .route("/api/workflows", get(list_workflows).post(create_workflow))
        .route("/api/workflows/generate", post(generate_workflow))
        .route(
            "/api/workflows/{id}",
            get(get_workflow)
                .put(update_workflow)
                .delete(delete_workflow),
        )
        .route("/api/workflows/{id}/validate", post(validate_workflow))
        .route("/api/workflows/{id}/execute", post(execute_workflow))
        .route("/api/workflows/{id}/execute/stream", post(stream_execution))
        .route("/api/workflows/{id}/executions", get(list_executions))
        .route("/api/templates", get(list_templates))
        .route("/api/templates/{id}", post(create_from_template))
        .route("/api/codegen", post(generate_code))
        .route("/api/chat", post(chat))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(config: Config) -> Result<(), AiWorksError> {
    let state = AppState::from_config(&config).await?;
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn node_types(State(state): State<AppState>) -> Json<Vec<NodeTypeInfo>> {
    Json(state.runner.registry().node_types().await)
}

async fn list_workflows(State(state): State<AppState>) -> Json<Vec<Workflow>> {
    Json(state.store.list().await)
}

async fn create_workflow(
    State(state): State<AppState>,
    ApiJson(workflow): ApiJson<Workflow>,
) -> Result<(StatusCode, Json<Workflow>), ApiError> {
    if state.store.contains(&workflow.id).await {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            format!("Workflow {} already exists", workflow.id),
        ));
    }
    state.store.save(&workflow).await?;
    log::info!("Created workflow {} ({})", workflow.id, workflow.name);
    Ok((StatusCode::CREATED, Json(workflow)))
}

async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Workflow>, ApiError> {
    Ok(Json(state.store.get(&id).await?))
}

async fn update_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(mut workflow): ApiJson<Workflow>,
) -> Result<Json<Workflow>, ApiError> {
    let existing = state.store.get(&id).await?;
    workflow.id = id;
    workflow.created_at = existing.created_at;
    workflow.touch();
    state.store.save(&workflow).await?;
    Ok(Json(workflow))
}

async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn validate_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ValidationReport>, ApiError> {
    let workflow = state.store.get(&id).await?;
    Ok(Json(workflow.validate()))
}

#[derive(Debug, Default, Deserialize)]
struct ExecuteRequest {
    #[serde(default)]
    input: Value,
}

async fn execute_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ExecuteRequest>,
) -> Result<Json<ExecutionContext>, ApiError> {
    let workflow = state.store.get(&id).await?;
    let ctx = state.runner.run(&workflow, req.input).await?;
    record(&state.store, &ctx).await;
    Ok(Json(ctx))
}

async fn stream_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ExecuteRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let workflow = state.store.get(&id).await?;
    let report = workflow.validate();
    if !report.is_valid() {
        return Err(EngineError::InvalidWorkflow(report.errors).into());
    }

    let (tx, rx) = mpsc::channel(100);
    tokio::spawn(async move {
        log::info!("Starting streaming execution of {}", workflow.id);
        match state.runner.run_with_events(&workflow, req.input, tx).await {
            Ok(ctx) => record(&state.store, &ctx).await,
            Err(e) => log::error!("Streaming execution of {} failed: {}", workflow.id, e),
        }
    });

    let stream = ReceiverStream::new(rx).map(|event: ExecutionEvent| {
        Ok::<_, Infallible>(
            Event::default()
                .json_data(&event)
                .unwrap_or_else(|e| Event::default().event("error").data(e.to_string())),
        )
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(1))))
}

async fn record(store: &WorkflowStore, ctx: &ExecutionContext) {
    if let Err(e) = store.record_execution(ctx).await {
        log::warn!("Could not record execution {}: {}", ctx.execution_id, e);
    }
}

#[derive(Debug, Deserialize)]
struct ExecutionsQuery {
    limit: Option<usize>,
}

async fn list_executions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ExecutionsQuery>,
) -> Result<Json<Vec<ExecutionContext>>, ApiError> {
    if !state.store.contains(&id).await {
        return Err(ApiError::not_found(format!("Workflow not found: {id}")));
    }
    let limit = query.limit.unwrap_or(DEFAULT_EXECUTION_LIMIT);
    Ok(Json(state.store.executions(&id, limit).await))
}

async fn list_templates() -> Json<Vec<templates::WorkflowTemplate>> {
    Json(templates::builtin())
}

async fn create_from_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Workflow>), ApiError> {
    let workflow = templates::instantiate(&id)
        .ok_or_else(|| ApiError::not_found(format!("Template not found: {id}")))?;
    state.store.save(&workflow).await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    description: String,
}

async fn generate_workflow(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<GenerateRequest>,
) -> Result<(StatusCode, Json<Workflow>), ApiError> {
    let model = state.models()?.model(None)?;
    let workflow = codegen::generate_workflow(model.as_ref(), &req.description).await?;
    state.store.save(&workflow).await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

#[derive(Debug, Deserialize)]
struct CodegenRequest {
    language: Language,
    workflow_id: Option<String>,
    workflow: Option<Workflow>,
    agent: Option<AgentDefinition>,
}

#[derive(Debug, Serialize)]
struct CodegenResponse {
    language: Language,
    filename: String,
    code: String,
}

async fn generate_code(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CodegenRequest>,
) -> Result<Json<CodegenResponse>, ApiError> {
    let (name, code) = if let Some(agent) = &req.agent {
        (
            agent.name.clone(),
            codegen::generate_agent_code(agent, req.language),
        )
    } else {
        let workflow = match (req.workflow, req.workflow_id) {
            (Some(workflow), _) => workflow,
            (None, Some(id)) => state.store.get(&id).await?,
            (None, None) => {
                return Err(ApiError::bad_request(
                    "One of workflow, workflow_id or agent is required",
                ))
            }
        };
        let code = codegen::generate_workflow_code(&workflow, req.language);
        (workflow.name, code)
    };

    Ok(Json(CodegenResponse {
        language: req.language,
        filename: format!("{}.{}", file_stem(&name), req.language.file_extension()),
        code,
    }))
}

fn file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "generated".to_string()
    } else {
        stem
    }
}

/// One chat turn as exchanged with HTTP clients
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    history: Vec<ChatMessage>,
    system: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    reply: String,
    history: Vec<ChatMessage>,
}

async fn chat(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let model = state.models()?.model(req.model.as_deref())?;
    let history = req
        .history
        .into_iter()
        .map(|m| match m.role.as_str() {
            "model" | "assistant" => Content::model(m.text),
            _ => Content::user(m.text),
        })
        .collect();

    let mut session = ChatSession::new(model).with_history(history);
    if let Some(system) = req.system {
        session = session.with_system(system);
    }
    let reply = session.send(&req.message).await?;

    let history = session
        .history()
        .iter()
        .map(|c| ChatMessage {
            role: c.role.clone(),
            text: c.text_content(),
        })
        .collect();
    Ok(Json(ChatResponse { reply, history }))
}
