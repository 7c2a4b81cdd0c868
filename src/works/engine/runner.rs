// SPDX-License-Identifier: MIT

use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;
use tokio::sync::mpsc;

use super::context::{ExecutionContext, LogEntry, LogLevel, NodeResult, NodeStatus};
use super::events::ExecutionEvent;
use crate::adk::error::{EngineError, ExecutorError, WorkflowError};
use crate::works::executor::ExecutorRegistry;
use crate::works::workflow::types::{Node, NodeType, Workflow};

pub const DEFAULT_MAX_STEPS: usize = 100;

/// Runs workflows against an [`ExecutorRegistry`]
#[derive(Clone)]
pub struct WorkflowRunner {
    registry: ExecutorRegistry,
    max_steps: usize,
}

impl WorkflowRunner {
    pub fn new(registry: ExecutorRegistry) -> Self {
        Self {
            registry,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    /// Run `workflow` to completion or first failure.
    ///
    /// Node failures are reported through the returned context; `Err` means the
    /// workflow was rejected before any node ran.
    pub async fn run(
        &self,
        workflow: &Workflow,
        input: Value,
    ) -> Result<ExecutionContext, EngineError> {
        self.execute(workflow, input, None).await
    }

    /// Like [`run`](Self::run), also sending progress events to `tx`
    pub async fn run_with_events(
        &self,
        workflow: &Workflow,
        input: Value,
        tx: mpsc::Sender<ExecutionEvent>,
    ) -> Result<ExecutionContext, EngineError> {
        self.execute(workflow, input, Some(&tx)).await
    }

    async fn execute(
        &self,
        workflow: &Workflow,
        input: Value,
        tx: Option<&mpsc::Sender<ExecutionEvent>>,
    ) -> Result<ExecutionContext, EngineError> {
        let report = workflow.validate();
        if !report.is_valid() {
            return Err(EngineError::InvalidWorkflow(report.errors));
        }
        for warning in &report.warnings {
            log::warn!("Workflow '{}': {}", workflow.name, warning);
        }
        let start = workflow
            .start_node()
            .ok_or_else(|| EngineError::InvalidWorkflow(vec![WorkflowError::MissingStart]))?;

        let mut ctx = ExecutionContext::new(workflow, input);
        log::info!(
            "Running workflow '{}' (execution {})",
            workflow.name,
            ctx.execution_id
        );
        emit(
            tx,
            ExecutionEvent::Started {
                execution_id: ctx.execution_id.clone(),
                workflow_id: ctx.workflow_id.clone(),
            },
        )
        .await;

        let mut queue = VecDeque::from([start]);
        let mut visited: HashSet<&str> = HashSet::from([start.id.as_str()]);
        let mut parents: HashMap<&str, &str> = HashMap::new();
        let mut steps = 0;

        while let Some(node) = queue.pop_front() {
            steps += 1;
            if steps > self.max_steps {
                let error = EngineError::StepLimitExceeded(self.max_steps).to_string();
                log::error!("Workflow '{}': {}", workflow.name, error);
                return Ok(finish_failed(ctx, error, tx).await);
            }

            emit(
                tx,
                ExecutionEvent::NodeStarted {
                    node_id: node.id.clone(),
                    node_type: node.node_type,
                },
            )
            .await;
            log::info!("Executing node '{}' ({})", node.display_name(), node.node_type);

            ctx.predecessor = parents.get(node.id.as_str()).map(|p| p.to_string());
            let started_at = Utc::now();
            let timer = Instant::now();
            let outcome = match self.registry.get(node.node_type).await {
                Some(executor) => executor.execute(node, &ctx).await,
                None => Err(ExecutorError::NoExecutor(node.node_type.to_string())),
            };
            let finished_at = Utc::now();
            let duration_ms = timer.elapsed().as_millis() as u64;

            let output = match outcome {
                Ok(output) => output,
                Err(err) => {
                    let message = err.to_string();
                    log::error!("Node '{}' failed: {}", node.display_name(), message);
                    ctx.node_results.push(NodeResult {
                        node_id: node.id.clone(),
                        node_type: node.node_type,
                        status: NodeStatus::Failed,
                        output: None,
                        error: Some(message.clone()),
                        started_at,
                        finished_at,
                        duration_ms,
                    });
                    emit(
                        tx,
                        ExecutionEvent::NodeFailed {
                            node_id: node.id.clone(),
                            error: message.clone(),
                        },
                    )
                    .await;
                    let error = format!("Node '{}' failed: {}", node.display_name(), message);
                    return Ok(finish_failed(ctx, error, tx).await);
                }
            };

            self.record_output(&mut ctx, node, &output, tx).await;
            ctx.node_results.push(NodeResult {
                node_id: node.id.clone(),
                node_type: node.node_type,
                status: NodeStatus::Success,
                output: Some(output.clone()),
                error: None,
                started_at,
                finished_at,
                duration_ms,
            });

            let branch = match node.node_type {
                NodeType::Condition => output.get("result").and_then(Value::as_bool),
                _ => None,
            };
            emit(
                tx,
                ExecutionEvent::NodeCompleted {
                    node_id: node.id.clone(),
                    output,
                    duration_ms,
                },
            )
            .await;

            for edge in workflow.outgoing(&node.id) {
                if branch.is_some_and(|result| !edge.follows(result)) {
                    continue;
                }
                if !visited.insert(edge.target.as_str()) {
                    continue;
                }
                if let Some(next) = workflow.node(&edge.target) {
                    parents.insert(next.id.as_str(), node.id.as_str());
                    queue.push_back(next);
                }
            }
        }

        ctx.complete();
        log::info!(
            "Workflow '{}' completed in {}ms ({} nodes)",
            workflow.name,
            ctx.duration_ms(),
            ctx.node_results.len()
        );
        emit(
            tx,
            ExecutionEvent::Completed {
                execution_id: ctx.execution_id.clone(),
                output: ctx.final_output.clone(),
            },
        )
        .await;
        Ok(ctx)
    }

    /// Store a successful node's output in the run variables
    async fn record_output(
        &self,
        ctx: &mut ExecutionContext,
        node: &Node,
        output: &Value,
        tx: Option<&mpsc::Sender<ExecutionEvent>>,
    ) {
        ctx.variables.set_node_output(&node.id, output.clone());
        if let Some(var) = node.output_variable() {
            ctx.variables.update(var, output.clone());
        }

        match node.node_type {
            NodeType::Log => {
                let entry = LogEntry {
                    timestamp: Utc::now(),
                    level: output
                        .get("level")
                        .and_then(|l| serde_json::from_value::<LogLevel>(l.clone()).ok())
                        .unwrap_or_default(),
                    node_id: node.id.clone(),
                    message: output
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                };
                ctx.logs.push(entry.clone());
                emit(tx, ExecutionEvent::Log(entry)).await;
            }
            NodeType::End => {
                ctx.final_output = Some(output.get("output").cloned().unwrap_or(Value::Null));
            }
            _ => {}
        }
    }
}

async fn finish_failed(
    mut ctx: ExecutionContext,
    error: String,
    tx: Option<&mpsc::Sender<ExecutionEvent>>,
) -> ExecutionContext {
    ctx.fail(error.clone());
    emit(
        tx,
        ExecutionEvent::Failed {
            execution_id: ctx.execution_id.clone(),
            error,
        },
    )
    .await;
    ctx
}

async fn emit(tx: Option<&mpsc::Sender<ExecutionEvent>>, event: ExecutionEvent) {
    if let Some(tx) = tx {
        // A closed receiver only means nobody is watching
        let _ = tx.send(event).await;
    }
}
