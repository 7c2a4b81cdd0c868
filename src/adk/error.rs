// SPDX-License-Identifier: MIT

//! Typed error handling for aiworks-rs
//!
//! Every layer has its own error enum; [`AiWorksError`] wraps them for
//! callers that just want one type (the HTTP layer, the CLI).

use thiserror::Error;

/// Top-level error type for aiworks-rs
#[derive(Debug, Error)]
pub enum AiWorksError {
    /// API errors from external services
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Configuration errors (missing env vars, invalid values)
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

/// Structural problems in a workflow definition
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkflowError {
    #[error("Workflow has no start node")]
    MissingStart,

    #[error("Workflow has {0} start nodes, expected exactly one")]
    MultipleStarts(usize),

    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(String),

    #[error("Duplicate edge id: {0}")]
    DuplicateEdgeId(String),

    #[error("Edge '{edge}' references unknown node '{node}'")]
    UnknownNode { edge: String, node: String },

    #[error("Edge '{edge}' has an invalid branch: {reason}")]
    InvalidBranch { edge: String, reason: String },

    #[error("End node '{0}' must not have outgoing edges")]
    EndHasOutgoing(String),

    #[error("Node '{node}' writes its output to reserved variable '{name}'")]
    ReservedOutputVariable { node: String, name: String },

    #[error("Unsupported workflow file format: {0}")]
    UnsupportedFormat(String),

    #[error("Workflow file not found: {0}")]
    FileNotFound(String),
}

// Reports and API responses carry the message, not the variant
impl serde::Serialize for WorkflowError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Non-success HTTP status from the provider
    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The provider refused to answer (safety filters, recitation, ...)
    #[error("Response blocked: {0}")]
    Blocked(String),

    /// Invalid response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors from parsing `condition` expressions
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConditionError {
    #[error("Empty condition expression")]
    Empty,

    #[error("Could not parse condition: {0}")]
    Parse(String),

    #[error("Could not parse literal: {0}")]
    Literal(String),
}

/// Errors raised by a single node executor
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("No executor registered for node type '{0}'")]
    NoExecutor(String),

    #[error("Invalid config for node '{node}': {message}")]
    InvalidConfig { node: String, message: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("AI model not configured; set GOOGLE_API_KEY")]
    ModelNotConfigured,

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Condition(#[from] ConditionError),

    #[error("Delay of {requested_ms}ms exceeds the maximum of {max_ms}ms")]
    DelayTooLong { requested_ms: u64, max_ms: u64 },

    #[error("Transform failed: {0}")]
    Transform(String),
}

impl ExecutorError {
    pub fn invalid_config(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            node: node.into(),
            message: message.into(),
        }
    }
}

/// Errors that prevent a run from starting or finishing normally
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid workflow: {}", join_errors(.0))]
    InvalidWorkflow(Vec<WorkflowError>),

    #[error("Execution exceeded the step limit of {0}")]
    StepLimitExceeded(usize),
}

fn join_errors(errors: &[WorkflowError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Persistence errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AiWorksError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl From<&str> for AiWorksError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for AiWorksError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<ExecutorError> for AiWorksError {
    fn from(err: ExecutorError) -> Self {
        Self::Other(err.to_string())
    }
}
