// SPDX-License-Identifier: MIT

//! `api-call` nodes: one HTTP request per execution

use async_trait::async_trait;
use reqwest::{Client, Method};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use super::{parse_config, schema_of, NodeExecutor};
use crate::adk::error::ExecutorError;
use crate::works::engine::ExecutionContext;
use crate::works::workflow::template;
use crate::works::workflow::types::{Node, NodeType};

const ERROR_BODY_LIMIT: usize = 500;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ApiCallConfig {
    /// Request URL; `{{ path }}` placeholders are rendered
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Objects and arrays are sent as JSON, strings as a raw body
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Record non-2xx responses as output instead of failing the node
    #[serde(default)]
    pub allow_error_status: bool,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

pub struct ApiCallExecutor {
    client: Client,
}

impl ApiCallExecutor {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for ApiCallExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeExecutor for ApiCallExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::ApiCall
    }

    fn config_schema(&self) -> Value {
        schema_of::<ApiCallConfig>()
    }

    async fn execute(&self, node: &Node, ctx: &ExecutionContext) -> Result<Value, ExecutorError> {
        let config: ApiCallConfig = parse_config(node)?;
        let vars = &ctx.variables;

        let raw_url = template::render(&config.url, vars);
        let url = Url::parse(&raw_url)
            .map_err(|e| ExecutorError::invalid_config(&node.id, format!("bad url '{}': {}", raw_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ExecutorError::invalid_config(
                &node.id,
                format!("unsupported url scheme '{}'", url.scheme()),
            ));
        }

        let method = Method::from_bytes(config.method.to_uppercase().as_bytes())
            .map_err(|_| ExecutorError::invalid_config(&node.id, format!("bad method '{}'", config.method)))?;

        log::info!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, url)
            .timeout(Duration::from_millis(config.timeout_ms));

        for (name, value) in &config.headers {
            request = request.header(name.as_str(), template::render(value, vars));
        }

        match config.body.as_ref().map(|b| template::render_value(b, vars)) {
            Some(Value::Null) | None => {}
            Some(Value::String(text)) => request = request.body(text),
            Some(body) => {
                log::debug!("Request body: {}", body);
                request = request.json(&body);
            }
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() && !config.allow_error_status {
            let body: String = text.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(ExecutorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let data = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
        Ok(json!({
            "status": status.as_u16(),
            "ok": status.is_success(),
            "data": data,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::works::executor::tests::context;
    use axum::{
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    };

    async fn spawn_server() -> String {
        let app = Router::new()
            .route("/items", get(|| async { Json(json!({"items": [1, 2, 3]})) }))
            .route("/echo", post(|Json(body): Json<Value>| async move { Json(body) }))
            .route("/text", get(|| async { "plain text" }))
            .route(
                "/whoami",
                get(|headers: HeaderMap| async move {
                    headers
                        .get("x-user")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("nobody")
                        .to_string()
                }),
            )
            .route(
                "/broken",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn node(config: Value) -> Node {
        Node::new("call", NodeType::ApiCall).with_config(config)
    }

    #[tokio::test]
    async fn test_get_json() {
        let base = spawn_server().await;
        let out = ApiCallExecutor::new()
            .execute(&node(json!({"url": format!("{}/items", base)})), &context(Value::Null))
            .await
            .unwrap();
        assert_eq!(out["status"], json!(200));
        assert_eq!(out["ok"], json!(true));
        assert_eq!(out["data"]["items"], json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn test_templated_post_body_and_headers() {
        let base = spawn_server().await;
        let ctx = context(json!({"name": "Ada", "tags": ["x"]}));

        let config = json!({
            "url": format!("{}/echo", base),
            "method": "post",
            "body": {"who": "{{ input.name }}", "tags": "{{ input.tags }}"}
        });
        let out = ApiCallExecutor::new().execute(&node(config), &ctx).await.unwrap();
        assert_eq!(out["data"], json!({"who": "Ada", "tags": ["x"]}));

        let config = json!({
            "url": format!("{}/whoami", base),
            "headers": {"x-user": "{{ input.name }}"}
        });
        let out = ApiCallExecutor::new().execute(&node(config), &ctx).await.unwrap();
        assert_eq!(out["data"], json!("Ada"));
    }

    #[tokio::test]
    async fn test_text_response() {
        let base = spawn_server().await;
        let out = ApiCallExecutor::new()
            .execute(&node(json!({"url": format!("{}/text", base)})), &context(Value::Null))
            .await
            .unwrap();
        assert_eq!(out["data"], json!("plain text"));
    }

    #[tokio::test]
    async fn test_error_status() {
        let base = spawn_server().await;
        let url = format!("{}/broken", base);

        let err = ApiCallExecutor::new()
            .execute(&node(json!({"url": url})), &context(Value::Null))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Status { status: 503, ref body } if body == "down"));

        let out = ApiCallExecutor::new()
            .execute(
                &node(json!({"url": url, "allow_error_status": true})),
                &context(Value::Null),
            )
            .await
            .unwrap();
        assert_eq!(out["status"], json!(503));
        assert_eq!(out["ok"], json!(false));
    }

    #[tokio::test]
    async fn test_rejects_bad_urls() {
        let ctx = context(Value::Null);
        for url in ["ftp://example.com/file", "not a url", ""] {
            let err = ApiCallExecutor::new()
                .execute(&node(json!({ "url": url })), &ctx)
                .await
                .unwrap_err();
            assert!(
                matches!(err, ExecutorError::InvalidConfig { .. }),
                "{} gave {}",
                url,
                err
            );
        }
    }
}
