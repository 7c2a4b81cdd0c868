// SPDX-License-Identifier: MIT

//! Gemini Model - Google's Gemini generative-language API implementation

use super::{Content, GenerationConfig, Model, ModelProvider, Part};
use crate::adk::error::ModelError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::env;
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Google Gemini model implementation
pub struct GeminiModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl GeminiModel {
    /// Create a new GeminiModel
    ///
    /// Reads the key from `GOOGLE_API_KEY`, falling back to `GEMINI_API_KEY`.
    pub fn new(model_name: String) -> Result<Self, ModelError> {
        let api_key = env::var("GOOGLE_API_KEY")
            .or_else(|_| env::var("GEMINI_API_KEY"))
            .map_err(|_| ModelError::ApiKeyMissing("Gemini".to_string()))?;
        Self::with_api_key(api_key, model_name)
    }

    /// Create a GeminiModel with an explicit key
    pub fn with_api_key(api_key: String, model_name: String) -> Result<Self, ModelError> {
        if api_key.trim().is_empty() {
            return Err(ModelError::ApiKeyMissing("Gemini".to_string()));
        }
        Ok(Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different API host (proxies, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Check the key by listing models. Returns the number of models visible to it.
    pub async fn validate_key(&self) -> Result<usize, ModelError> {
        let url = format!("{}/v1beta/models", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(status, None, text));
        }

        let body: Value = resp.json().await?;
        Ok(body["models"].as_array().map(|m| m.len()).unwrap_or(0))
    }
}

/// Creates [`GeminiModel`]s sharing one key and host
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    default_model: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, base_url: String, default_model: String) -> Self {
        Self {
            api_key,
            base_url,
            default_model,
        }
    }
}

impl ModelProvider for GeminiProvider {
    fn model(&self, name: Option<&str>) -> Result<Arc<dyn Model>, ModelError> {
        let model_name = name.unwrap_or(&self.default_model).to_string();
        let model = GeminiModel::with_api_key(self.api_key.clone(), model_name)?
            .with_base_url(self.base_url.clone());
        Ok(Arc::new(model))
    }
}

/// Build the `generateContent` request body
pub(crate) fn build_request_body(history: &[Content], config: Option<&GenerationConfig>) -> Value {
    let mut system_texts = Vec::new();
    let mut contents = Vec::new();

    for c in history {
        if c.role == "system" {
            let text = c.text_content();
            if !text.is_empty() {
                system_texts.push(text);
            }
            continue;
        }

        let parts: Vec<Value> = c
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(json!({ "text": t })),
                Part::Thinking(_) => None, // Thinking is internal, not sent to API
            })
            .collect();
        if parts.is_empty() {
            continue;
        }
        contents.push(json!({ "role": c.role, "parts": parts }));
    }

    let mut body = json!({ "contents": contents });

    if !system_texts.is_empty() {
        body["systemInstruction"] = json!({
            "parts": [{ "text": system_texts.join("\n\n") }]
        });
    }

    if let Some(config) = config.filter(|c| !c.is_empty()) {
        let mut gen = serde_json::Map::new();
        if let Some(t) = config.temperature {
            gen.insert("temperature".to_string(), json!(t));
        }
        if let Some(m) = config.max_output_tokens {
            gen.insert("maxOutputTokens".to_string(), json!(m));
        }
        if let Some(p) = config.top_p {
            gen.insert("topP".to_string(), json!(p));
        }
        if let Some(k) = config.top_k {
            gen.insert("topK".to_string(), json!(k));
        }
        body["generationConfig"] = Value::Object(gen);
    }

    body
}

/// Turn a `generateContent` response into a model turn
pub(crate) fn parse_response(resp_json: &Value) -> Result<Content, ModelError> {
    if let Some(reason) = resp_json["promptFeedback"]["blockReason"].as_str() {
        return Err(ModelError::Blocked(format!("prompt blocked ({})", reason)));
    }

    let candidate = resp_json["candidates"]
        .as_array()
        .and_then(|c| c.first())
        .ok_or_else(|| ModelError::InvalidResponse("No candidates in response".to_string()))?;

    if let Some(finish_reason) = candidate.get("finishReason").and_then(|v| v.as_str()) {
        log::debug!("Gemini finish reason: {}", finish_reason);
        if finish_reason == "SAFETY" || finish_reason == "RECITATION" {
            return Err(ModelError::Blocked(format!(
                "finish reason {}",
                finish_reason
            )));
        }
    }

    let parts_json = candidate["content"]["parts"].as_array().ok_or_else(|| {
        ModelError::InvalidResponse(format!("No parts in candidate: {}", candidate))
    })?;

    let mut parts = Vec::new();
    for p in parts_json {
        let Some(text) = p["text"].as_str() else {
            continue;
        };
        // Thinking models flag reasoning parts with `thought: true`
        if p["thought"].as_bool() == Some(true) {
            parts.push(Part::Thinking(text.to_string()));
        } else {
            parts.push(Part::Text(text.to_string()));
        }
    }

    Ok(Content {
        role: "model".to_string(),
        parts,
    })
}

fn status_error(status: StatusCode, retry_after: Option<u64>, text: String) -> ModelError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ModelError::RateLimited {
            retry_after_secs: retry_after,
        };
    }
    // Google wraps errors as {"error": {"message": ...}}
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(|s| s.to_string()))
        .unwrap_or(text);
    ModelError::Api {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl Model for GeminiModel {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> Result<Content, ModelError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model_name
        );
        let body = build_request_body(history, config);

        log::debug!(
            "Gemini request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(status, retry_after, text));
        }

        let resp_json: Value = resp.json().await?;
        log::debug!("Gemini response: {}", resp_json);

        parse_response(&resp_json)
    }
}
