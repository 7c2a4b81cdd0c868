// SPDX-License-Identifier: MIT

//! Runtime configuration read from the environment (and `.env`)

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::adk::error::AiWorksError;
use crate::adk::model::gemini::{GeminiProvider, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::works::engine::DEFAULT_MAX_STEPS;
use crate::works::executor::DEFAULT_MAX_DELAY_MS;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_DATA_DIR: &str = ".aiworks";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub data_dir: PathBuf,
    pub port: u16,
    pub max_steps: usize,
    pub max_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_BASE_URL.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            port: DEFAULT_PORT,
            max_steps: DEFAULT_MAX_STEPS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl Config {
    /// Read configuration from process environment variables.
    ///
    /// Call `dotenv().ok()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, AiWorksError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset and blank values use defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AiWorksError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            api_key: get("GOOGLE_API_KEY").or_else(|| get("GEMINI_API_KEY")),
            model: get("AIWORKS_MODEL").unwrap_or(defaults.model),
            api_base: get("AIWORKS_API_BASE")
                .map(|b| b.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            data_dir: get("AIWORKS_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            port: parse(&get, "AIWORKS_PORT")?.unwrap_or(defaults.port),
            max_steps: parse(&get, "AIWORKS_MAX_STEPS")?.unwrap_or(defaults.max_steps),
            max_delay_ms: parse(&get, "AIWORKS_MAX_DELAY_MS")?.unwrap_or(defaults.max_delay_ms),
        })
    }

    /// Model provider for the configured key, if there is one
    pub fn model_provider(&self) -> Option<Arc<GeminiProvider>> {
        let api_key = self.api_key.clone()?;
        Some(Arc::new(GeminiProvider::new(
            api_key,
            self.api_base.clone(),
            self.model.clone(),
        )))
    }

    /// Like [`Config::model_provider`] but an error when no key is set
    pub fn require_model_provider(&self) -> Result<Arc<GeminiProvider>, AiWorksError> {
        self.model_provider().ok_or_else(|| {
            AiWorksError::config("GOOGLE_API_KEY (or GEMINI_API_KEY) is not set")
        })
    }
}

fn parse<T, G>(get: &G, key: &str) -> Result<Option<T>, AiWorksError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| AiWorksError::config(format!("{key}={raw}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, AiWorksError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.port, 3001);
        assert_eq!(config.max_steps, 100);
        assert!(config.model_provider().is_none());
        assert!(config.require_model_provider().is_err());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("GEMINI_API_KEY", "secret"),
            ("AIWORKS_MODEL", "gemini-2.0-flash"),
            ("AIWORKS_API_BASE", "http://localhost:9000/"),
            ("AIWORKS_DATA_DIR", "/tmp/works"),
            ("AIWORKS_PORT", "8080"),
            ("AIWORKS_MAX_STEPS", "7"),
            ("AIWORKS_MAX_DELAY_MS", "50"),
        ])
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.api_base, "http://localhost:9000");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/works"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_steps, 7);
        assert_eq!(config.max_delay_ms, 50);
        assert!(config.model_provider().is_some());
    }

    #[test]
    fn test_google_key_wins_and_blank_is_unset() {
        let config = load(&[("GOOGLE_API_KEY", "g"), ("GEMINI_API_KEY", "x")]).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("g"));

        let config = load(&[("GOOGLE_API_KEY", "  ")]).unwrap();
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn test_bad_number_is_config_error() {
        let err = load(&[("AIWORKS_PORT", "lots")]).unwrap_err();
        assert!(matches!(err, AiWorksError::Config(_)));
        assert!(err.to_string().contains("AIWORKS_PORT"));
    }
}
