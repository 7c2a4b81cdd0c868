// SPDX-License-Identifier: MIT

//! Workflow loader - YAML and JSON file loading and parsing

use std::fs;
use std::path::Path;

use super::types::Workflow;
use crate::adk::error::{AiWorksError, WorkflowError};

/// Loads workflow definitions from `.yaml`, `.yml` and `.json` files
pub struct WorkflowLoader;

impl WorkflowLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a workflow, picking the parser from the file extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Workflow, AiWorksError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(WorkflowError::FileNotFound(path.display().to_string()).into());
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let content = fs::read_to_string(path)?;
        let workflow = match extension.as_str() {
            "yaml" | "yml" => Self::parse_yaml(&content)?,
            "json" => Self::parse_json(&content)?,
            other => return Err(WorkflowError::UnsupportedFormat(other.to_string()).into()),
        };

        log::debug!(
            "Loaded workflow '{}' ({} nodes) from {}",
            workflow.name,
            workflow.nodes.len(),
            path.display()
        );
        Ok(workflow)
    }

    /// Parse a workflow definition from a YAML string
    pub fn parse_yaml(content: &str) -> Result<Workflow, AiWorksError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Parse a workflow definition from a JSON string
    pub fn parse_json(content: &str) -> Result<Workflow, AiWorksError> {
        Ok(serde_json::from_str(content)?)
    }
}

impl Default for WorkflowLoader {
    fn default() -> Self {
        Self::new()
    }
}
