// SPDX-License-Identifier: MIT

//! Generators
//!
//! - [source] - illustrative Python/TypeScript/Rust for workflows and agents
//! - [templates] - ready-made workflows
//! - [generator] - workflows drafted by a model from a description

pub mod generator;
pub mod source;
pub mod templates;

pub use generator::{generate_workflow, repair_json};
pub use source::{generate_agent_code, generate_workflow_code};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target language for generated source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    TypeScript,
    Rust,
}

impl Language {
    pub fn file_extension(&self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::TypeScript => "ts",
            Language::Rust => "rs",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Language::Python => "python",
            Language::TypeScript => "typescript",
            Language::Rust => "rust",
        })
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "python" | "py" => Ok(Language::Python),
            "typescript" | "ts" => Ok(Language::TypeScript),
            "rust" | "rs" => Ok(Language::Rust),
            other => Err(format!(
                "unknown language '{}', expected python, typescript or rust",
                other
            )),
        }
    }
}
