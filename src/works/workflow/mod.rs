// SPDX-License-Identifier: MIT

pub mod condition;
pub mod loader;
pub mod state;
pub mod template;
pub mod types;

pub use loader::WorkflowLoader;
pub use types::{Edge, Node, NodeType, Position, ValidationReport, Workflow};
