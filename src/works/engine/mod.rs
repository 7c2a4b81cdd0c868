// SPDX-License-Identifier: MIT

//! Workflow execution
//!
//! [`WorkflowRunner`] walks a workflow breadth-first from its start node,
//! dispatching every node to the executor registered for its type and
//! recording the results in an [`ExecutionContext`].

mod context;
mod events;
mod runner;

pub use context::{
    ExecutionContext, ExecutionStatus, LogEntry, LogLevel, NodeResult, NodeStatus,
};
pub use events::ExecutionEvent;
pub use runner::{WorkflowRunner, DEFAULT_MAX_STEPS};
