// SPDX-License-Identifier: MIT

//! Variables for workflow runs
//!
//! This module provides:
//! - `VariableSchema` - the variables a workflow declares, with types and defaults
//! - `Variables` - runtime storage with reducer support
//! - `ReducerType` - strategies for merging values into a variable

mod schema;
mod store;

pub(crate) use store::lookup;
pub use schema::{ReducerType, VariableDef, VariableSchema, VariableType};
pub use store::{Variables, INPUT_KEY, NODES_KEY};
