// SPDX-License-Identifier: MIT

//! Condition expressions for `condition` nodes
//!
//! Conditions are small boolean expressions over run variables:
//! - `nodes.fetch.status == 200`
//! - `confidence > 0.8`
//! - `intent == 'bug' and not (priority < 3)`

mod ast;
mod evaluator;
mod parser;

pub use ast::{CompareOp, Expression, Literal};
pub use evaluator::evaluate;
pub use parser::parse;

use crate::adk::error::ConditionError;
use crate::works::workflow::state::Variables;

/// Parse and evaluate in one step
pub fn check(expression: &str, vars: &Variables) -> Result<bool, ConditionError> {
    Ok(evaluate(&parse(expression)?, vars))
}
