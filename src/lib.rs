// SPDX-License-Identifier: MIT

//! aiworks-rs: workflow engine, agents and chat on top of the Gemini API
//!
//! - [adk] - model client, agents, chat sessions, error types
//! - [works] - workflows: model, executors, runner, generators, store, HTTP API

pub mod adk;
pub mod works;
