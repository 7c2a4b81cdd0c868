// SPDX-License-Identifier: MIT

//! Workflows: graph model, node executors, the runner, generators,
//! persistence and the HTTP API.

pub mod codegen;
pub mod config;
pub mod engine;
pub mod executor;
pub mod server;
pub mod store;
pub mod workflow;
