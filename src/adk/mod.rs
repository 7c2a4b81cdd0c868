// SPDX-License-Identifier: MIT

//! Agent development kit: model client, agents and chat

pub mod agent;
pub mod chat;
pub mod error;
pub mod model;
