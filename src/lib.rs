// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Scribe - asynchronous writing-assistant agent core.
//!
//! A client submits a writing request against a document and receives a
//! stream of assistant text, tool calls and proposed edits ("artifacts")
//! that can later be accepted, rejected or applied.
//!
//! Architecture highlights:
//! - `tasks`: request registry, background execution, timeouts and eviction
//! - `agent`: the model/tool loop for one request
//! - `tools`: tool contract, registry, executor and the built-in writing tools
//! - `artifacts`, `conversation`: persisted messages and the edit state machine
//! - `diff`: character-level diffs behind every proposed edit
//! - `events`, `transport`: stream events, the broker and the JSON-lines server
//! - `llm`, `search`: model and web search seams

pub mod agent;
pub mod artifacts;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod diff;
pub mod error;
pub mod events;
pub mod llm;
pub mod search;
pub mod tasks;
pub mod tools;
pub mod transport;

pub use error::{Result, ScribeError};
