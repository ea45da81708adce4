// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM module for Scribe
//!
//! The chat-completion seam, the message model sent through it, stream
//! accumulation and a scripted provider.

pub mod message;
pub mod mock_provider;
pub mod provider;
pub mod streaming;

pub use message::*;
pub use provider::*;
