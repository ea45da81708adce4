// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation storage
//!
//! Messages exchanged about an article, their structured metadata and the
//! store they persist in.

pub mod message;
pub mod metadata;
pub mod store;
pub mod validation;

pub use message::{ChatMessage, MessageRole};
pub use metadata::{
    document_hash, ArtifactInfo, ArtifactStatus, ArtifactType, Attachment, AttachmentType,
    MessageContext, MessageMetaData, TaskProgressState, TaskStatus, ThinkingBlock, ToolExecution,
    UserAction, UserActionKind,
};
pub use store::{InMemoryMessageStore, MessageStore};
pub use validation::{parse_metadata, validate_metadata};
