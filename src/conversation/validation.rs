// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Metadata validation
//!
//! Enum-valued fields are checked by serde when metadata is parsed; these
//! checks cover the rules the types cannot express.

use super::metadata::{ArtifactInfo, Attachment, MessageMetaData, TaskStatus, UserAction};
use crate::error::{Result, ScribeError};

/// Parse raw metadata JSON, reporting bad enum values as invalid input.
pub fn parse_metadata(value: serde_json::Value) -> Result<MessageMetaData> {
    let metadata: MessageMetaData = serde_json::from_value(value)
        .map_err(|e| ScribeError::InvalidInput(format!("invalid metadata: {}", e)))?;
    validate_metadata(&metadata)?;
    Ok(metadata)
}

/// Check every populated section of a metadata blob.
pub fn validate_metadata(metadata: &MessageMetaData) -> Result<()> {
    if let Some(artifact) = &metadata.artifact {
        validate_artifact(artifact)
            .map_err(|e| ScribeError::InvalidInput(format!("invalid artifact: {}", e)))?;
    }
    if let Some(task) = &metadata.task_status {
        validate_task_status(task)
            .map_err(|e| ScribeError::InvalidInput(format!("invalid task status: {}", e)))?;
    }
    if let Some(action) = &metadata.user_action {
        validate_user_action(action)
            .map_err(|e| ScribeError::InvalidInput(format!("invalid user action: {}", e)))?;
    }
    for attachment in &metadata.attachments {
        validate_attachment(attachment)
            .map_err(|e| ScribeError::InvalidInput(format!("invalid attachment: {}", e)))?;
    }
    Ok(())
}

fn validate_artifact(artifact: &ArtifactInfo) -> std::result::Result<(), String> {
    if artifact.id.trim().is_empty() {
        return Err("artifact id is required".to_string());
    }
    if artifact.applied_at.is_some() && artifact.status != super::ArtifactStatus::Applied {
        return Err(format!(
            "applied_at is set but status is {}",
            artifact.status
        ));
    }
    Ok(())
}

fn validate_task_status(task: &TaskStatus) -> std::result::Result<(), String> {
    if task.task_id.trim().is_empty() {
        return Err("task id is required".to_string());
    }
    if !(0.0..=100.0).contains(&task.progress) {
        return Err(format!("progress {} is outside 0..=100", task.progress));
    }
    Ok(())
}

fn validate_user_action(action: &UserAction) -> std::result::Result<(), String> {
    if action.artifact_id.trim().is_empty() {
        return Err("artifact id is required".to_string());
    }
    Ok(())
}

fn validate_attachment(attachment: &Attachment) -> std::result::Result<(), String> {
    if attachment.name.trim().is_empty() {
        return Err("name is required".to_string());
    }
    if attachment.url.trim().is_empty() {
        return Err("url is required".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::metadata::{ArtifactType, TaskStatus};
    use serde_json::json;

    #[test]
    fn test_empty_metadata_is_valid() {
        assert!(validate_metadata(&MessageMetaData::default()).is_ok());
    }

    #[test]
    fn test_artifact_requires_id() {
        let mut artifact = ArtifactInfo::pending(ArtifactType::Rewrite, "text");
        artifact.id = "  ".to_string();
        let err = validate_metadata(&MessageMetaData::default().with_artifact(artifact)).unwrap_err();
        assert!(err.to_string().contains("invalid artifact"));
    }

    #[test]
    fn test_task_progress_range() {
        let mut task = TaskStatus::queued("t1", "analysis");
        task.progress = 101.0;
        let err = validate_metadata(&MessageMetaData::default().with_task_status(task)).unwrap_err();
        assert!(err.to_string().contains("invalid task status"));

        let mut task = TaskStatus::queued("t1", "analysis");
        task.progress = f64::NAN;
        assert!(validate_metadata(&MessageMetaData::default().with_task_status(task)).is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_status() {
        let err = parse_metadata(json!({
            "artifact": {"id": "a", "type": "rewrite", "status": "archived", "content": ""}
        }))
        .unwrap_err();
        assert!(matches!(err, ScribeError::InvalidInput(_)));
    }

    #[test]
    fn test_parse_accepts_full_blob() {
        let metadata = parse_metadata(json!({
            "artifact": {"id": "a", "type": "suggestion", "status": "pending", "content": "x"},
            "user_action": {"action": "accept", "timestamp": "2025-01-01T00:00:00Z", "artifact_id": "a"},
            "attachments": [{"type": "link", "name": "docs", "url": "https://example.com"}]
        }))
        .unwrap();
        assert_eq!(metadata.attachments.len(), 1);
        assert!(metadata.user_action.is_some());
    }

    #[test]
    fn test_attachment_requires_url() {
        let err = parse_metadata(json!({
            "attachments": [{"type": "file", "name": "notes.txt", "url": ""}]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("url is required"));
    }
}
