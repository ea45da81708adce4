// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use futures::StreamExt;
use serde_json::json;

use scribe::conversation::{ChatMessage, MessageRole};
use scribe::llm::message::{ContentBlock, Message, MessageContent, Role};
use scribe::llm::mock_provider::{MockProvider, MockResponse, MockToolCall};
use scribe::llm::provider::{CompletionRequest, ContentBlockResponse, LlmProvider, StopReason};
use scribe::llm::streaming::StreamAccumulator;
use scribe::ScribeError;

#[test]
fn test_message_user_creation() {
    let message = Message::user("Hello, world!");

    assert_eq!(message.role, Role::User);
    match &message.content {
        MessageContent::Text(text) => assert_eq!(text, "Hello, world!"),
        _ => panic!("Expected text content"),
    }
}

#[test]
fn test_stored_tool_messages_are_not_history() {
    let tool = ChatMessage::new("a1", MessageRole::Tool, "ignored");

    assert!(Message::from_stored(&ChatMessage::user("a1", "hi")).is_some());
    assert!(Message::from_stored(&tool).is_none());
}

#[test]
fn test_tool_results_message_is_user_turn() {
    let message = Message::tool_results(vec![ContentBlock::ToolResult {
        tool_use_id: "t1".to_string(),
        content: "ok".to_string(),
        is_error: None,
    }]);
    assert_eq!(message.role, Role::User);
    assert!(!message.has_tool_use());
}

#[tokio::test]
async fn test_mock_stream_accumulates_text_and_tools() {
    let provider = MockProvider::new().with_script(vec![MockResponse::text_with_tools(
        "Let me check the document first.",
        vec![MockToolCall::new("read_document", json!({"start_line": 1}))],
    )]);

    let mut stream = provider
        .complete_stream(CompletionRequest::new("gpt-4o", vec![Message::user("hi")]))
        .await
        .unwrap();
    let mut accumulator = StreamAccumulator::new();
    let mut streamed = String::new();
    while let Some(event) = stream.next().await {
        if let Some(delta) = accumulator.process_event(event.unwrap()).unwrap() {
            streamed.push_str(&delta);
        }
    }
    let response = accumulator.finish();

    assert_eq!(streamed, "Let me check the document first.");
    assert_eq!(response.text(), streamed);
    assert_eq!(response.stop_reason, Some(StopReason::ToolUse));
    match &response.content[1] {
        ContentBlockResponse::ToolUse { name, input, .. } => {
            assert_eq!(name, "read_document");
            assert_eq!(input, &json!({"start_line": 1}));
        }
        other => panic!("Expected tool use, got {other:?}"),
    }
}

#[tokio::test]
async fn test_mock_script_repeats_last_turn_and_records_requests() {
    let provider = MockProvider::new().with_script(vec![
        MockResponse::text("one"),
        MockResponse::text("two"),
    ]);
    let request = CompletionRequest::new("gpt-4o", vec![Message::user("hi")]);

    let mut texts = Vec::new();
    for _ in 0..3 {
        texts.push(provider.complete(request.clone()).await.unwrap().text());
    }

    assert_eq!(texts, vec!["one", "two", "two"]);
    assert_eq!(provider.call_count(), 3);
    assert_eq!(provider.recorded_requests().len(), 3);
}

#[tokio::test]
async fn test_mock_failure_is_server_error() {
    let provider = MockProvider::new().with_script(vec![MockResponse::Failure("down".to_string())]);
    let err = provider
        .complete(CompletionRequest::new("gpt-4o", vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, ScribeError::Api(_)));
    assert!(err.to_string().contains("down"));
}
