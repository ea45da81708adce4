// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! End-to-end request flows through the public API

use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scribe::agent::{AgentRunner, ChatRequest};
use scribe::artifacts::{ArtifactService, DocumentStore, InMemoryDocumentStore};
use scribe::config::AgentConfig;
use scribe::conversation::{ArtifactStatus, InMemoryMessageStore, MessageStore, UserActionKind};
use scribe::events::{EventType, StreamEvent, StreamEventKind};
use scribe::llm::mock_provider::{MockProvider, MockResponse, MockToolCall};
use scribe::tasks::{TaskManager, TaskState};
use scribe::tools::ToolServices;
use scribe::ScribeError;

struct Harness {
    manager: TaskManager,
    messages: Arc<InMemoryMessageStore>,
    documents: Arc<InMemoryDocumentStore>,
    artifacts: Arc<ArtifactService>,
}

fn harness(provider: MockProvider) -> Harness {
    let messages = Arc::new(InMemoryMessageStore::new());
    let documents = Arc::new(InMemoryDocumentStore::new().with_document("article-1", "Cats are animals."));
    let artifacts = Arc::new(ArtifactService::new(messages.clone(), documents.clone()));
    let runner = AgentRunner::new(
        Arc::new(provider),
        artifacts.clone(),
        ToolServices::default(),
        AgentConfig::default(),
    );
    Harness {
        manager: TaskManager::new(AgentConfig::default(), Arc::new(runner)),
        messages,
        documents,
        artifacts,
    }
}

fn edit_script() -> MockProvider {
    MockProvider::new().with_script(vec![
        MockResponse::text_with_tools(
            "",
            vec![MockToolCall::new(
                "edit_text",
                json!({
                    "original_text": "Cats are animals.",
                    "new_text": "Cats are great animals!",
                    "reason": "more enthusiasm"
                }),
            )],
        ),
        MockResponse::text("I made the sentence more enthusiastic."),
    ])
}

fn non_delta(events: &[StreamEvent]) -> Vec<&'static str> {
    events
        .iter()
        .map(StreamEvent::type_name)
        .filter(|name| *name != "content_delta")
        .collect()
}

#[tokio::test]
async fn test_edit_request_streams_tool_use_result_and_done() {
    let h = harness(edit_script());
    let request = ChatRequest::new("article-1", "make it punchier").with_document("Cats are animals.");

    let response = h.manager.submit(request).unwrap();
    let events = h.manager.subscribe(response.request_id).unwrap().collect().await;

    assert_eq!(
        non_delta(&events),
        vec!["tool_use", "full_message", "tool_result", "text", "done"]
    );

    let tool_result = events
        .iter()
        .find_map(|e| match &e.kind {
            StreamEventKind::ToolResult { tool_result } => Some(tool_result.clone()),
            _ => None,
        })
        .unwrap();
    assert!(!tool_result.is_error);
    assert_eq!(tool_result.tool_name, "edit_text");

    let output: serde_json::Value = serde_json::from_str(&tool_result.content).unwrap();
    assert_eq!(output["new_text"], "Cats are great animals!");
    let unchanged = output["patch"]["summary"]["unchanged"].as_u64().unwrap();
    assert!(unchanged <= 17);
    assert!(output["patch"]["unified_diff"].as_str().unwrap().contains("+Cats are great animals!"));

    assert_eq!(events.iter().filter(|e| e.done).count(), 1);
}

#[tokio::test]
async fn test_artifact_accept_then_apply_updates_document() {
    let h = harness(edit_script());
    let service = &h.artifacts;

    let request = ChatRequest::new("article-1", "make it punchier").with_document("Cats are animals.");
    let id = h.manager.submit(request).unwrap().request_id;
    h.manager.subscribe(id).unwrap().collect().await;

    let pending = service.get_pending("article-1").await.unwrap();
    assert_eq!(pending.len(), 1);
    let message_id = pending[0].id;

    // Applying before accepting is not allowed.
    assert!(matches!(service.apply(message_id).await, Err(ScribeError::Conflict(_))));

    let accepted = service.accept(message_id, Some("nice".to_string())).await.unwrap();
    let action = accepted.metadata.as_ref().unwrap().user_action.as_ref().unwrap();
    assert_eq!(action.action, UserActionKind::Accept);
    assert_eq!(action.feedback.as_deref(), Some("nice"));

    let applied = service.apply(message_id).await.unwrap();
    let artifact = applied.artifact().unwrap();
    assert_eq!(artifact.status, ArtifactStatus::Applied);
    assert!(artifact.applied_at.is_some());
    assert_eq!(
        h.documents.get("article-1").await.unwrap().as_deref(),
        Some("Cats are great animals!")
    );

    assert!(service.get_pending("article-1").await.unwrap().is_empty());
    assert!(matches!(
        service.reject(message_id, None).await,
        Err(ScribeError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_unknown_request_subscribe_is_not_found() {
    let h = harness(MockProvider::new());
    assert!(matches!(
        h.manager.subscribe(uuid::Uuid::new_v4()),
        Err(ScribeError::NotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_cancelling_one_request_leaves_another_intact() {
    let h = harness(MockProvider::new().with_response("All done.").with_delay(Duration::from_secs(5)));

    let first = h.manager.submit(ChatRequest::new("a1", "first")).unwrap().request_id;
    let second = h.manager.submit(ChatRequest::new("a2", "second")).unwrap().request_id;
    let first_events = h.manager.subscribe(first).unwrap();
    let second_events = h.manager.subscribe(second).unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    h.manager.cancel(first).unwrap();

    let first_events = first_events.collect().await;
    let second_events = second_events.collect().await;

    assert_eq!(
        first_events.last().unwrap().kind,
        StreamEventKind::Error {
            message: "cancelled".to_string()
        }
    );
    assert_eq!(second_events.last().unwrap().kind, StreamEventKind::Done);
    assert!(second_events.iter().any(|e| matches!(
        &e.kind,
        StreamEventKind::Text { content } if content == "All done."
    )));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.manager.state(first), Some(TaskState::Failed));
    assert_eq!(h.manager.state(second), Some(TaskState::Done));
}

#[tokio::test(start_paused = true)]
async fn test_long_request_sends_heartbeats() {
    let h = harness(MockProvider::new().with_response("Finally.").with_delay(Duration::from_secs(90)));
    let id = h.manager.submit(ChatRequest::new("a1", "slow one")).unwrap().request_id;

    let events = h.manager.subscribe(id).unwrap().collect().await;
    let thinking: Vec<_> = events
        .iter()
        .filter_map(|e| match &e.kind {
            StreamEventKind::Thinking { message } => Some(message.as_str()),
            _ => None,
        })
        .collect();

    assert_eq!(thinking, vec!["Still working on your request..."]);
    assert_eq!(events.last().unwrap().kind, StreamEventKind::Done);
}

#[tokio::test]
async fn test_broker_sees_every_event() {
    let h = harness(MockProvider::new().with_response("Broadcast."));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let broker = h.manager.broker();
    broker.subscribe(EventType::STREAM, move |event: StreamEvent| {
        sink.lock().unwrap().push(event.type_name());
    });

    let id = h.manager.submit(ChatRequest::new("a1", "hi")).unwrap().request_id;
    let events = h.manager.subscribe(id).unwrap().collect().await;

    // Handlers run on their own tasks; give them a moment.
    for _ in 0..50 {
        if seen.lock().unwrap().len() == events.len() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), events.len());
    assert!(seen.contains(&"done"));
}

#[tokio::test]
async fn test_follow_up_request_sees_history() {
    let provider = MockProvider::new().with_response("Noted.");
    let h = harness(provider.clone());

    for message in ["first question", "second question"] {
        let id = h.manager.submit(ChatRequest::new("a1", message)).unwrap().request_id;
        h.manager.subscribe(id).unwrap().collect().await;
    }

    let last = provider.last_request().unwrap();
    let texts: Vec<_> = last.messages.iter().filter_map(|m| m.text()).collect();
    assert_eq!(texts, vec!["first question", "Noted.", "second question"]);
    assert_eq!(h.messages.recent("a1", 10).await.unwrap().len(), 4);
}
