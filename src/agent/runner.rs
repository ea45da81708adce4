// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Agent loop
//!
//! Runs one request against the model: stream a response, execute any tool
//! calls it asks for, feed the results back, and stop on the first response
//! without tool calls. Every step is reported through an [`EventSink`].

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::prompt::{user_prompt, SYSTEM_PROMPT};
use super::ChatRequest;
use crate::artifacts::ArtifactService;
use crate::config::AgentConfig;
use crate::conversation::{
    ChatMessage, MessageContext, MessageMetaData, MessageStore, ToolExecution,
};
use crate::error::{ApiError, Result, ScribeError};
use crate::events::{StreamEventKind, ToolResultPayload};
use crate::llm::message::{ContentBlock, Message};
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider};
use crate::llm::streaming::StreamAccumulator;
use crate::tools::{ToolContext, ToolExecutor, ToolRegistry, ToolResult, ToolServices};

/// Receives the events of one run, in order
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event. An error stops the run.
    async fn emit(&self, kind: StreamEventKind) -> Result<()>;
}

/// Identity and cancellation of one run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub request_id: Uuid,
    pub session_id: Uuid,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            session_id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn check_cancelled(&self, stage: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ScribeError::Cancelled(format!("request cancelled {}", stage)));
        }
        Ok(())
    }
}

/// Drives the model/tool loop for writing requests
pub struct AgentRunner {
    provider: Arc<dyn LlmProvider>,
    artifacts: Arc<ArtifactService>,
    messages: Arc<dyn MessageStore>,
    services: ToolServices,
    config: AgentConfig,
}

impl AgentRunner {
    /// Conversation turns are stored through `artifacts`' message store, and
    /// tool artifacts are created through the service itself.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        artifacts: Arc<ArtifactService>,
        services: ToolServices,
        config: AgentConfig,
    ) -> Self {
        let messages = artifacts.messages().clone();
        Self {
            provider,
            artifacts,
            messages,
            services,
            config,
        }
    }

    /// Run one request to completion. Returns the final assistant text.
    pub async fn run(
        &self,
        request: &ChatRequest,
        ctx: &RunContext,
        sink: &dyn EventSink,
    ) -> Result<String> {
        request.validate()?;
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.config.default_model.clone());

        let mut conversation = self.load_history(&request.article_id).await?;
        self.persist_user_message(request, ctx).await?;
        conversation.push(Message::user(user_prompt(&request.message, request.document())));

        let tool_context = ToolContext::new(ctx.request_id, ctx.session_id)
            .with_article(request.article_id.clone())
            .with_document(request.document().map(str::to_string))
            .with_cancel(ctx.cancel.clone());
        let executor = ToolExecutor::new(
            ToolRegistry::with_builtins(self.services.clone()),
            tool_context,
        );

        tracing::info!(
            request_id = %ctx.request_id,
            article_id = %request.article_id,
            model = %model,
            history = conversation.len() - 1,
            "Starting agent run"
        );

        for iteration in 1..=self.config.max_iterations {
            ctx.check_cancelled("before model call")?;

            let completion = CompletionRequest::new(model.clone(), conversation.clone())
                .with_system(SYSTEM_PROMPT)
                .with_max_tokens(self.config.max_response_tokens)
                .with_temperature(self.config.temperature)
                .with_tools(executor.tool_definitions());

            let response = self.get_response_with_retry(completion, ctx, sink).await?;
            let text = response.text();
            let tool_uses = response.tool_uses();

            tracing::debug!(
                request_id = %ctx.request_id,
                iteration,
                tool_calls = tool_uses.len(),
                output_tokens = response.usage.output_tokens,
                "Model turn finished"
            );

            if tool_uses.is_empty() {
                if !text.is_empty() {
                    sink.emit(StreamEventKind::Text {
                        content: text.clone(),
                    })
                    .await?;
                    self.messages
                        .create(ChatMessage::assistant(&request.article_id, &text))
                        .await?;
                }
                tracing::info!(request_id = %ctx.request_id, iteration, "Agent run finished");
                return Ok(text);
            }

            if !text.is_empty() {
                sink.emit(StreamEventKind::Text {
                    content: text.clone(),
                })
                .await?;
            }

            let mut assistant_blocks = Vec::new();
            if !text.is_empty() {
                assistant_blocks.push(ContentBlock::Text { text: text.clone() });
            }
            for (id, name, input) in &tool_uses {
                sink.emit(StreamEventKind::ToolUse {
                    tool_id: id.to_string(),
                    tool_name: name.to_string(),
                    tool_input: (*input).clone(),
                })
                .await?;
                assistant_blocks.push(ContentBlock::ToolUse {
                    id: id.to_string(),
                    name: name.to_string(),
                    input: (*input).clone(),
                });
            }
            conversation.push(Message::assistant_blocks(assistant_blocks));

            let mut results = Vec::with_capacity(tool_uses.len());
            for (id, name, input) in tool_uses {
                let started = Instant::now();
                let result = executor.execute_tool_use(id, name, input.clone()).await?;

                tracing::info!(
                    request_id = %ctx.request_id,
                    tool = name,
                    iteration,
                    is_error = result.is_error(),
                    "Tool finished"
                );

                if result.artifact.is_some() {
                    let message = self
                        .persist_artifact(&request.article_id, name, input, &result, started.elapsed())
                        .await?;
                    sink.emit(StreamEventKind::FullMessage { message }).await?;
                } else if let Some(summary) = search_summary(&result) {
                    let execution = tool_execution(name, input, &result, started.elapsed());
                    let message = ChatMessage::assistant(&request.article_id, summary)
                        .with_metadata(MessageMetaData::default().with_tool_execution(execution));
                    let message = self.messages.create(message).await?;
                    sink.emit(StreamEventKind::FullMessage { message }).await?;
                }

                sink.emit(StreamEventKind::ToolResult {
                    tool_result: ToolResultPayload {
                        tool_id: result.tool_use_id.clone(),
                        tool_name: name.to_string(),
                        content: result.output_text().to_string(),
                        is_error: result.is_error(),
                        metadata: result.metadata.clone(),
                        is_search: result.is_search,
                    },
                })
                .await?;
                results.push(result);
            }

            conversation.push(ToolExecutor::results_to_message(&results));
        }

        Err(ScribeError::Agent(format!(
            "max iterations reached ({})",
            self.config.max_iterations
        )))
    }

    /// Prior user/assistant turns of the article, oldest first.
    async fn load_history(&self, article_id: &str) -> Result<Vec<Message>> {
        if self.config.history_limit == 0 {
            return Ok(Vec::new());
        }
        let mut recent = self
            .messages
            .recent(article_id, self.config.history_limit)
            .await?;
        recent.reverse();
        Ok(recent.iter().filter_map(Message::from_stored).collect())
    }

    async fn persist_user_message(&self, request: &ChatRequest, ctx: &RunContext) -> Result<()> {
        let mut context = MessageContext::new(&request.article_id)
            .with_session(ctx.session_id)
            .with_request(ctx.request_id);
        if let Some(document) = request.document() {
            context = context.with_document_hash(document);
        }

        let message = ChatMessage::user(&request.article_id, &request.message)
            .with_metadata(MessageMetaData::default().with_context(context));
        self.messages.create(message).await?;
        Ok(())
    }

    async fn persist_artifact(
        &self,
        article_id: &str,
        tool_name: &str,
        input: &serde_json::Value,
        result: &ToolResult,
        elapsed: Duration,
    ) -> Result<ChatMessage> {
        let Some(draft) = result.artifact.clone() else {
            return Err(ScribeError::Agent(format!("{} produced no artifact", tool_name)));
        };

        let summary = draft
            .description
            .clone()
            .or_else(|| draft.title.clone())
            .unwrap_or_else(|| draft.artifact_type.to_string());
        let execution = tool_execution(tool_name, input, result, elapsed);

        let message = ChatMessage::assistant(article_id, format!("{}: {}", tool_name, summary))
            .with_metadata(MessageMetaData::default().with_tool_execution(execution));
        self.artifacts.create_artifact_message(message, draft).await
    }

    /// Stream one response, retrying rate-limited calls with backoff.
    async fn get_response_with_retry(
        &self,
        request: CompletionRequest,
        ctx: &RunContext,
        sink: &dyn EventSink,
    ) -> Result<CompletionResponse> {
        let max_retries = self.config.max_rate_limit_retries;
        let mut attempt = 0;

        loop {
            attempt += 1;
            tracing::debug!(
                request_id = %ctx.request_id,
                model = %request.model,
                attempt,
                message_count = request.messages.len(),
                tool_count = request.tools.len(),
                "Requesting model completion"
            );

            match self.stream_response(request.clone(), ctx, sink).await {
                Ok(response) => return Ok(response),
                Err(ScribeError::Api(ApiError::RateLimited(retry_after))) => {
                    if attempt > max_retries {
                        return Err(ApiError::RateLimited(retry_after).into());
                    }

                    let delay_secs = if retry_after > 0 {
                        u64::from(retry_after)
                    } else {
                        self.config.base_retry_delay_secs.saturating_pow(attempt)
                    };

                    tracing::warn!(
                        request_id = %ctx.request_id,
                        attempt,
                        max_retries,
                        retry_after_secs = delay_secs,
                        "Rate limited, retrying request"
                    );
                    sink.emit(StreamEventKind::Thinking {
                        message: format!("Rate limited, retrying in {}s...", delay_secs),
                    })
                    .await?;

                    tokio::select! {
                        _ = ctx.cancel.cancelled() => {
                            return Err(ScribeError::Cancelled("request cancelled during retry".to_string()));
                        }
                        _ = tokio::time::sleep(Duration::from_secs(delay_secs)) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fold the completion stream, forwarding text deltas as they arrive.
    async fn stream_response(
        &self,
        request: CompletionRequest,
        ctx: &RunContext,
        sink: &dyn EventSink,
    ) -> Result<CompletionResponse> {
        let mut stream = tokio::select! {
            _ = ctx.cancel.cancelled() => {
                return Err(ScribeError::Cancelled("request cancelled awaiting model".to_string()));
            }
            stream = self.provider.complete_stream(request) => stream?,
        };
        let mut accumulator = StreamAccumulator::new();

        loop {
            let next = tokio::select! {
                _ = ctx.cancel.cancelled() => {
                    return Err(ScribeError::Cancelled("request cancelled while streaming".to_string()));
                }
                next = stream.next() => next,
            };
            let Some(event) = next else {
                break;
            };

            if let Some(delta) = accumulator.process_event(event?)? {
                sink.emit(StreamEventKind::ContentDelta { content: delta }).await?;
            }
        }

        Ok(accumulator.finish())
    }
}

impl std::fmt::Debug for AgentRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRunner")
            .field("provider", &self.provider.name())
            .field("services", &self.services)
            .field("max_iterations", &self.config.max_iterations)
            .finish()
    }
}

fn tool_execution(
    tool_name: &str,
    input: &serde_json::Value,
    result: &ToolResult,
    elapsed: Duration,
) -> ToolExecution {
    let output = serde_json::from_str(result.output_text())
        .unwrap_or_else(|_| serde_json::Value::String(result.output_text().to_string()));
    ToolExecution::new(
        tool_name,
        &result.tool_use_id,
        input.clone(),
        output,
        elapsed,
        result.is_error().then(|| result.output_text().to_string()),
    )
}

/// History line kept for a successful web search or answer.
fn search_summary(result: &ToolResult) -> Option<String> {
    if !result.is_search || result.is_error() {
        return None;
    }
    let metadata = result.metadata.as_ref()?;
    let count = |field: &str| metadata[field].as_u64().unwrap_or(0);
    match metadata["tool_name"].as_str()? {
        "ask_question" => Some(format!(
            "Question answered with {} citations",
            count("citation_count")
        )),
        _ => Some(format!(
            "Web search completed: Found {} results, created {} sources",
            count("total_found"),
            count("sources_successful")
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{ArtifactDraft, DocumentStore, InMemoryDocumentStore};
    use crate::conversation::{ArtifactStatus, ArtifactType, InMemoryMessageStore, MessageRole};
    use crate::llm::message::MessageContent;
    use crate::llm::mock_provider::{MockProvider, MockResponse, MockToolCall};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingSink {
        events: Mutex<Vec<StreamEventKind>>,
    }

    impl CollectingSink {
        fn events(&self) -> Vec<StreamEventKind> {
            self.events.lock().unwrap().clone()
        }

        fn type_names(&self) -> Vec<&'static str> {
            self.events().iter().map(StreamEventKind::type_name).collect()
        }
    }

    #[async_trait]
    impl EventSink for CollectingSink {
        async fn emit(&self, kind: StreamEventKind) -> Result<()> {
            self.events.lock().unwrap().push(kind);
            Ok(())
        }
    }

    fn runner(provider: MockProvider, store: Arc<InMemoryMessageStore>) -> AgentRunner {
        AgentRunner::new(
            Arc::new(provider),
            Arc::new(ArtifactService::new(store, Arc::new(InMemoryDocumentStore::new()))),
            ToolServices::default(),
            AgentConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_plain_answer_streams_and_persists() {
        let store = Arc::new(InMemoryMessageStore::new());
        let provider = MockProvider::new().with_response("Cats are great pets.");
        let sink = CollectingSink::default();

        let text = runner(provider, store.clone())
            .run(
                &ChatRequest::new("a1", "Tell me about cats"),
                &RunContext::new(Uuid::new_v4()),
                &sink,
            )
            .await
            .unwrap();

        assert_eq!(text, "Cats are great pets.");
        let names = sink.type_names();
        assert_eq!(names.last(), Some(&"text"));
        assert!(names[..names.len() - 1].iter().all(|n| *n == "content_delta"));

        let stored = store.recent("a1", 10).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].role, MessageRole::Assistant);
        assert_eq!(stored[1].role, MessageRole::User);
        let context = stored[1].metadata.as_ref().unwrap().context.as_ref().unwrap();
        assert!(context.request_id.is_some());
        assert!(context.document_hash.is_none());
    }

    #[tokio::test]
    async fn test_edit_produces_artifact_before_tool_result() {
        let store = Arc::new(InMemoryMessageStore::new());
        let provider = MockProvider::new().with_script(vec![
            MockResponse::text_with_tools(
                "I'll tighten that.",
                vec![MockToolCall::new(
                    "edit_text",
                    json!({
                        "original_text": "Cats are animals.",
                        "new_text": "Cats are curious animals.",
                        "reason": "more vivid"
                    }),
                )],
            ),
            MockResponse::text("Done."),
        ]);
        let sink = CollectingSink::default();

        runner(provider.clone(), store.clone())
            .run(
                &ChatRequest::new("a1", "make it vivid").with_document("Cats are animals."),
                &RunContext::new(Uuid::new_v4()),
                &sink,
            )
            .await
            .unwrap();

        let names: Vec<_> = sink
            .type_names()
            .into_iter()
            .filter(|n| *n != "content_delta")
            .collect();
        assert_eq!(names, vec!["text", "tool_use", "full_message", "tool_result", "text"]);

        let artifact_message = sink
            .events()
            .into_iter()
            .find_map(|e| match e {
                StreamEventKind::FullMessage { message } => Some(message),
                _ => None,
            })
            .unwrap();
        let artifact = artifact_message.artifact().unwrap();
        assert_eq!(artifact.status, ArtifactStatus::Pending);
        assert_eq!(artifact.artifact_type, ArtifactType::CodeEdit);
        assert_eq!(artifact.content, "Cats are curious animals.");
        assert_eq!(artifact_message.content, "edit_text: more vivid");
        let execution = artifact_message.metadata.as_ref().unwrap().tool_execution.as_ref().unwrap();
        assert!(execution.success);

        // The second model call sees the tool result.
        let second = provider.recorded_requests().pop().unwrap();
        assert!(matches!(
            &second.messages.last().unwrap().content,
            MessageContent::Blocks(blocks) if matches!(blocks[0], ContentBlock::ToolResult { .. })
        ));

        let user = store.recent("a1", 10).await.unwrap().pop().unwrap();
        assert!(user.metadata.unwrap().context.unwrap().document_hash.is_some());
    }

    #[tokio::test]
    async fn test_run_artifacts_are_owned_by_artifact_service() {
        let documents = Arc::new(InMemoryDocumentStore::new().with_document("a1", "Cats are animals."));
        let artifacts = Arc::new(ArtifactService::new(Arc::new(InMemoryMessageStore::new()), documents.clone()));
        let provider = MockProvider::new().with_script(vec![
            MockResponse::tool_call(
                "edit_text",
                json!({"original_text": "Cats are animals.", "new_text": "Cats nap.", "reason": "short"}),
            ),
            MockResponse::text("Done."),
        ]);
        let runner = AgentRunner::new(
            Arc::new(provider),
            artifacts.clone(),
            ToolServices::default(),
            AgentConfig::default(),
        );

        runner
            .run(
                &ChatRequest::new("a1", "shorter").with_document("Cats are animals."),
                &RunContext::new(Uuid::new_v4()),
                &CollectingSink::default(),
            )
            .await
            .unwrap();

        let pending = artifacts.get_pending("a1").await.unwrap();
        assert_eq!(pending.len(), 1);
        let message_id = pending[0].id;
        assert!(pending[0].metadata.as_ref().unwrap().tool_execution.is_some());

        // A second artifact on the same message is refused.
        let again = artifacts
            .attach_artifact(message_id, ArtifactDraft::new(ArtifactType::Rewrite, "x"))
            .await;
        assert!(matches!(again, Err(ScribeError::Conflict(_))));

        artifacts.accept(message_id, None).await.unwrap();
        artifacts.apply(message_id).await.unwrap();
        assert_eq!(documents.get("a1").await.unwrap().as_deref(), Some("Cats nap."));
    }

    #[tokio::test]
    async fn test_first_turn_carries_layout_and_history() {
        let store = Arc::new(InMemoryMessageStore::new());
        store.create(ChatMessage::user("a1", "earlier question")).await.unwrap();
        store.create(ChatMessage::assistant("a1", "earlier answer")).await.unwrap();
        let provider = MockProvider::new().with_response("ok");

        runner(provider.clone(), store)
            .run(
                &ChatRequest::new("a1", "now this").with_document("# Title\nBody"),
                &RunContext::new(Uuid::new_v4()),
                &CollectingSink::default(),
            )
            .await
            .unwrap();

        let request = provider.last_request().unwrap();
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[0].text(), Some("earlier question"));
        assert_eq!(request.messages[1].text(), Some("earlier answer"));
        let first_turn = request.messages[2].text().unwrap();
        assert!(first_turn.starts_with("now this"));
        assert!(first_turn.contains("- Title (line 1)"));
        assert!(!first_turn.contains("Body"));
        assert_eq!(request.system.as_deref(), Some(SYSTEM_PROMPT));
        assert_eq!(request.tools.len(), 9);
    }

    struct CitingWeb;

    #[async_trait]
    impl crate::tools::WebSearch for CitingWeb {
        async fn search(&self, _query: &str) -> Result<Vec<crate::tools::WebSearchResult>> {
            Ok(Vec::new())
        }

        async fn answer(&self, _question: &str) -> Result<crate::tools::WebAnswer> {
            Ok(crate::tools::WebAnswer {
                answer: "About 16 hours.".to_string(),
                citations: vec![crate::tools::Citation {
                    url: "https://example.com/cats".to_string(),
                    title: "Cat sleep".to_string(),
                    ..Default::default()
                }],
                cost_dollars: None,
            })
        }
    }

    #[tokio::test]
    async fn test_answers_are_summarized_in_history() {
        let store = Arc::new(InMemoryMessageStore::new());
        let provider = MockProvider::new().with_script(vec![
            MockResponse::tool_call("ask_question", json!({"question": "How long do cats sleep?"})),
            MockResponse::text("Cats sleep about 16 hours."),
        ]);
        let sink = CollectingSink::default();
        let runner = AgentRunner::new(
            Arc::new(provider),
            Arc::new(ArtifactService::new(store.clone(), Arc::new(InMemoryDocumentStore::new()))),
            ToolServices::default().with_web(Arc::new(CitingWeb)),
            AgentConfig::default(),
        );

        runner
            .run(&ChatRequest::new("a1", "how long?"), &RunContext::new(Uuid::new_v4()), &sink)
            .await
            .unwrap();

        let names: Vec<_> = sink
            .type_names()
            .into_iter()
            .filter(|n| *n != "content_delta")
            .collect();
        assert_eq!(names, vec!["tool_use", "full_message", "tool_result", "text"]);

        let stored = store.recent("a1", 10).await.unwrap();
        let summary = stored
            .iter()
            .find(|m| m.content == "Question answered with 1 citations")
            .unwrap();
        assert!(summary.artifact().is_none());
        let execution = summary.metadata.as_ref().unwrap().tool_execution.as_ref().unwrap();
        assert_eq!(execution.output["answer"], "About 16 hours.");
    }

    #[test]
    fn test_search_summary_skips_failures_and_plain_tools() {
        let search = ToolResult::json(
            "t1",
            &json!({"tool_name": "search_web_sources", "total_found": 4, "sources_successful": 2}),
        );
        let metadata = json!({"tool_name": "search_web_sources", "total_found": 4, "sources_successful": 2});
        assert_eq!(
            search_summary(&search.clone().with_metadata(metadata).searching()).as_deref(),
            Some("Web search completed: Found 4 results, created 2 sources")
        );
        assert_eq!(search_summary(&search), None);
        assert_eq!(search_summary(&ToolResult::error("t1", "down").searching()), None);
    }

    #[tokio::test]
    async fn test_tool_failure_does_not_abort() {
        let provider = MockProvider::new().with_script(vec![
            MockResponse::tool_call("edit_text", json!({"original_text": "missing", "new_text": "x"})),
            MockResponse::text("Sorry, I could not find that."),
        ]);
        let sink = CollectingSink::default();

        let text = runner(provider, Arc::new(InMemoryMessageStore::new()))
            .run(
                &ChatRequest::new("a1", "edit").with_document("Cats are animals."),
                &RunContext::new(Uuid::new_v4()),
                &sink,
            )
            .await
            .unwrap();

        assert_eq!(text, "Sorry, I could not find that.");
        let failed = sink.events().into_iter().any(|e| {
            matches!(e, StreamEventKind::ToolResult { tool_result } if tool_result.is_error)
        });
        assert!(failed);
    }

    #[tokio::test]
    async fn test_max_iterations_is_an_agent_error() {
        let provider =
            MockProvider::new().with_script(vec![MockResponse::tool_call("analyze_document", json!({"user_request": "tone"}))]);
        let config = AgentConfig {
            max_iterations: 2,
            ..AgentConfig::default()
        };
        let runner = AgentRunner::new(
            Arc::new(provider.clone()),
            Arc::new(ArtifactService::in_memory()),
            ToolServices::default(),
            config,
        );

        let err = runner
            .run(
                &ChatRequest::new("a1", "loop"),
                &RunContext::new(Uuid::new_v4()),
                &CollectingSink::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ScribeError::Agent(ref m) if m == "max iterations reached (2)"));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_is_retried() {
        let provider = MockProvider::new().with_script(vec![
            MockResponse::RateLimited(0),
            MockResponse::text("after waiting"),
        ]);
        let sink = CollectingSink::default();

        let text = runner(provider.clone(), Arc::new(InMemoryMessageStore::new()))
            .run(&ChatRequest::new("a1", "hi"), &RunContext::new(Uuid::new_v4()), &sink)
            .await
            .unwrap();

        assert_eq!(text, "after waiting");
        assert_eq!(provider.call_count(), 2);
        assert_eq!(sink.type_names()[0], "thinking");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_gives_up_after_retries() {
        let provider = MockProvider::new().with_script(vec![MockResponse::RateLimited(1)]);

        let err = runner(provider.clone(), Arc::new(InMemoryMessageStore::new()))
            .run(
                &ChatRequest::new("a1", "hi"),
                &RunContext::new(Uuid::new_v4()),
                &CollectingSink::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ScribeError::Api(ApiError::RateLimited(1))));
        assert_eq!(provider.call_count(), 4);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let provider = MockProvider::new();
        let ctx = RunContext::new(Uuid::new_v4());
        ctx.cancel.cancel();

        let err = runner(provider.clone(), Arc::new(InMemoryMessageStore::new()))
            .run(&ChatRequest::new("a1", "hi"), &ctx, &CollectingSink::default())
            .await
            .unwrap_err();

        assert!(err.is_interruption());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_races_model_call() {
        let provider = MockProvider::new().with_delay(Duration::from_secs(30));
        let ctx = RunContext::new(Uuid::new_v4());
        let cancel = ctx.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        });

        let err = runner(provider, Arc::new(InMemoryMessageStore::new()))
            .run(&ChatRequest::new("a1", "hi"), &ctx, &CollectingSink::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ScribeError::Cancelled(_)));
    }
}
