// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Async request registry
//!
//! `submit` registers a task and returns at once; the agent run happens on
//! its own tokio task under a hard timeout. Whatever happens to the run, the
//! task ends with exactly one terminal event, closes its queue, and is evicted
//! from the registry after the cleanup delay.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::time::Instant;
use uuid::Uuid;

use super::task::{AsyncTask, SubmitResponse, TaskSink, TaskState, TaskSubscription};
use crate::agent::{AgentRunner, ChatRequest, EventSink, RunContext};
use crate::config::AgentConfig;
use crate::error::{Result, ScribeError};
use crate::events::{Broker, StreamEvent, StreamEventKind};

/// Heartbeat messages and how long a task must have run before each is sent
const HEARTBEATS: [(Duration, &str); 2] = [
    (Duration::from_secs(60), "Still working on your request..."),
    (
        Duration::from_secs(120),
        "This is taking longer than expected, but I'm still working on it...",
    ),
];

/// How often `shutdown` re-checks the active set
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// A reserved concurrency slot, released on drop
struct Slot(Arc<AtomicUsize>);

impl Drop for Slot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Registry of in-flight and recently finished requests
#[derive(Clone)]
pub struct TaskManager {
    tasks: Arc<DashMap<Uuid, AsyncTask>>,
    /// Requests holding a slot, from submit until their terminal state
    active: Arc<AtomicUsize>,
    runner: Arc<AgentRunner>,
    broker: Arc<Broker<StreamEvent>>,
    config: AgentConfig,
}

impl TaskManager {
    pub fn new(config: AgentConfig, runner: Arc<AgentRunner>) -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            active: Arc::new(AtomicUsize::new(0)),
            runner,
            broker: Arc::new(Broker::new()),
            config,
        }
    }

    /// Register a request and start working on it in the background.
    pub fn submit(&self, request: ChatRequest) -> Result<SubmitResponse> {
        request.validate()?;
        let Some(slot) = self.reserve_slot() else {
            tracing::warn!(
                max_concurrent = self.config.max_concurrent,
                "Rejecting request, concurrency limit reached"
            );
            return Err(ScribeError::InvalidInput(
                "too many concurrent requests".to_string(),
            ));
        };

        let request_id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(self.config.channel_buffer.max(1));
        let task = AsyncTask::new(request_id, request.clone(), receiver);
        let ctx = RunContext {
            request_id,
            session_id: task.session_id,
            cancel: task.cancel.clone(),
        };
        let sink = TaskSink::new(request_id, sender, self.broker.clone(), ctx.cancel.clone());
        self.tasks.insert(request_id, task);

        tracing::info!(
            request_id = %request_id,
            article_id = %request.article_id,
            active = self.active_requests(),
            "Request submitted"
        );

        let manager = self.clone();
        tokio::spawn(async move {
            manager.drive(request, ctx, sink, slot).await;
        });

        Ok(SubmitResponse::processing(request_id))
    }

    /// Take the output queue of a request. Only one subscriber is allowed.
    pub fn subscribe(&self, request_id: Uuid) -> Result<TaskSubscription> {
        let mut task = self
            .tasks
            .get_mut(&request_id)
            .ok_or_else(|| ScribeError::NotFound(format!("request {}", request_id)))?;
        let receiver = task.receiver.take().ok_or_else(|| {
            ScribeError::Conflict(format!("request {} already has a subscriber", request_id))
        })?;
        Ok(TaskSubscription::new(request_id, receiver))
    }

    /// Ask a running request to stop.
    pub fn cancel(&self, request_id: Uuid) -> Result<()> {
        let task = self
            .tasks
            .get(&request_id)
            .ok_or_else(|| ScribeError::NotFound(format!("request {}", request_id)))?;
        tracing::info!(request_id = %request_id, state = %task.state, "Cancelling request");
        task.cancel.cancel();
        Ok(())
    }

    pub fn state(&self, request_id: Uuid) -> Option<TaskState> {
        self.tasks.get(&request_id).map(|task| task.state)
    }

    /// Number of queued or processing requests
    pub fn active_requests(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Take a slot unless `max_concurrent` (0 = unlimited) are already held.
    fn reserve_slot(&self) -> Option<Slot> {
        let max = self.config.max_concurrent;
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |held| {
                (max == 0 || held < max).then_some(held + 1)
            })
            .ok()
            .map(|_| Slot(self.active.clone()))
    }

    /// Cancel everything and wait for the active set to drain. Returns how
    /// many requests were still active at the deadline.
    pub async fn shutdown(&self, timeout: Duration) -> usize {
        for entry in self.tasks.iter().filter(|entry| entry.value().state.is_active()) {
            entry.value().cancel.cancel();
        }

        let deadline = Instant::now() + timeout;
        loop {
            let active = self.active_requests();
            if active == 0 || Instant::now() >= deadline {
                if active > 0 {
                    tracing::warn!(active, "Shutdown deadline passed with requests still active");
                }
                return active;
            }
            tokio::time::sleep(SHUTDOWN_POLL).await;
        }
    }

    /// Every stream event is also published here under `EventType::STREAM`.
    pub fn broker(&self) -> Arc<Broker<StreamEvent>> {
        self.broker.clone()
    }

    async fn drive(self, request: ChatRequest, ctx: RunContext, sink: TaskSink, slot: Slot) {
        let request_id = ctx.request_id;
        self.set_state(request_id, TaskState::Processing);

        let runner = self.runner.clone();
        let run_sink = sink.clone();
        let run_ctx = ctx.clone();
        let mut handle =
            tokio::spawn(async move { runner.run(&request, &run_ctx, &run_sink).await });

        let started = Instant::now();
        let mut heartbeats_sent = 0;
        let period = self.config.progress_interval().max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval_at(started + period, period);

        let watched = async {
            loop {
                tokio::select! {
                    joined = &mut handle => return joined,
                    _ = ticker.tick() => {
                        if let Some((after, message)) = HEARTBEATS.get(heartbeats_sent) {
                            if started.elapsed() >= *after {
                                heartbeats_sent += 1;
                                let _ = sink
                                    .emit(StreamEventKind::Thinking {
                                        message: message.to_string(),
                                    })
                                    .await;
                            }
                        }
                    }
                }
            }
        };

        let outcome = tokio::time::timeout(self.config.request_timeout(), watched).await;
        let (state, terminal) = match outcome {
            Ok(joined) => terminal_event(request_id, joined),
            Err(_) => {
                tracing::warn!(request_id = %request_id, "Request timed out");
                ctx.cancel.cancel();
                handle.abort();
                (TaskState::Failed, StreamEvent::error(request_id, "timeout"))
            }
        };

        if let Some(mut task) = self.tasks.get_mut(&request_id) {
            task.finish(state);
            tracing::info!(
                request_id = %request_id,
                state = %state,
                elapsed_ms = (Utc::now() - task.started_at).num_milliseconds(),
                "Request finished"
            );
        }
        drop(slot);

        let delivered =
            tokio::time::timeout(self.config.cleanup_delay(), sink.send(terminal)).await;
        if !matches!(delivered, Ok(Ok(()))) {
            tracing::debug!(request_id = %request_id, "Terminal event not delivered");
        }
        drop(sink);

        tokio::time::sleep(self.config.cleanup_delay()).await;
        self.tasks.remove(&request_id);
        tracing::debug!(request_id = %request_id, "Request evicted");
    }

    fn set_state(&self, request_id: Uuid, state: TaskState) {
        if let Some(mut task) = self.tasks.get_mut(&request_id) {
            task.state = state;
        }
    }
}

/// Map how the run ended to the final state and the one terminal event.
fn terminal_event(
    request_id: Uuid,
    joined: std::result::Result<Result<String>, JoinError>,
) -> (TaskState, StreamEvent) {
    match joined {
        Ok(Ok(_)) => (TaskState::Done, StreamEvent::done(request_id)),
        Ok(Err(ScribeError::Cancelled(reason))) => {
            tracing::info!(request_id = %request_id, reason = %reason, "Request cancelled");
            (TaskState::Failed, StreamEvent::error(request_id, "cancelled"))
        }
        Ok(Err(ScribeError::Timeout(_))) => {
            (TaskState::Failed, StreamEvent::error(request_id, "timeout"))
        }
        Ok(Err(e)) => {
            tracing::error!(request_id = %request_id, error = %e, "Request failed");
            (TaskState::Failed, StreamEvent::error(request_id, e.to_string()))
        }
        Err(join_error) if join_error.is_panic() => {
            tracing::error!(request_id = %request_id, "Agent run panicked");
            (
                TaskState::Failed,
                StreamEvent::error(request_id, "internal error: agent run panicked"),
            )
        }
        Err(_) => (TaskState::Failed, StreamEvent::error(request_id, "cancelled")),
    }
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager")
            .field("tasks", &self.tasks.len())
            .field("max_concurrent", &self.config.max_concurrent)
            .finish()
    }
}
