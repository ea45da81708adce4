// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Task records and their output queues

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent::{ChatRequest, EventSink};
use crate::error::{Result, ScribeError};
use crate::events::{Broker, EventType, StreamEvent, StreamEventKind};

/// Lifecycle of a submitted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Processing,
    Done,
    Failed,
}

impl TaskState {
    /// Still counts toward the active set
    pub fn is_active(self) -> bool {
        matches!(self, TaskState::Queued | TaskState::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Processing => "processing",
            TaskState::Done => "done",
            TaskState::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer to a submit call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub request_id: Uuid,
    pub status: String,
}

impl SubmitResponse {
    pub fn processing(request_id: Uuid) -> Self {
        Self {
            request_id,
            status: "processing".to_string(),
        }
    }
}

/// Registry entry for one request
#[derive(Debug)]
pub struct AsyncTask {
    pub id: Uuid,
    pub session_id: Uuid,
    pub request: ChatRequest,
    pub state: TaskState,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancel: CancellationToken,
    /// Taken by the first subscriber
    pub(crate) receiver: Option<mpsc::Receiver<StreamEvent>>,
}

impl AsyncTask {
    pub(crate) fn new(
        id: Uuid,
        request: ChatRequest,
        receiver: mpsc::Receiver<StreamEvent>,
    ) -> Self {
        Self {
            id,
            session_id: Uuid::new_v4(),
            request,
            state: TaskState::Queued,
            started_at: Utc::now(),
            completed_at: None,
            cancel: CancellationToken::new(),
            receiver: Some(receiver),
        }
    }

    pub(crate) fn finish(&mut self, state: TaskState) {
        self.state = state;
        self.completed_at = Some(Utc::now());
    }
}

/// The receiving end of a task's output queue
#[derive(Debug)]
pub struct TaskSubscription {
    pub request_id: Uuid,
    receiver: mpsc::Receiver<StreamEvent>,
}

impl TaskSubscription {
    pub(crate) fn new(request_id: Uuid, receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self {
            request_id,
            receiver,
        }
    }

    /// Next event in queue order. `None` once the queue is closed.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }

    /// Read until the terminal event (inclusive) or until the queue closes.
    pub async fn collect(mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.recv().await {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }
}

/// Sends a task's events to its queue and mirrors them on the broker
#[derive(Clone)]
pub(crate) struct TaskSink {
    request_id: Uuid,
    sender: mpsc::Sender<StreamEvent>,
    broker: Arc<Broker<StreamEvent>>,
    cancel: CancellationToken,
}

impl TaskSink {
    pub(crate) fn new(
        request_id: Uuid,
        sender: mpsc::Sender<StreamEvent>,
        broker: Arc<Broker<StreamEvent>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            request_id,
            sender,
            broker,
            cancel,
        }
    }

    pub(crate) async fn send(&self, event: StreamEvent) -> Result<()> {
        self.broker.publish(&EventType::STREAM, event.clone());
        if self.sender.send(event).await.is_err() {
            tracing::info!(request_id = %self.request_id, "Subscriber went away, cancelling");
            self.cancel.cancel();
            return Err(ScribeError::Cancelled("subscriber disconnected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventSink for TaskSink {
    async fn emit(&self, kind: StreamEventKind) -> Result<()> {
        self.send(StreamEvent::new(self.request_id, kind)).await
    }
}
