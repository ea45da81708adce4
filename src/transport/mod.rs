// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Line-delimited JSON stream transport
//!
//! Clients send one frame per line (`{"request_id": "...", "action":
//! "subscribe"}` or `"cancel"`); the server answers with stream events, one
//! JSON object per line, until each subscribed request reaches its terminal
//! event. A `"submit"` frame carries a request instead of an id and is
//! subscribed to right away. Works over any async byte stream, stdio included.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::agent::ChatRequest;
use crate::error::{Result, ScribeError};
use crate::events::StreamEvent;
use crate::tasks::{TaskManager, TaskSubscription};

/// Message shown for unknown or evicted requests
pub const NOT_FOUND_MESSAGE: &str = "Request not found";

/// Frames waiting to be written
const OUTBOX_CAPACITY: usize = 256;

/// What a client can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameAction {
    Subscribe,
    Cancel,
    Submit,
}

/// One client line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientFrame {
    #[serde(default)]
    pub request_id: String,
    pub action: FrameAction,
    /// The request to start, for `submit`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<ChatRequest>,
}

/// Serves task event streams over a byte stream
#[derive(Debug, Clone)]
pub struct StreamServer {
    manager: TaskManager,
}

impl StreamServer {
    pub fn new(manager: TaskManager) -> Self {
        Self { manager }
    }

    /// Read frames until EOF, then finish forwarding every open stream.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (outbox, mut pending) = mpsc::channel::<StreamEvent>(OUTBOX_CAPACITY);

        let read = async move {
            let mut lines = reader.lines();
            while let Some(line) = lines.next_line().await? {
                if line.trim().is_empty() {
                    continue;
                }
                self.handle_line(&line, &outbox).await;
            }
            tracing::debug!("Client closed the input stream");
            Ok::<(), ScribeError>(())
        };

        let write = async {
            while let Some(event) = pending.recv().await {
                let json = serde_json::to_string(&event)?;
                writer.write_all(json.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<(), ScribeError>(())
        };

        let (read_result, write_result) = tokio::join!(read, write);
        read_result?;
        write_result
    }

    async fn handle_line(&self, line: &str, outbox: &mpsc::Sender<StreamEvent>) {
        let frame: ClientFrame = match serde_json::from_str(line) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed client frame");
                let _ = outbox
                    .send(StreamEvent::error(Uuid::nil(), format!("invalid frame: {}", e)))
                    .await;
                return;
            }
        };

        if frame.action == FrameAction::Submit {
            let submitted = match frame.request {
                Some(request) => self.manager.submit(request),
                None => Err(ScribeError::InvalidInput("submit frame without a request".to_string())),
            };
            let outcome = submitted.and_then(|response| self.manager.subscribe(response.request_id));
            match outcome {
                Ok(subscription) => forward(subscription, outbox.clone()),
                Err(e) => {
                    let _ = outbox.send(StreamEvent::error(Uuid::nil(), e.to_string())).await;
                }
            }
            return;
        }

        let Ok(request_id) = Uuid::parse_str(frame.request_id.trim()) else {
            let _ = outbox.send(StreamEvent::error(Uuid::nil(), NOT_FOUND_MESSAGE)).await;
            return;
        };

        let outcome = match frame.action {
            FrameAction::Subscribe => self
                .manager
                .subscribe(request_id)
                .map(|subscription| forward(subscription, outbox.clone())),
            FrameAction::Cancel => self.manager.cancel(request_id),
            FrameAction::Submit => Ok(()),
        };

        if let Err(e) = outcome {
            tracing::debug!(request_id = %request_id, error = %e, "Frame rejected");
            let message = match e {
                ScribeError::NotFound(_) => NOT_FOUND_MESSAGE.to_string(),
                other => other.to_string(),
            };
            let _ = outbox.send(StreamEvent::error(request_id, message)).await;
        }
    }
}

/// Copy a subscription to the outbox until its terminal event.
fn forward(mut subscription: TaskSubscription, outbox: mpsc::Sender<StreamEvent>) {
    tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            let terminal = event.is_terminal();
            if outbox.send(event).await.is_err() || terminal {
                break;
            }
        }
    });
}
