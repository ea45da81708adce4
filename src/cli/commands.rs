// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Command handlers for the `scribe` binary
//!
//! No concrete model client ships with the crate, so `serve` and `ask` run
//! against a scripted provider.

use serde::Deserialize;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use super::args::{AskArgs, DiffArgs, ScriptArgs, DEFAULT_SCRIPTED_REPLY};
use crate::agent::{AgentRunner, ChatRequest};
use crate::artifacts::ArtifactService;
use crate::config::Settings;
use crate::diff::DiffPatch;
use crate::error::{Result, ScribeError};
use crate::llm::mock_provider::{MockProvider, MockResponse, MockToolCall};
use crate::llm::provider::LlmProvider;
use crate::search::ExaSearchClient;
use crate::tasks::TaskManager;
use crate::tools::{InMemorySources, LlmTextGenerator, ToolServices};
use crate::transport::StreamServer;

/// One turn of a script file
#[derive(Debug, Deserialize)]
struct ScriptedTurn {
    #[serde(default)]
    text: String,
    #[serde(default)]
    tool_calls: Vec<ScriptedToolCall>,
}

#[derive(Debug, Deserialize)]
struct ScriptedToolCall {
    name: String,
    #[serde(default)]
    input: serde_json::Value,
}

impl From<ScriptedTurn> for MockResponse {
    fn from(turn: ScriptedTurn) -> Self {
        let calls = turn
            .tool_calls
            .into_iter()
            .map(|call| MockToolCall::new(call.name, call.input))
            .collect();
        MockResponse::text_with_tools(turn.text, calls)
    }
}

/// Settings from `path`, or from the default location.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Settings::load_with_env(path),
        None => Settings::load(),
    }
}

/// Build the scripted model from `--script` or `--reply`.
pub fn scripted_provider(args: &ScriptArgs) -> Result<MockProvider> {
    if let Some(path) = &args.script {
        let content = std::fs::read_to_string(path)?;
        let turns: Vec<ScriptedTurn> = serde_json::from_str(&content)?;
        if turns.is_empty() {
            return Err(ScribeError::InvalidInput(format!(
                "script {} has no turns",
                path.display()
            )));
        }
        return Ok(MockProvider::new().with_script(turns.into_iter().map(Into::into).collect()));
    }

    let reply = args.reply.as_deref().unwrap_or(DEFAULT_SCRIPTED_REPLY);
    Ok(MockProvider::new().with_response(reply))
}

/// Wire a task manager with in-memory stores and every available service.
pub fn build_manager(settings: &Settings, provider: Arc<dyn LlmProvider>) -> Result<TaskManager> {
    let sources = Arc::new(InMemorySources::new());
    let mut services = ToolServices::default()
        .with_sources(sources.clone())
        .with_importer(sources)
        .with_text(Arc::new(LlmTextGenerator::new(
            provider.clone(),
            settings.agent.default_model.clone(),
        )));
    if let Some(client) = ExaSearchClient::from_config(&settings.search)? {
        services = services.with_web(Arc::new(client));
    }

    let runner = AgentRunner::new(
        provider,
        Arc::new(ArtifactService::in_memory()),
        services,
        settings.agent.clone(),
    );
    Ok(TaskManager::new(settings.agent.clone(), Arc::new(runner)))
}

/// Serve the stream transport on stdio until stdin closes.
pub async fn run_serve(script: &ScriptArgs, settings: &Settings) -> Result<()> {
    let provider = Arc::new(scripted_provider(script)?);
    let manager = build_manager(settings, provider)?;
    tracing::info!("Serving frames on stdio");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    StreamServer::new(manager.clone())
        .serve(stdin, tokio::io::stdout())
        .await?;

    let remaining = manager.shutdown(settings.agent.request_timeout()).await;
    if remaining > 0 {
        tracing::warn!(remaining, "Exiting with requests still running");
    }
    Ok(())
}

/// Submit one request and write every event as a JSON line.
pub async fn run_ask<W: Write>(args: &AskArgs, settings: &Settings, out: &mut W) -> Result<()> {
    let provider = Arc::new(scripted_provider(&args.script)?);
    let manager = build_manager(settings, provider)?;

    let mut request = ChatRequest::new(&args.article, &args.message);
    if let Some(path) = &args.document {
        request = request.with_document(std::fs::read_to_string(path)?);
    }
    if let Some(model) = &args.model {
        request = request.with_model(model);
    }

    let response = manager.submit(request)?;
    for event in manager.subscribe(response.request_id)?.collect().await {
        writeln!(out, "{}", serde_json::to_string(&event)?)?;
    }
    out.flush()?;
    Ok(())
}

/// Print the unified diff between two files followed by its statistics.
pub fn run_diff<W: Write>(args: &DiffArgs, out: &mut W) -> Result<()> {
    let old = std::fs::read_to_string(&args.old)?;
    let new = std::fs::read_to_string(&args.new)?;
    let patch = DiffPatch::new(&old, &new);

    if !args.stats {
        if patch.is_unchanged() {
            writeln!(out, "No changes")?;
        } else {
            write!(out, "{}", patch.unified_diff)?;
            if !patch.unified_diff.ends_with('\n') {
                writeln!(out)?;
            }
        }
    }
    writeln!(out, "{}", patch.summary())?;
    Ok(())
}

/// Print the effective settings as pretty JSON. Stored API keys are masked.
pub fn run_config<W: Write>(settings: &Settings, out: &mut W) -> Result<()> {
    let mut shown = settings.clone();
    if shown.search.api_key.is_some() {
        shown.search.api_key = Some("********".to_string());
    }
    writeln!(out, "{}", serde_json::to_string_pretty(&shown)?)?;
    Ok(())
}
