// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Reply used by the scripted model when none is given
pub const DEFAULT_SCRIPTED_REPLY: &str =
    "No language model is connected. This is a scripted reply from scribe.";

/// Scribe - writing assistant agent core
#[derive(Parser, Debug)]
#[command(name = "scribe")]
#[command(version, about = "Writing assistant agent with streamed, reviewable edits")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file (defaults to $SCRIBE_HOME/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve line-delimited JSON frames on stdin/stdout
    Serve(ServeArgs),

    /// Submit one request and print its events as JSON lines
    Ask(AskArgs),

    /// Show the character diff between two files
    Diff(DiffArgs),

    /// Print the effective settings
    Config,
}

/// Scripted model behaviour shared by `serve` and `ask`
#[derive(Args, Debug, Default, Clone)]
pub struct ScriptArgs {
    /// Text the scripted model answers with
    #[arg(long)]
    pub reply: Option<String>,

    /// JSON file with a list of scripted turns
    #[arg(long)]
    pub script: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub script: ScriptArgs,
}

#[derive(Args, Debug)]
pub struct AskArgs {
    /// The request to send
    pub message: String,

    /// Article the conversation belongs to
    #[arg(short, long, default_value = "scratch")]
    pub article: String,

    /// File whose content is sent as the document
    #[arg(short, long)]
    pub document: Option<PathBuf>,

    /// Model to use
    #[arg(short, long)]
    pub model: Option<String>,

    #[command(flatten)]
    pub script: ScriptArgs,
}

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Original file
    pub old: PathBuf,

    /// Updated file
    pub new: PathBuf,

    /// Print the statistics as JSON only
    #[arg(long)]
    pub stats: bool,
}
