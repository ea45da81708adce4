// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Scribe - writing assistant agent core
//!
//! Entry point for the `scribe` binary.

use anyhow::Context;
use clap::Parser;

use scribe::cli::commands::{load_settings, run_ask, run_config, run_diff, run_serve};
use scribe::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());
    if cli.verbose > 0 {
        let directive = if cli.verbose > 1 { "scribe=trace" } else { "scribe=debug" };
        if let Ok(parsed) = directive.parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }

    // stdout carries frames only
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = load_settings(cli.config.as_deref()).context("failed to load settings")?;

    let mut stdout = std::io::stdout();
    match cli.command {
        Commands::Serve(args) => run_serve(&args.script, &settings).await?,
        Commands::Ask(args) => run_ask(&args, &settings, &mut stdout).await?,
        Commands::Diff(args) => run_diff(&args, &mut stdout)
            .with_context(|| format!("failed to diff {} and {}", args.old.display(), args.new.display()))?,
        Commands::Config => run_config(&settings, &mut stdout)?,
    }

    Ok(())
}
