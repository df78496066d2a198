// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};
use uuid::Uuid;

use agentcore_core::{Agent, AgentEvent, AgentRuntimeContext, Context, ContextIds};
use agentcore_hooks::{ConfirmMode, ConfirmationResult};
use agentcore_model::ToolUse;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::ShowConfig => show_config(cli.config.as_deref()),
        Commands::Completions { shell } => {
            cli::print_completions(*shell);
            Ok(())
        }
        Commands::Run { prompt, autonomous, yes, workspace, log_dir } => {
            run_one_shot(cli.config.as_deref(), prompt.clone(), *autonomous, *yes, workspace.clone(), log_dir.clone()).await
        }
        Commands::Serve { bind, prompt } => serve(cli.config.as_deref(), bind.clone(), prompt.clone()).await,
    }
}

fn show_config(path: Option<&Path>) -> anyhow::Result<()> {
    let config = agentcore_config::load(path)?;
    println!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

/// `run` (§4.7): a one-shot, non-interactive turn. Reads a prompt from the
/// argument or stdin, drives the turn loop against the configured provider,
/// streams assistant text to stdout as it arrives.
async fn run_one_shot(
    config_path: Option<&Path>,
    prompt: Option<String>,
    autonomous: bool,
    auto_confirm: bool,
    workspace: Option<PathBuf>,
    log_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = agentcore_config::load(config_path)?;
    config.agent.interactive = !autonomous;

    let prompt = match prompt {
        Some(p) => p,
        None => {
            if io::stdin().is_terminal() {
                anyhow::bail!("no prompt given and stdin is a terminal; pass a prompt or pipe one in");
            }
            tokio::task::spawn_blocking(|| {
                let mut buf = String::new();
                io::stdin().read_to_string(&mut buf).map(|_| buf)
            })
            .await
            .context("reading prompt from stdin")??
        }
    };

    let ids = ContextIds { conversation_id: Uuid::new_v4().to_string(), session_id: Uuid::new_v4().to_string() };
    let mode = ConfirmMode { interactive: config.agent.interactive, server: false, no_confirm: auto_confirm };
    let context = Context::new(ids, &config, cli_confirm, |_, _| None, mode).await;

    let model = agentcore_model::from_config(&config.model)?;
    let max_tokens = config.model.max_tokens.unwrap_or(4096) as usize;

    let mut runtime = AgentRuntimeContext::new(workspace.unwrap_or(std::env::current_dir()?));
    if let Some(dir) = log_dir {
        runtime = runtime.with_log_dir(dir);
    }

    let (events_tx, events_rx) = mpsc::channel(256);
    let printer = tokio::spawn(print_events(events_rx));

    let mut agent = Agent::new(context, Arc::from(model), Arc::new(config.agent.clone()), runtime, max_tokens, events_tx)?;

    let interrupt = agent.interrupt_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; finishing the in-flight step");
            interrupt.notify_one();
        }
    });

    let result = agent.submit(prompt).await;
    drop(agent);
    let _ = printer.await;
    result
}

/// Forwards a conversation's [`AgentEvent`] stream to stdout/stderr. This is
/// the CLI's counterpart to the server crate's `bridge_agent_events`, just
/// rendered as plain text instead of SSE.
async fn print_events(mut events: mpsc::Receiver<AgentEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            AgentEvent::TextDelta(token) => {
                print!("{token}");
                let _ = io::stdout().flush();
            }
            AgentEvent::TextComplete(_) => println!(),
            AgentEvent::ToolUseStarted { tool_use, .. } => {
                eprintln!("\n[tool] {} ...", tool_use.tool);
            }
            AgentEvent::ToolDeclined { message, .. } => eprintln!("[tool] declined: {message}"),
            AgentEvent::ToolFinished { tool_name, is_error, .. } => {
                let status = if is_error { "error" } else { "ok" };
                eprintln!("[tool] {tool_name} finished ({status})");
            }
            AgentEvent::Interrupted => eprintln!("[agentcore] interrupted"),
            AgentEvent::Error(e) => eprintln!("[agentcore] error: {e}"),
            AgentEvent::ThinkingDelta(_) | AgentEvent::ToolPending { .. } | AgentEvent::TokenUsage { .. } | AgentEvent::TurnComplete => {}
        }
    }
}

/// The CLI's `tool.confirm` hook body: a blocking terminal prompt. Wrapped
/// in `block_in_place` so the blocking stdin read doesn't stall the other
/// tasks on this worker thread (§5 "CLI confirmation"), the same primitive
/// `agentcore-server`'s rendezvous uses for its own blocking wrapper.
fn cli_confirm(tool_use: &ToolUse, _preview: Option<&str>) -> Option<ConfirmationResult> {
    let tool = tool_use.tool.clone();
    let content = tool_use.content.clone();
    tokio::task::block_in_place(move || {
        println!("\n--- confirm `{tool}` ---\n{content}\n--- run this? [y/N] ---");
        let _ = io::stdout().flush();
        let mut line = String::new();
        if io::stdin().read_line(&mut line).is_err() {
            return Some(ConfirmationResult::skip("failed to read confirmation from terminal"));
        }
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => Some(ConfirmationResult::confirm()),
            _ => Some(ConfirmationResult::skip("declined by user")),
        }
    })
}

/// `serve` (§4.4, §4.7): hosts the confirm/elicit/events endpoints.
/// Conversation creation and step-triggering are out of scope (§6); `prompt`
/// optionally drives one demo conversation through the same server-mode
/// rendezvous a real client would use, so the endpoints have something to
/// resolve while the process runs.
async fn serve(config_path: Option<&Path>, bind_override: Option<String>, prompt: Option<String>) -> anyhow::Result<()> {
    let mut config = agentcore_config::load(config_path)?;
    if let Some(bind) = bind_override {
        config.server.bind_addr = bind;
    }

    let rendezvous = Arc::new(agentcore_server::Rendezvous::new(Duration::from_secs(config.server.rendezvous_timeout_secs)));
    let router = agentcore_server::build_router(rendezvous.clone());

    let listener = tokio::net::TcpListener::bind(config.server.bind_addr.as_str())
        .await
        .with_context(|| format!("binding {}", config.server.bind_addr))?;
    info!(addr = %config.server.bind_addr, "agentcore serving rendezvous endpoints");

    if let Some(prompt) = prompt {
        let conversation_id = Uuid::new_v4().to_string();
        let (events_tx, events_rx) = mpsc::channel(256);
        tokio::spawn(agentcore_server::bridge_agent_events(conversation_id.clone(), rendezvous.clone(), events_rx));

        let ids = ContextIds { conversation_id, session_id: Uuid::new_v4().to_string() };
        let mode = ConfirmMode { interactive: true, server: true, no_confirm: false };
        let context = Context::new(ids, &config, |_, _| None, agentcore_server::server_confirm_hook(rendezvous.clone()), mode).await;
        agentcore_server::install_elicit_hook(&context, rendezvous.clone());

        let model = agentcore_model::from_config(&config.model)?;
        let max_tokens = config.model.max_tokens.unwrap_or(4096) as usize;
        let runtime = AgentRuntimeContext::new(std::env::current_dir()?);

        let mut agent = Agent::new(context, Arc::from(model), Arc::new(config.agent.clone()), runtime, max_tokens, events_tx)?;
        tokio::spawn(async move {
            if let Err(e) = agent.submit(prompt).await {
                warn!(error = %e, "demo conversation ended with an error");
            }
        });
    }

    axum::serve(listener, router).await.context("running HTTP server")?;
    Ok(())
}

/// Initializes `tracing-subscriber` once from `main` (§4.7): `EnvFilter`
/// defaults to `info`, overridable via `RUST_LOG`; `-v`/`-vv` raise the
/// default when `RUST_LOG` is unset.
fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::registry().with(fmt::layer().with_target(false).with_writer(std::io::stderr)).with(filter).try_init();

    if verbosity > 0 && std::env::var("RUST_LOG").is_ok() {
        warn!("RUST_LOG is set; --verbose is ignored in favor of it");
    }
}
