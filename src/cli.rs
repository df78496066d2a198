// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

/// `agentcore run`'s output destination knobs — where the generated text
/// goes, separate from `RUST_LOG`'s destination for diagnostics.
#[derive(Parser, Debug)]
#[command(
    name = "agentcore",
    about = "Core execution runtime for a tool-using conversational AI agent",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file (overrides the layered YAML search).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace). Overridden by RUST_LOG.
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one turn non-interactively: read a prompt, drive the turn loop
    /// against the configured provider, stream assistant text to stdout.
    Run {
        /// The task/prompt. Read from stdin if omitted.
        prompt: Option<String>,

        /// Autonomous mode: no interactive confirmation prompts, ends the
        /// turn after two consecutive tool-free replies (Scenario E).
        #[arg(long)]
        autonomous: bool,

        /// Auto-confirm every tool call without prompting (equivalent to
        /// `set_auto_confirm(None)`).
        #[arg(long)]
        yes: bool,

        /// Directory tool invocations run against. Defaults to the current
        /// directory.
        #[arg(long, value_name = "DIR")]
        workspace: Option<PathBuf>,

        /// Persist the conversation under this directory instead of running
        /// in-memory only.
        #[arg(long, value_name = "DIR")]
        log_dir: Option<PathBuf>,
    },

    /// Start the HTTP server hosting the confirmation/elicitation
    /// rendezvous endpoints (§4.4). Conversation creation is out of scope
    /// here (§6); `--prompt` drives a single demo conversation through the
    /// server-mode rendezvous so the endpoints have something to resolve.
    Serve {
        /// Overrides `server.bind_addr` from config.
        #[arg(long)]
        bind: Option<String>,

        /// Drive one conversation with this prompt through the
        /// server-mode confirm/elicit rendezvous while the server runs.
        #[arg(long)]
        prompt: Option<String>,
    },

    /// Print the effective configuration and exit.
    ShowConfig,

    /// Generate a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "agentcore", &mut std::io::stdout());
}
