// LedgerLens - GPL-3.0-or-later
// This file is part of LedgerLens.
//
// Copyright (C) 2025 Daniel Freiermuth
//
// LedgerLens is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// LedgerLens is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with LedgerLens.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::Context;
use clap::Parser;
use ledgerlens::{handle, Command, EngineConfig, Response};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "ledgerlens")]
#[command(author = "Daniel Freiermuth")]
#[command(version)]
#[command(about = "Score financial filings for anomalies and explain the verdicts", long_about = None)]
struct Args {
    /// `analyze` or `explain`; the request is read from stdin
    #[arg(value_name = "COMMAND", allow_hyphen_values = true)]
    command: Option<String>,

    /// Anything after the command is accepted and ignored
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    extra: Vec<String>,

    /// Engine config file (defaults to the user config directory)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr, stdout carries exactly one JSON document.
    // Set RUST_LOG to override (e.g. RUST_LOG=ledgerlens=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(io::stderr)
        .init();

    tracing::info!(
        "LedgerLens starting up (version {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );

    let args = Args::parse();

    if !args.extra.is_empty() {
        tracing::debug!("Ignoring extra arguments: {:?}", args.extra);
    }

    let Some(command) = args.command else {
        write_response(&Response::no_command())?;
        return Ok(ExitCode::FAILURE);
    };
    let Ok(command) = command.parse::<Command>() else {
        tracing::warn!("Unknown command '{command}'");
        write_response(&Response::unknown_command())?;
        return Ok(ExitCode::SUCCESS);
    };

    let config = EngineConfig::load(args.config.as_deref());

    let mut input = String::new();
    let response = io::stdin().read_to_string(&mut input).map_or_else(
        |e| {
            tracing::error!("Failed to read request: {e}");
            Response::failure(format!("Failed to read request: {e}"))
        },
        |_| handle(command, &input, &config),
    );

    write_response(&response)?;
    Ok(ExitCode::SUCCESS)
}

fn write_response(response: &Response) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, response).context("Failed to serialize response")?;
    writeln!(stdout).context("Failed to write response")?;
    stdout.flush().context("Failed to flush stdout")?;
    Ok(())
}
