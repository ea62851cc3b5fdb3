// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! pipeforge - Delivery Pipeline Assembler

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pipeforge::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pipeforge=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    match cli.command {
        Commands::Init { name, force } => pipeforge::cli::init::run(name, force, cli.verbose).await,
        Commands::Validate { target } => pipeforge::cli::validate::run(target, cli.verbose).await,
        Commands::Emit {
            target,
            format,
            output,
        } => pipeforge::cli::emit::run(target, format, output, cli.verbose).await,
        Commands::Describe { target } => pipeforge::cli::describe::run(target, cli.verbose).await,
        Commands::Graph { target, format } => {
            pipeforge::cli::graph::run(target, format, cli.verbose).await
        }
        Commands::Watch { target, debounce } => {
            pipeforge::cli::watch::run(target, debounce, cli.verbose).await
        }
    }
}
