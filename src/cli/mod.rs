// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for pipeforge.

pub mod describe;
pub mod emit;
pub mod graph;
pub mod init;
pub mod validate;
pub mod watch;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use crate::assembler::{Assembler, StagesBuilt};
use crate::errors::PipeforgeError;
use crate::pipeline::{PipelineManifest, DEFAULT_MANIFEST};

/// Delivery pipeline assembler
///
/// Turn a pipeline manifest into a CloudFormation template.
#[derive(Parser, Debug)]
#[clap(
    name = "pipeforge",
    version,
    about = "Assemble CodePipeline delivery pipelines from a declarative manifest",
    long_about = None,
    after_help = "Examples:\n\
        pipeforge init                          Write a starter .pipeforge.yaml\n\
        pipeforge validate --env staging        Check the pipeline for staging\n\
        pipeforge emit --env prod -o out.json   Emit the prod template\n\
        pipeforge graph --env dev -f mermaid    Show artifact flow\n\n\
        See 'pipeforge <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

/// Environment, branch and manifest shared by every assembling command
#[derive(Args, Debug, Clone)]
pub struct Target {
    /// Environment to assemble for (e.g. dev, staging, prod)
    #[clap(short, long)]
    pub env: String,

    /// Branch to track; defaults to 'staging' for staging and 'main' otherwise
    #[clap(long, env = "BRANCH")]
    pub branch: Option<String>,

    /// Pipeline manifest
    #[clap(short, long, default_value = DEFAULT_MANIFEST)]
    pub manifest: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter pipeline manifest
    Init {
        /// Pipeline name (defaults to current directory name)
        name: Option<String>,

        /// Overwrite an existing manifest
        #[clap(long)]
        force: bool,
    },

    /// Validate the pipeline for an environment
    Validate {
        #[clap(flatten)]
        target: Target,
    },

    /// Emit the orchestration template
    Emit {
        #[clap(flatten)]
        target: Target,

        /// Output format
        #[clap(short, long, value_enum, default_value = "json")]
        format: EmitFormat,

        /// Output file (default: stdout)
        #[clap(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarize the assembled pipeline
    Describe {
        #[clap(flatten)]
        target: Target,
    },

    /// Show artifact flow between stages
    Graph {
        #[clap(flatten)]
        target: Target,

        /// Output format
        #[clap(short, long, value_enum, default_value = "text")]
        format: GraphFormat,
    },

    /// Watch mode - re-assemble on manifest changes
    Watch {
        #[clap(flatten)]
        target: Target,

        /// Debounce delay in milliseconds
        #[clap(long, default_value = "500")]
        debounce: u64,
    },
}

/// Template output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmitFormat {
    Json,
    Yaml,
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

/// Load the manifest and run assembly up to a built definition
pub(crate) fn assemble_target(target: &Target) -> miette::Result<Assembler<StagesBuilt>> {
    let manifest = PipelineManifest::from_file(&target.manifest).map_err(report)?;

    Assembler::new(manifest)
        .configure(&target.env, target.branch.as_deref())
        .and_then(|a| a.bind_roles())
        .and_then(|a| a.build_stages())
        .map_err(report)
}

/// Print recovery steps, then hand the error to miette for rendering
pub(crate) fn report(err: PipeforgeError) -> miette::Report {
    if let Some(recovery) = err.recovery() {
        eprintln!("{}", recovery.to_string().cyan());
    }
    err.into()
}
