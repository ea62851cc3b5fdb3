// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Emit command - write the orchestration template

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::{assemble_target, report, EmitFormat, Target};
use crate::errors::PipeforgeError;
use crate::utils::success_mark;

/// Run the emit command
pub async fn run(
    target: Target,
    format: EmitFormat,
    output: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let emitted = assemble_target(&target)?.emit().map_err(report)?;
    let spec = emitted.spec();

    let rendered = match format {
        EmitFormat::Json => spec.to_json(),
        EmitFormat::Yaml => spec.to_yaml(),
    }
    .map_err(report)?;

    match output {
        Some(path) => {
            tokio::fs::write(&path, rendered.as_bytes())
                .await
                .map_err(|e| {
                    report(PipeforgeError::FileWriteError {
                        path: path.clone(),
                        error: e.to_string(),
                    })
                })?;

            eprintln!(
                "  {} Wrote {} ({} resources)",
                success_mark(),
                path.display(),
                spec.resources.len()
            );
            if verbose {
                let fingerprint = spec.fingerprint().map_err(report)?;
                eprintln!("  {} {}", "Fingerprint:".dimmed(), fingerprint);
            }
        }
        None => {
            // Template goes to stdout alone so it can be piped
            print!("{}", rendered);
            if !rendered.ends_with('\n') {
                println!();
            }
        }
    }

    for warning in emitted.warnings() {
        tracing::warn!("{}", warning);
    }

    Ok(())
}
