// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Describe command - print a pipeline summary

use colored::Colorize;
use miette::Result;

use super::{assemble_target, report, Target};
use crate::emit::describe;

/// Run the describe command
pub async fn run(target: Target, verbose: bool) -> Result<()> {
    let assembler = assemble_target(&target)?;

    print!("{}", describe(assembler.definition()));

    if verbose {
        let emitted = assembler.emit().map_err(report)?;
        let fingerprint = emitted.spec().fingerprint().map_err(report)?;
        println!();
        println!("{} {}", "Template fingerprint:".dimmed(), fingerprint);
    }

    Ok(())
}
