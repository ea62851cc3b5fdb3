// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Validate command - assemble the pipeline without emitting it

use colored::Colorize;
use miette::Result;

use super::{assemble_target, Target};
use crate::utils::{print_success, print_warning};

/// Run the validate command
pub async fn run(target: Target, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    let assembler = assemble_target(&target)?;
    let definition = assembler.definition();

    print_success(&format!("Manifest {} parsed", target.manifest.display()));
    print_success(&format!(
        "Environment '{}' tracks branch '{}'",
        definition.config().env,
        definition.config().branch
    ));
    print_success(&format!("{} roles bound", definition.roles().iter().count()));
    print_success(&format!(
        "{} stages built; artifact flow is consistent",
        definition.stages().len()
    ));

    if !assembler.warnings().is_empty() {
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in assembler.warnings() {
            print_warning(warning);
        }
    }

    if verbose {
        println!();
        println!("{}:", "Pipeline summary".bold());
        println!("  Name: {}", definition.name());
        for stage in definition.stages() {
            let actions: Vec<String> = stage
                .actions
                .iter()
                .map(|a| format!("{} ({})", a.name, a.kind()))
                .collect();
            println!("    - {} {}", stage.name, format!("[{}]", actions.join(", ")).dimmed());
        }
    }

    println!();
    if assembler.warnings().is_empty() {
        println!("{}", "Pipeline is valid!".green().bold());
    } else {
        println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
    }

    Ok(())
}
