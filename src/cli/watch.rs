// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Watch command - re-assemble the pipeline when the manifest changes

use colored::Colorize;
use miette::Result;
use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::path::Path;
use std::sync::mpsc::channel;
use std::time::Duration;

use super::Target;
use crate::assembler::Assembler;
use crate::pipeline::PipelineManifest;
use crate::utils::warning_mark;

/// Run the watch command
pub async fn run(target: Target, debounce_ms: u64, verbose: bool) -> Result<()> {
    if !target.manifest.exists() {
        return Err(miette::miette!(
            "Manifest file not found: {}\n\n\
             Run 'pipeforge init' to create one.",
            target.manifest.display()
        ));
    }

    println!("{}", "Starting watch mode...".bold());
    println!(
        "Watching {} (debounce: {}ms)",
        target.manifest.display(),
        debounce_ms
    );
    println!("Press {} to exit.", "Ctrl+C".cyan());
    println!();

    let (tx, rx) = channel();

    let mut debouncer = new_debouncer(Duration::from_millis(debounce_ms), tx)
        .map_err(|e| miette::miette!("Failed to create file watcher: {}", e))?;

    // Editors often replace the file, so watch its directory
    let dir = match target.manifest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    debouncer
        .watcher()
        .watch(dir, RecursiveMode::NonRecursive)
        .map_err(|e| miette::miette!("Failed to start watching: {}", e))?;

    check(&target, verbose);

    let file_name = target.manifest.file_name();

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let relevant = events
                    .iter()
                    .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                    .any(|e| e.path.file_name() == file_name);

                if relevant {
                    println!();
                    println!("{}", "─".repeat(50).dimmed());
                    println!("{}: {}", "Change detected".yellow(), target.manifest.display());
                    println!();
                    check(&target, verbose);
                }
            }
            Ok(Err(e)) => {
                eprintln!("{}: {:?}", "Watch error".red(), e);
            }
            Err(e) => {
                // Channel closed
                eprintln!("{}: {}", "Channel error".red(), e);
                break;
            }
        }
    }

    Ok(())
}

/// Assemble and emit once, reporting the outcome without stopping the watch
fn check(target: &Target, verbose: bool) {
    let start = std::time::Instant::now();

    let result = PipelineManifest::from_file(&target.manifest).and_then(|manifest| {
        Assembler::new(manifest)
            .configure(&target.env, target.branch.as_deref())?
            .bind_roles()?
            .build_stages()?
            .emit()
    });

    match result {
        Ok(emitted) => {
            let elapsed = start.elapsed();
            println!(
                "{} {} ({:.2}s)",
                "Pipeline assembled:".green(),
                emitted.definition().name(),
                elapsed.as_secs_f64()
            );
            for warning in emitted.warnings() {
                println!("  {} {}", warning_mark(), warning);
            }
            if verbose {
                match emitted.spec().fingerprint() {
                    Ok(fingerprint) => println!("  {} {}", "Fingerprint:".dimmed(), fingerprint),
                    Err(e) => eprintln!("  {}: {}", "Fingerprint failed".red(), e),
                }
            }
        }
        Err(e) => {
            eprintln!("{} [{}]: {}", "Assembly failed".red(), e.category(), e);
            if let Some(recovery) = e.recovery() {
                eprintln!("{}", recovery);
            }
        }
    }
}
