// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Init command - write a starter pipeline manifest

use colored::Colorize;
use miette::Result;
use std::path::Path;

use crate::pipeline::DEFAULT_MANIFEST;
use crate::utils::success_mark;

/// Run the init command
pub async fn run(name: Option<String>, force: bool, verbose: bool) -> Result<()> {
    let pipeline_name = name.unwrap_or_else(|| {
        std::env::current_dir()
            .ok()
            .and_then(|p| p.file_name().map(|s| s.to_string_lossy().to_string()))
            .unwrap_or_else(|| "my-api".to_string())
    });

    println!("{}", "Initializing pipeline manifest...".bold());
    println!();

    if Path::new(DEFAULT_MANIFEST).exists() && !force {
        return Err(miette::miette!(
            "{} already exists. Use --force to overwrite.",
            DEFAULT_MANIFEST
        ));
    }

    let content = generate_manifest(&pipeline_name);

    tokio::fs::write(DEFAULT_MANIFEST, &content)
        .await
        .map_err(|e| miette::miette!("Failed to write {}: {}", DEFAULT_MANIFEST, e))?;

    println!("  {} Created {}", success_mark(), DEFAULT_MANIFEST);

    println!();
    println!("{}", "Manifest initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Set {} and {} in {}", "owner".cyan(), "repo".cyan(), DEFAULT_MANIFEST);
    println!("  2. Run {} to check it", "pipeforge validate --env staging".cyan());
    println!("  3. Run {} to write the template", "pipeforge emit --env staging -o pipeline.json".cyan());
    println!();

    if verbose {
        println!("{}", "Generated manifest:".dimmed());
        println!("{}", "─".repeat(50).dimmed());
        println!("{}", content.dimmed());
    }

    Ok(())
}

/// Source → TestInfra → PackageApplication → DeploySamChangeSet
fn generate_manifest(name: &str) -> String {
    format!(
        r#"# pipeforge pipeline manifest
# Names below are scoped per environment: <name>-<env>

version: "1"
name: "{name}"
description: "Delivery pipeline for {name}"

artifact_store:
  versioned: false

stages:
  - name: Source
    actions:
      - name: Source_GitHub
        type: source
        owner: my-org
        repo: {name}
        connector:
          type: connection
          name: github-connector
        outputs: [source]

  - name: TestInfra
    actions:
      - name: pipeline_build
        type: build
        project: {name}-infra-build
        build_spec: infrastructure/buildspec.yml
        inputs: [source]

  - name: PackageApplication
    actions:
      - name: package_SAM
        type: build
        project: {name}-project
        build_spec: api/buildspec.yml
        inputs: [source]
        outputs: [package]

  - name: DeploySamChangeSet
    actions:
      - name: deploy_SAM_changeset
        type: deploy
        stack: {name}
        # create-change-set-only | create-and-execute
        mode: create-change-set-only
        inputs: ["package::packaged-template.yaml"]
"#
    )
}
