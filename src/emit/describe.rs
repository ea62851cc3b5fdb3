// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Human-readable pipeline summary

use crate::pipeline::{ActionSettings, PipelineDefinition};

/// Summarize a pipeline, listing its stages in execution order
pub fn describe(definition: &PipelineDefinition) -> String {
    let mut out = String::new();
    let config = definition.config();

    out.push_str(&format!("Pipeline: {}\n", definition.name()));
    out.push_str(&format!("Environment: {} (branch {})\n", config.env, config.branch));
    if let Some(description) = definition.description() {
        out.push_str(&format!("Description: {}\n", description));
    }
    out.push_str(&format!(
        "Artifact store: {} (versioning {})\n",
        definition.artifact_store().logical_id,
        if definition.artifact_store().versioned { "enabled" } else { "disabled" }
    ));

    out.push_str("\nStages:\n");
    for (idx, stage) in definition.stages().iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", idx + 1, stage.name));

        for action in &stage.actions {
            let detail = match &action.settings {
                ActionSettings::Source(s) => format!("{}/{}@{}", s.owner, s.repo, s.branch),
                ActionSettings::Build(b) => b.project_name.clone(),
                ActionSettings::Deploy(d) => format!("{} via {} ({})", d.stack_name, d.change_set_name, d.mode),
            };
            out.push_str(&format!(
                "     - {} [{}, {} role] {}",
                action.name,
                action.kind(),
                action.role,
                detail
            ));
            if !action.inputs.is_empty() {
                let inputs: Vec<String> = action.inputs.iter().map(|i| i.to_string()).collect();
                out.push_str(&format!(" <- {}", inputs.join(", ")));
            }
            if !action.outputs.is_empty() {
                out.push_str(&format!(" -> {}", action.outputs.join(", ")));
            }
            out.push('\n');
        }
    }

    out.push_str("\nRoles:\n");
    for (kind, binding) in definition.roles().iter() {
        let principals: Vec<String> = binding
            .principals()
            .iter()
            .map(|p| p.to_string())
            .collect();
        out.push_str(&format!(
            "  - {} ({}): {} action(s), trusted by {}\n",
            binding.id(),
            kind,
            binding.actions().count(),
            principals.join(", ")
        ));
    }

    out
}
