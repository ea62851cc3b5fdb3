// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Pipeline validation
//!
//! Structural rules are enforced by the builder. This pass looks at a finished
//! definition for service limits and for things that are legal but probably
//! not intended.

use std::collections::HashSet;

use crate::pipeline::{ActionKind, ActionSettings, DeployMode, PipelineDefinition};

/// Most stages a single pipeline may hold
pub const MAX_STAGES: usize = 50;

/// Most actions a single stage may hold
pub const MAX_ACTIONS_PER_STAGE: usize = 50;

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate a built pipeline
    pub fn validate(definition: &PipelineDefinition) -> ValidationResult {
        let mut result = ValidationResult::new();

        if definition.stages().len() > MAX_STAGES {
            result.add_error(&format!(
                "Pipeline has {} stages; the limit is {}",
                definition.stages().len(),
                MAX_STAGES
            ));
        }

        for stage in definition.stages() {
            // CreateAndExecute emits two actions per deploy action
            let emitted: usize = stage
                .actions
                .iter()
                .map(|a| match &a.settings {
                    ActionSettings::Deploy(d) if d.mode == DeployMode::CreateAndExecute => 2,
                    _ => 1,
                })
                .sum();
            if emitted > MAX_ACTIONS_PER_STAGE {
                result.add_error(&format!(
                    "Stage '{}' has {} actions; the limit is {}",
                    stage.name, emitted, MAX_ACTIONS_PER_STAGE
                ));
            }
        }

        Self::check_stage_intent(definition, &mut result);
        Self::check_unused_artifacts(definition, &mut result);
        Self::check_deploy_settings(definition, &mut result);

        if !definition.artifact_store().versioned {
            result.add_warning(
                "Artifact store versioning is disabled; earlier artifacts cannot be recovered",
            );
        }

        result
    }

    /// Source first, deploys after all builds
    fn check_stage_intent(definition: &PipelineDefinition, result: &mut ValidationResult) {
        let last_build = definition
            .actions()
            .filter(|(_, a)| a.kind() == ActionKind::Build)
            .map(|(idx, _)| idx)
            .max();

        for (idx, action) in definition.actions() {
            if action.kind() == ActionKind::Deploy {
                if let Some(last_build) = last_build.filter(|b| *b > idx) {
                    result.add_warning(&format!(
                        "Deploy action '{}' runs before build stage '{}'",
                        action.name,
                        definition.stages()[last_build].name
                    ));
                }
            }
        }

        if !definition.actions().any(|(_, a)| a.kind() == ActionKind::Deploy) {
            result.add_warning("Pipeline has no deploy action");
        }
    }

    fn check_unused_artifacts(definition: &PipelineDefinition, result: &mut ValidationResult) {
        let consumed: HashSet<&str> = definition
            .actions()
            .flat_map(|(_, a)| a.inputs.iter().map(|i| i.artifact()))
            .collect();

        for artifact in definition.artifacts() {
            if !consumed.contains(artifact.name.as_str()) {
                result.add_warning(&format!(
                    "Artifact '{}' produced by '{}' is never consumed",
                    artifact.name, artifact.action
                ));
            }
        }
    }

    fn check_deploy_settings(definition: &PipelineDefinition, result: &mut ValidationResult) {
        for (_, action) in definition.actions() {
            if let ActionSettings::Deploy(deploy) = &action.settings {
                if deploy.mode == DeployMode::CreateChangeSetOnly {
                    result.add_warning(&format!(
                        "Deploy action '{}' creates change set '{}' but never executes it",
                        action.name, deploy.change_set_name
                    ));
                }
                if deploy.capabilities.is_empty() {
                    result.add_warning(&format!(
                        "Deploy action '{}' declares no capabilities; stacks creating IAM resources will fail",
                        action.name
                    ));
                }
            }
        }
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
