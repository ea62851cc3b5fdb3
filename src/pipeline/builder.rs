// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Stage graph builder
//!
//! Stages are appended in execution order. Each [`PipelineBuilder::add_stage`]
//! call is checked in a single forward pass against the artifacts produced by
//! earlier stages and either commits the whole stage or changes nothing.

use std::collections::HashSet;

use crate::config::ResolvedConfig;
use crate::errors::{PipeforgeError, PipeforgeResult};
use crate::pipeline::{
    Action, ActionKind, ActionSettings, Artifact, ArtifactGraph, ArtifactStore,
    PipelineDefinition, Stage,
};
use crate::policy::{RoleKind, RoleSet};

/// Minimum number of stages the orchestration service accepts
pub const MIN_STAGES: usize = 2;

/// Builder for a [`PipelineDefinition`]
#[derive(Debug)]
pub struct PipelineBuilder {
    name: String,
    description: Option<String>,
    config: ResolvedConfig,
    roles: RoleSet,
    artifact_store: ArtifactStore,
    stages: Vec<Stage>,
    artifacts: Vec<Artifact>,
    /// Artifacts visible to the next stage
    available: HashSet<String>,
    action_names: HashSet<String>,
    project_names: HashSet<String>,
}

impl PipelineBuilder {
    /// Start a pipeline named `<purpose>-<env>`
    pub fn new(purpose: &str, config: ResolvedConfig, roles: RoleSet) -> PipeforgeResult<Self> {
        let name = config.name(purpose)?;

        Ok(Self {
            name,
            description: None,
            config,
            roles,
            artifact_store: ArtifactStore::default(),
            stages: Vec::new(),
            artifacts: Vec::new(),
            available: HashSet::new(),
            action_names: HashSet::new(),
            project_names: HashSet::new(),
        })
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_artifact_store(mut self, store: ArtifactStore) -> Self {
        self.artifact_store = store;
        self
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    /// Whether `artifact` may be consumed by the next stage
    pub fn is_available(&self, artifact: &str) -> bool {
        self.available.contains(artifact)
    }

    /// Append a stage; fails fast without modifying the builder
    pub fn add_stage(&mut self, name: &str, actions: Vec<Action>) -> PipeforgeResult<&mut Self> {
        let stage_id = self.stages.len();

        if name.is_empty() {
            return Err(PipeforgeError::invalid_stage(name, "stage name is empty"));
        }
        if self.stages.iter().any(|s| s.name == name) {
            return Err(PipeforgeError::invalid_stage(name, "stage name is already used"));
        }
        if actions.is_empty() {
            return Err(PipeforgeError::invalid_stage(name, "stage has no actions"));
        }

        let mut stage_actions = HashSet::new();
        let mut stage_projects = HashSet::new();
        let mut stage_outputs: HashSet<&str> = HashSet::new();

        for action in &actions {
            if action.name.is_empty() {
                return Err(PipeforgeError::invalid_action("", "action name is empty"));
            }
            if self.action_names.contains(&action.name) || !stage_actions.insert(action.name.as_str()) {
                return Err(PipeforgeError::invalid_action(
                    &action.name,
                    "action name is already used in this pipeline",
                ));
            }

            self.check_placement(name, stage_id, action)?;
            self.check_role(action)?;

            if let ActionSettings::Build(build) = &action.settings {
                if self.project_names.contains(&build.project_name)
                    || !stage_projects.insert(build.project_name.as_str())
                {
                    return Err(PipeforgeError::invalid_action(
                        &action.name,
                        format!("build project '{}' is already used", build.project_name),
                    ));
                }
            }

            if action.kind() == ActionKind::Source && !action.inputs.is_empty() {
                return Err(PipeforgeError::invalid_action(
                    &action.name,
                    "source actions take no inputs",
                ));
            }

            // Same-stage outputs are not in `available` yet, so they are rejected here too
            for input in &action.inputs {
                if !self.available.contains(input.artifact()) {
                    return Err(PipeforgeError::artifact_flow(input.artifact(), &action.name));
                }
            }

            self.check_shape(action)?;

            for output in &action.outputs {
                if output.is_empty() {
                    return Err(PipeforgeError::invalid_action(&action.name, "output name is empty"));
                }
                if self.artifacts.iter().any(|a| &a.name == output) || !stage_outputs.insert(output.as_str()) {
                    return Err(PipeforgeError::DuplicateArtifact {
                        artifact: output.clone(),
                        action: action.name.clone(),
                    });
                }
            }
        }

        // Commit
        for action in &actions {
            self.action_names.insert(action.name.clone());
            if let ActionSettings::Build(build) = &action.settings {
                self.project_names.insert(build.project_name.clone());
            }
            for output in &action.outputs {
                let produced_by = match action.kind() {
                    ActionKind::Source => None,
                    _ => Some(stage_id),
                };
                self.artifacts.push(Artifact {
                    name: output.clone(),
                    produced_by,
                    stage: stage_id,
                    action: action.name.clone(),
                });
                self.available.insert(output.clone());
            }
        }

        tracing::debug!(stage = name, actions = actions.len(), "added stage");

        self.stages.push(Stage {
            name: name.to_string(),
            actions,
        });

        Ok(self)
    }

    /// Finish the pipeline
    pub fn build(self) -> PipeforgeResult<PipelineDefinition> {
        if self.stages.len() < MIN_STAGES {
            return Err(PipeforgeError::InvalidPipeline {
                reason: format!(
                    "pipeline '{}' has {} stage(s); at least {} are required",
                    self.name,
                    self.stages.len(),
                    MIN_STAGES
                ),
                help: Some("A pipeline needs a source stage followed by at least one more stage".into()),
            });
        }

        let definition = PipelineDefinition {
            name: self.name,
            description: self.description,
            config: self.config,
            roles: self.roles,
            stages: self.stages,
            artifacts: self.artifacts,
            artifact_store: self.artifact_store,
        };

        // Forward-only flow is guaranteed by add_stage; the graph re-checks it
        ArtifactGraph::build(&definition)?;

        tracing::info!(
            pipeline = definition.name(),
            stages = definition.stages().len(),
            "assembled pipeline"
        );

        Ok(definition)
    }

    /// Source actions live in the first stage, and only there
    fn check_placement(&self, stage: &str, stage_id: usize, action: &Action) -> PipeforgeResult<()> {
        let is_source = action.kind() == ActionKind::Source;

        if stage_id == 0 && !is_source {
            return Err(PipeforgeError::invalid_stage(
                stage,
                format!("the first stage may only contain source actions, found '{}'", action.name),
            ));
        }
        if stage_id > 0 && is_source {
            return Err(PipeforgeError::invalid_stage(
                stage,
                format!("source action '{}' must be in the first stage", action.name),
            ));
        }

        Ok(())
    }

    fn check_shape(&self, action: &Action) -> PipeforgeResult<()> {
        match &action.settings {
            ActionSettings::Source(source) => {
                if action.outputs.is_empty() {
                    return Err(PipeforgeError::invalid_action(
                        &action.name,
                        "source actions must produce an artifact",
                    ));
                }
                if source.owner.is_empty() || source.repo.is_empty() || source.branch.is_empty() {
                    return Err(PipeforgeError::invalid_action(
                        &action.name,
                        "owner, repo and branch are required",
                    ));
                }
            }
            ActionSettings::Build(build) => {
                if action.inputs.is_empty() {
                    return Err(PipeforgeError::invalid_action(
                        &action.name,
                        "build actions need at least one input artifact",
                    ));
                }
                if build.project_name.is_empty() || build.build_spec.is_empty() {
                    return Err(PipeforgeError::invalid_action(
                        &action.name,
                        "build project name and build spec are required",
                    ));
                }
            }
            ActionSettings::Deploy(deploy) => {
                if action.inputs.len() != 1 {
                    return Err(PipeforgeError::invalid_action(
                        &action.name,
                        format!(
                            "deploy actions consume exactly one template input, found {}",
                            action.inputs.len()
                        ),
                    ));
                }
                if action.inputs[0].path().is_none() {
                    return Err(PipeforgeError::invalid_action(
                        &action.name,
                        format!(
                            "template input '{}' needs a file path, e.g. '{}::template.yaml'",
                            action.inputs[0],
                            action.inputs[0].artifact()
                        ),
                    ));
                }
                if deploy.stack_name.is_empty() || deploy.change_set_name.is_empty() {
                    return Err(PipeforgeError::invalid_action(
                        &action.name,
                        "stack name and change set name are required",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Deploy credentials stay with deploy actions
    fn check_role(&self, action: &Action) -> PipeforgeResult<()> {
        let role_id = self.roles.get(action.role).id();

        match (action.kind(), action.role) {
            (ActionKind::Deploy, RoleKind::Deploy) => Ok(()),
            (ActionKind::Deploy, _) => Err(PipeforgeError::policy(
                role_id,
                format!("deploy action '{}' must run under the deploy role", action.name),
            )),
            (_, RoleKind::Deploy) => Err(PipeforgeError::policy(
                role_id,
                format!(
                    "{} action '{}' may not use the deploy role",
                    action.kind(),
                    action.name
                ),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::resolve;
    use crate::pipeline::testing::{build_action, deploy_action, source_action};
    use crate::pipeline::ArtifactRef;
    use crate::policy::bind_roles;

    fn builder() -> PipelineBuilder {
        let config = resolve("staging", None).unwrap();
        let roles = bind_roles(&config).unwrap();
        PipelineBuilder::new("meal-planner-api", config, roles).unwrap()
    }

    #[test]
    fn test_four_stage_pipeline() {
        let mut b = builder();
        b.add_stage("Source", vec![source_action("Source_GitHub", "source")])
            .unwrap()
            .add_stage("TestInfra", vec![build_action("pipeline_build", "infra", "source", None)])
            .unwrap()
            .add_stage(
                "PackageApplication",
                vec![build_action("package_SAM", "package", "source", Some("package"))],
            )
            .unwrap()
            .add_stage(
                "DeploySamChangeSet",
                vec![deploy_action("deploy_SAM_changeset", "package::packaged-template.yaml")],
            )
            .unwrap();

        let def = b.build().unwrap();
        assert_eq!(def.name(), "meal-planner-api-staging");
        assert_eq!(
            def.stage_names(),
            vec!["Source", "TestInfra", "PackageApplication", "DeploySamChangeSet"]
        );

        let source = def.artifact("source").unwrap();
        assert!(source.is_source());
        assert_eq!(source.stage, 0);
        assert_eq!(def.artifact("package").unwrap().produced_by, Some(2));
    }

    #[test]
    fn test_missing_template_artifact_fails() {
        let mut b = builder();
        b.add_stage("Source", vec![source_action("src", "source")]).unwrap();
        let err = b
            .add_stage(
                "Deploy",
                vec![deploy_action("deploy", "packaged-template.yaml::template.yaml")],
            )
            .unwrap_err();

        assert!(matches!(err, PipeforgeError::ArtifactFlow { .. }));
        assert!(err.to_string().contains("packaged-template.yaml"));
        assert!(err.to_string().contains("deploy"));
    }

    #[test]
    fn test_same_stage_reference_rejected() {
        let mut b = builder();
        b.add_stage("Source", vec![source_action("src", "source")]).unwrap();
        let err = b
            .add_stage(
                "Build",
                vec![
                    build_action("package", "package", "source", Some("package")),
                    build_action("lint", "lint", "package", None),
                ],
            )
            .unwrap_err();

        match err {
            PipeforgeError::ArtifactFlow { artifact, action } => {
                assert_eq!(artifact, "package");
                assert_eq!(action, "lint");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_forward_reference_rejected() {
        let mut b = builder();
        b.add_stage("Source", vec![source_action("src", "source")]).unwrap();
        assert!(b
            .add_stage("Test", vec![build_action("test", "test", "package", None)])
            .is_err());
        // Nothing from the failed stage was committed
        assert!(!b.is_available("package"));
        b.add_stage("Test", vec![build_action("test", "test", "source", None)])
            .unwrap();
    }

    #[test]
    fn test_duplicate_stage_name_rejected() {
        let mut b = builder();
        b.add_stage("Source", vec![source_action("src", "source")]).unwrap();
        b.add_stage("Build", vec![build_action("a", "a", "source", None)]).unwrap();
        let err = b
            .add_stage("Build", vec![build_action("b", "b", "source", None)])
            .unwrap_err();
        assert!(matches!(err, PipeforgeError::InvalidStage { .. }));
    }

    #[test]
    fn test_empty_stage_rejected() {
        let mut b = builder();
        let err = b.add_stage("Source", vec![]).unwrap_err();
        assert!(matches!(err, PipeforgeError::InvalidStage { .. }));
    }

    #[test]
    fn test_duplicate_output_rejected() {
        let mut b = builder();
        b.add_stage("Source", vec![source_action("src", "source")]).unwrap();
        let err = b
            .add_stage("Build", vec![build_action("b", "b", "source", Some("source"))])
            .unwrap_err();
        assert!(matches!(err, PipeforgeError::DuplicateArtifact { .. }));
    }

    #[test]
    fn test_deploy_under_build_role_rejected() {
        let mut b = builder();
        b.add_stage("Source", vec![source_action("src", "source")]).unwrap();
        b.add_stage("Package", vec![build_action("pkg", "pkg", "source", Some("package"))])
            .unwrap();

        let deploy = deploy_action("deploy", "package::packaged-template.yaml").with_role(RoleKind::Build);
        let err = b.add_stage("Deploy", vec![deploy]).unwrap_err();
        assert!(matches!(err, PipeforgeError::Policy { .. }));
    }

    #[test]
    fn test_build_under_deploy_role_rejected() {
        let mut b = builder();
        b.add_stage("Source", vec![source_action("src", "source")]).unwrap();
        let build = build_action("b", "b", "source", None).with_role(RoleKind::Deploy);
        let err = b.add_stage("Build", vec![build]).unwrap_err();
        assert!(matches!(err, PipeforgeError::Policy { .. }));
    }

    #[test]
    fn test_source_action_shape() {
        let mut b = builder();
        let with_input = source_action("src", "source").with_input(ArtifactRef::new("x"));
        assert!(matches!(
            b.add_stage("Source", vec![with_input]),
            Err(PipeforgeError::InvalidAction { .. })
        ));
    }

    #[test]
    fn test_deploy_needs_one_template_path() {
        let mut b = builder();
        b.add_stage("Source", vec![source_action("src", "source")]).unwrap();
        b.add_stage("Package", vec![build_action("pkg", "pkg", "source", Some("package"))])
            .unwrap();

        let no_path = deploy_action("deploy", "package");
        assert!(matches!(
            b.add_stage("Deploy", vec![no_path]),
            Err(PipeforgeError::InvalidAction { .. })
        ));

        let two_inputs = deploy_action("deploy", "package::t.yaml").with_input(ArtifactRef::new("source"));
        assert!(matches!(
            b.add_stage("Deploy", vec![two_inputs]),
            Err(PipeforgeError::InvalidAction { .. })
        ));
    }

    #[test]
    fn test_source_only_in_first_stage() {
        let mut b = builder();
        assert!(b
            .add_stage("Build", vec![build_action("b", "b", "source", None)])
            .is_err());

        b.add_stage("Source", vec![source_action("src", "source")]).unwrap();
        let err = b
            .add_stage("Source2", vec![source_action("src2", "other")])
            .unwrap_err();
        assert!(matches!(err, PipeforgeError::InvalidStage { .. }));
    }

    #[test]
    fn test_single_stage_pipeline_rejected() {
        let mut b = builder();
        b.add_stage("Source", vec![source_action("src", "source")]).unwrap();
        assert!(matches!(b.build(), Err(PipeforgeError::InvalidPipeline { .. })));
    }

    #[test]
    fn test_duplicate_action_and_project_names_rejected() {
        let mut b = builder();
        b.add_stage("Source", vec![source_action("src", "source")]).unwrap();
        b.add_stage("A", vec![build_action("b", "proj", "source", None)]).unwrap();

        assert!(matches!(
            b.add_stage("B", vec![build_action("b", "other", "source", None)]),
            Err(PipeforgeError::InvalidAction { .. })
        ));
        assert!(matches!(
            b.add_stage("B", vec![build_action("c", "proj", "source", None)]),
            Err(PipeforgeError::InvalidAction { .. })
        ));
    }
}
