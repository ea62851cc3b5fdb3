// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Assembly facade
//!
//! Runs the four assembly steps over a [`PipelineManifest`]:
//! configuration, role binding, stage building and emission. Each step is a
//! method that consumes the assembler and returns it in the next state, so a
//! step can neither be skipped nor repeated.
//!
//! ```no_run
//! use pipeforge::assembler::Assembler;
//! use pipeforge::pipeline::PipelineManifest;
//! # fn main() -> pipeforge::PipeforgeResult<()> {
//! let manifest = PipelineManifest::from_file(".pipeforge.yaml".as_ref())?;
//! let emitted = Assembler::new(manifest)
//!     .configure("staging", None)?
//!     .bind_roles()?
//!     .build_stages()?
//!     .emit()?;
//! println!("{}", emitted.spec().to_json()?);
//! # Ok(())
//! # }
//! ```

use std::fmt;

use crate::config::{self, ResolvedConfig};
use crate::emit::{self, OrchestrationSpec};
use crate::errors::{PipeforgeError, PipeforgeResult};
use crate::pipeline::{
    PipelineBuilder, PipelineDefinition, PipelineManifest, PipelineValidator, ValidationResult,
};
use crate::policy::{self, RoleSet};

/// Where an assembly currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    Unconfigured,
    Configured,
    RolesBound,
    StagesBuilt,
    Emitted,
}

impl fmt::Display for AssemblyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unconfigured => write!(f, "unconfigured"),
            Self::Configured => write!(f, "configured"),
            Self::RolesBound => write!(f, "roles bound"),
            Self::StagesBuilt => write!(f, "stages built"),
            Self::Emitted => write!(f, "emitted"),
        }
    }
}

/// Marker trait for the assembler's states
pub trait State {
    const STATE: AssemblyState;
}

#[derive(Debug)]
pub struct Unconfigured;

#[derive(Debug)]
pub struct Configured {
    config: ResolvedConfig,
}

#[derive(Debug)]
pub struct RolesBound {
    config: ResolvedConfig,
    roles: RoleSet,
}

#[derive(Debug)]
pub struct StagesBuilt {
    definition: PipelineDefinition,
    validation: ValidationResult,
}

#[derive(Debug)]
pub struct Emitted {
    definition: PipelineDefinition,
    validation: ValidationResult,
    spec: OrchestrationSpec,
}

impl State for Unconfigured {
    const STATE: AssemblyState = AssemblyState::Unconfigured;
}
impl State for Configured {
    const STATE: AssemblyState = AssemblyState::Configured;
}
impl State for RolesBound {
    const STATE: AssemblyState = AssemblyState::RolesBound;
}
impl State for StagesBuilt {
    const STATE: AssemblyState = AssemblyState::StagesBuilt;
}
impl State for Emitted {
    const STATE: AssemblyState = AssemblyState::Emitted;
}

/// Linear pipeline assembly over a manifest
#[derive(Debug)]
pub struct Assembler<S: State> {
    manifest: PipelineManifest,
    state: S,
}

impl<S: State> Assembler<S> {
    pub fn state(&self) -> AssemblyState {
        S::STATE
    }

    pub fn manifest(&self) -> &PipelineManifest {
        &self.manifest
    }
}

impl Assembler<Unconfigured> {
    pub fn new(manifest: PipelineManifest) -> Self {
        Self {
            manifest,
            state: Unconfigured,
        }
    }

    /// Resolve the environment and branch
    pub fn configure(
        self,
        env_name: &str,
        branch_override: Option<&str>,
    ) -> PipeforgeResult<Assembler<Configured>> {
        let config = config::resolve(env_name, branch_override)?;
        Ok(Assembler {
            manifest: self.manifest,
            state: Configured { config },
        })
    }
}

impl Assembler<Configured> {
    pub fn config(&self) -> &ResolvedConfig {
        &self.state.config
    }

    /// Bind the build, deploy and pipeline roles
    pub fn bind_roles(self) -> PipeforgeResult<Assembler<RolesBound>> {
        let roles = policy::bind_roles(&self.state.config)?;
        tracing::debug!(env = %self.state.config.env, "bound roles");
        Ok(Assembler {
            manifest: self.manifest,
            state: RolesBound {
                config: self.state.config,
                roles,
            },
        })
    }
}

impl Assembler<RolesBound> {
    pub fn roles(&self) -> &RoleSet {
        &self.state.roles
    }

    /// Add every manifest stage and build the definition
    ///
    /// Fails on the first structural error, or if the finished pipeline
    /// breaks a service limit.
    pub fn build_stages(self) -> PipeforgeResult<Assembler<StagesBuilt>> {
        let RolesBound { config, roles } = self.state;

        let mut builder = PipelineBuilder::new(&self.manifest.name, config, roles)?
            .with_artifact_store(self.manifest.artifact_store.clone());
        if let Some(description) = &self.manifest.description {
            builder = builder.with_description(description);
        }

        for stage in &self.manifest.stages {
            let actions = stage
                .actions
                .iter()
                .map(|a| a.to_action(builder.config()))
                .collect::<PipeforgeResult<Vec<_>>>()?;
            builder.add_stage(&stage.name, actions)?;
        }

        let definition = builder.build()?;
        let validation = PipelineValidator::validate(&definition);
        if !validation.is_valid() {
            return Err(PipeforgeError::InvalidPipeline {
                reason: validation.errors.join("; "),
                help: Some("Split the pipeline or move actions into fewer stages".into()),
            });
        }
        for warning in &validation.warnings {
            tracing::debug!(pipeline = definition.name(), "{}", warning);
        }

        Ok(Assembler {
            manifest: self.manifest,
            state: StagesBuilt {
                definition,
                validation,
            },
        })
    }
}

impl Assembler<StagesBuilt> {
    pub fn definition(&self) -> &PipelineDefinition {
        &self.state.definition
    }

    /// Non-fatal findings about the built pipeline
    pub fn warnings(&self) -> &[String] {
        &self.state.validation.warnings
    }

    /// Serialize the definition
    pub fn emit(self) -> PipeforgeResult<Assembler<Emitted>> {
        let spec = emit::emit(&self.state.definition)?;
        Ok(Assembler {
            manifest: self.manifest,
            state: Emitted {
                definition: self.state.definition,
                validation: self.state.validation,
                spec,
            },
        })
    }

    pub fn into_definition(self) -> PipelineDefinition {
        self.state.definition
    }
}

impl Assembler<Emitted> {
    pub fn definition(&self) -> &PipelineDefinition {
        &self.state.definition
    }

    pub fn warnings(&self) -> &[String] {
        &self.state.validation.warnings
    }

    pub fn spec(&self) -> &OrchestrationSpec {
        &self.state.spec
    }

    pub fn into_parts(self) -> (PipelineDefinition, OrchestrationSpec) {
        (self.state.definition, self.state.spec)
    }
}

/// Run every step at once
pub fn assemble(
    manifest: PipelineManifest,
    env_name: &str,
    branch_override: Option<&str>,
) -> PipeforgeResult<(PipelineDefinition, OrchestrationSpec)> {
    Ok(Assembler::new(manifest)
        .configure(env_name, branch_override)?
        .bind_roles()?
        .build_stages()?
        .emit()?
        .into_parts())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::describe;

    const MANIFEST: &str = r#"
name: meal-planner-api
stages:
  - name: Source
    actions:
      - name: Source_GitHub
        type: source
        owner: AdrianP873
        repo: meal-planner-platform
        connector:
          type: connection
          name: github-connector
        outputs: [source]
  - name: TestInfra
    actions:
      - name: pipeline_build
        type: build
        project: meal-planner-infra-build
        build_spec: infra/buildspec.yml
        inputs: [source]
  - name: PackageApplication
    actions:
      - name: package_SAM
        type: build
        project: meal-planner-api-project
        build_spec: api/buildspec.yml
        inputs: [source]
        outputs: [package]
  - name: DeploySamChangeSet
    actions:
      - name: deploy_SAM_changeset
        type: deploy
        stack: meal-planner-api
        inputs: ["package::packaged-template.yaml"]
"#;

    fn manifest() -> PipelineManifest {
        PipelineManifest::from_yaml(MANIFEST).unwrap()
    }

    #[test]
    fn test_states_advance_in_order() {
        let assembler = Assembler::new(manifest());
        assert_eq!(assembler.state(), AssemblyState::Unconfigured);

        let configured = assembler.configure("staging", None).unwrap();
        assert_eq!(configured.state(), AssemblyState::Configured);
        assert_eq!(configured.config().branch, "staging");

        let bound = configured.bind_roles().unwrap();
        assert_eq!(bound.state(), AssemblyState::RolesBound);
        assert_eq!(bound.roles().deploy().id(), "deploy-role-staging");

        let built = bound.build_stages().unwrap();
        assert_eq!(built.state(), AssemblyState::StagesBuilt);

        let emitted = built.emit().unwrap();
        assert_eq!(emitted.state(), AssemblyState::Emitted);
        assert!(emitted.spec().resource("Pipeline").is_some());
    }

    #[test]
    fn test_staging_scenario() {
        let (definition, spec) = assemble(manifest(), "staging", None).unwrap();

        assert_eq!(definition.name(), "meal-planner-api-staging");
        assert_eq!(
            definition.stage_names(),
            vec!["Source", "TestInfra", "PackageApplication", "DeploySamChangeSet"]
        );
        assert!(spec.resource("GithubConnectorStaging").is_some());

        let deploy = &spec.resource("Pipeline").unwrap().properties["Stages"][3]["Actions"][0];
        assert_eq!(
            deploy["Configuration"]["ChangeSetName"],
            "meal-planner-api-changeset-staging"
        );

        let text = describe(&definition);
        let numbered = text
            .lines()
            .filter(|l| l.trim_start().split_once(". ").is_some_and(|(n, _)| n.parse::<u32>().is_ok()))
            .count();
        assert_eq!(numbered, 4);
    }

    #[test]
    fn test_branch_follows_environment() {
        let (prod, _) = assemble(manifest(), "prod", None).unwrap();
        let (feature, _) = assemble(manifest(), "prod", Some("release/1.2")).unwrap();

        assert_eq!(prod.config().branch, "main");
        assert_eq!(feature.config().branch, "release/1.2");
        assert_eq!(prod.name(), "meal-planner-api-prod");
    }

    #[test]
    fn test_missing_package_artifact_fails() {
        let broken = MANIFEST.replace("        outputs: [package]\n", "");
        let err = assemble(PipelineManifest::from_yaml(&broken).unwrap(), "staging", None)
            .unwrap_err();

        match err {
            PipeforgeError::ArtifactFlow { artifact, action } => {
                assert_eq!(artifact, "package");
                assert_eq!(action, "deploy_SAM_changeset");
            }
            other => panic!("expected artifact flow error, got {:?}", other),
        }
    }

    #[test]
    fn test_template_named_as_artifact_fails() {
        let broken = MANIFEST.replace("\"package::packaged-template.yaml\"", "packaged-template.yaml");
        let err = assemble(PipelineManifest::from_yaml(&broken).unwrap(), "staging", None)
            .unwrap_err();

        assert!(matches!(err, PipeforgeError::ArtifactFlow { .. }));
        assert!(err.to_string().contains("packaged-template.yaml"));
    }

    #[test]
    fn test_invalid_environment_stops_before_roles() {
        let err = Assembler::new(manifest()).configure("bad env", None).unwrap_err();
        assert!(matches!(err, PipeforgeError::Config { .. }));
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let (_, first) = assemble(manifest(), "staging", None).unwrap();
        let (_, second) = assemble(manifest(), "staging", None).unwrap();
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }
}
