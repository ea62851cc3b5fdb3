// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Pipeline definition structures
//!
//! The validated stage graph produced by [`PipelineBuilder`](super::PipelineBuilder).
//! Nothing in here can be mutated once a [`PipelineDefinition`] exists.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::ResolvedConfig;
use crate::policy::{RoleKind, RoleSet};

/// Index of a stage within its pipeline
pub type StageId = usize;

/// Default CodeBuild image
pub const DEFAULT_BUILD_IMAGE: &str = "aws/codebuild/standard:4.0";

/// Default build spec file name
pub const DEFAULT_BUILD_SPEC: &str = "buildspec.yml";

/// Reference to an artifact, or to a file inside one (`package::packaged-template.yaml`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactRef {
    artifact: String,
    path: Option<String>,
}

impl ArtifactRef {
    pub const SEPARATOR: &'static str = "::";

    pub fn new(artifact: &str) -> Self {
        Self {
            artifact: artifact.to_string(),
            path: None,
        }
    }

    pub fn with_path(artifact: &str, path: &str) -> Self {
        Self {
            artifact: artifact.to_string(),
            path: Some(path.to_string()),
        }
    }

    /// Parse `artifact` or `artifact::path`
    pub fn parse(value: &str) -> Result<Self, String> {
        let (artifact, path) = match value.split_once(Self::SEPARATOR) {
            Some((artifact, path)) => (artifact, Some(path)),
            None => (value, None),
        };

        if artifact.is_empty() {
            return Err(format!("artifact reference '{}' has no artifact name", value));
        }
        if path.is_some_and(str::is_empty) {
            return Err(format!("artifact reference '{}' has an empty path", value));
        }

        Ok(Self {
            artifact: artifact.to_string(),
            path: path.map(String::from),
        })
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

impl TryFrom<String> for ArtifactRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ArtifactRef> for String {
    fn from(value: ArtifactRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}{}{}", self.artifact, Self::SEPARATOR, path),
            None => write!(f, "{}", self.artifact),
        }
    }
}

/// A named output of one action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub name: String,
    /// `None` for initial source artifacts
    pub produced_by: Option<StageId>,
    /// Stage holding the action that declares this artifact
    pub stage: StageId,
    pub action: String,
}

impl Artifact {
    pub fn is_source(&self) -> bool {
        self.produced_by.is_none()
    }
}

/// Kind of work an action performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Source,
    Build,
    Deploy,
}

impl ActionKind {
    /// Role an action of this kind runs under unless told otherwise
    pub fn default_role(&self) -> RoleKind {
        match self {
            Self::Source => RoleKind::Pipeline,
            Self::Build => RoleKind::Build,
            Self::Deploy => RoleKind::Deploy,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Build => write!(f, "build"),
            Self::Deploy => write!(f, "deploy"),
        }
    }
}

/// How the source action reaches the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectorKind {
    /// Managed connection resource (CodeStar connection)
    Connection { name: String },
    /// OAuth token held in Secrets Manager
    Token { secret_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSettings {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub connector: ConnectorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSettings {
    pub project_name: String,
    pub build_spec: String,
    pub image: String,
    pub env: BTreeMap<String, String>,
}

/// Change-set strategy of the deployment engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeployMode {
    /// Create (or replace) a change set for review; never execute it
    #[default]
    CreateChangeSetOnly,
    /// Create the change set, then execute it in the same stage
    CreateAndExecute,
}

impl fmt::Display for DeployMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateChangeSetOnly => write!(f, "create-change-set-only"),
            Self::CreateAndExecute => write!(f, "create-and-execute"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploySettings {
    pub stack_name: String,
    pub change_set_name: String,
    pub mode: DeployMode,
    pub capabilities: Vec<String>,
}

/// Kind-specific configuration of an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ActionSettings {
    Source(SourceSettings),
    Build(BuildSettings),
    Deploy(DeploySettings),
}

/// A single unit of work within a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub name: String,
    pub settings: ActionSettings,
    pub inputs: Vec<ArtifactRef>,
    /// Names of the artifacts this action produces
    pub outputs: Vec<String>,
    pub role: RoleKind,
    /// Source/Deploy: extra action configuration. Build: extra environment variables.
    pub params: BTreeMap<String, String>,
}

impl Action {
    /// Action running under the default role for its kind
    pub fn new(name: &str, settings: ActionSettings) -> Self {
        let mut action = Self {
            name: name.to_string(),
            settings,
            inputs: Vec::new(),
            outputs: Vec::new(),
            role: RoleKind::Pipeline,
            params: BTreeMap::new(),
        };
        action.role = action.kind().default_role();
        action
    }

    /// Source action producing `output`
    pub fn source(name: &str, settings: SourceSettings, output: &str) -> Self {
        Self::new(name, ActionSettings::Source(settings)).with_output(output)
    }

    /// Build action reading `input`
    pub fn build(name: &str, settings: BuildSettings, input: ArtifactRef) -> Self {
        Self::new(name, ActionSettings::Build(settings)).with_input(input)
    }

    /// Deploy action reading its template from `template`
    pub fn deploy(name: &str, settings: DeploySettings, template: ArtifactRef) -> Self {
        Self::new(name, ActionSettings::Deploy(settings)).with_input(template)
    }

    pub fn with_input(mut self, input: ArtifactRef) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_output(mut self, output: &str) -> Self {
        self.outputs.push(output.to_string());
        self
    }

    pub fn with_role(mut self, role: RoleKind) -> Self {
        self.role = role;
        self
    }

    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }

    pub fn kind(&self) -> ActionKind {
        match self.settings {
            ActionSettings::Source(_) => ActionKind::Source,
            ActionSettings::Build(_) => ActionKind::Build,
            ActionSettings::Deploy(_) => ActionKind::Deploy,
        }
    }
}

/// A named, ordered group of actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    pub name: String,
    pub actions: Vec<Action>,
}

/// Bucket holding the pipeline's artifacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactStore {
    /// Logical id of the bucket resource
    #[serde(default = "default_bucket_id")]
    pub logical_id: String,

    #[serde(default)]
    pub versioned: bool,
}

fn default_bucket_id() -> String {
    "ArtifactBucket".to_string()
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self {
            logical_id: default_bucket_id(),
            versioned: false,
        }
    }
}

/// A fully validated pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineDefinition {
    pub(super) name: String,
    pub(super) description: Option<String>,
    pub(super) config: ResolvedConfig,
    pub(super) roles: RoleSet,
    pub(super) stages: Vec<Stage>,
    pub(super) artifacts: Vec<Artifact>,
    pub(super) artifact_store: ArtifactStore,
}

impl PipelineDefinition {
    /// Environment-scoped pipeline name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    /// Role the pipeline itself runs under
    pub fn execution_role(&self) -> RoleKind {
        RoleKind::Pipeline
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn artifact_store(&self) -> &ArtifactStore {
        &self.artifact_store
    }

    /// Get a stage by name
    pub fn get_stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Get all stage names, in execution order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn artifact(&self, name: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.name == name)
    }

    /// All actions with the index of their stage
    pub fn actions(&self) -> impl Iterator<Item = (StageId, &Action)> {
        self.stages
            .iter()
            .enumerate()
            .flat_map(|(idx, stage)| stage.actions.iter().map(move |a| (idx, a)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_artifact_ref() {
        let r = ArtifactRef::parse("package::packaged-template.yaml").unwrap();
        assert_eq!(r.artifact(), "package");
        assert_eq!(r.path(), Some("packaged-template.yaml"));
        assert_eq!(r.to_string(), "package::packaged-template.yaml");

        let plain = ArtifactRef::parse("source").unwrap();
        assert_eq!(plain.path(), None);

        assert!(ArtifactRef::parse("").is_err());
        assert!(ArtifactRef::parse("::x").is_err());
        assert!(ArtifactRef::parse("package::").is_err());
    }

    #[test]
    fn test_artifact_ref_from_yaml() {
        let refs: Vec<ArtifactRef> =
            serde_yaml::from_str("- source\n- package::packaged-template.yaml\n").unwrap();
        assert_eq!(refs[0], ArtifactRef::new("source"));
        assert_eq!(refs[1], ArtifactRef::with_path("package", "packaged-template.yaml"));
    }

    #[test]
    fn test_default_roles() {
        let build = Action::build(
            "b",
            BuildSettings {
                project_name: "p".into(),
                build_spec: DEFAULT_BUILD_SPEC.into(),
                image: DEFAULT_BUILD_IMAGE.into(),
                env: BTreeMap::new(),
            },
            ArtifactRef::new("source"),
        );
        assert_eq!(build.kind(), ActionKind::Build);
        assert_eq!(build.role, RoleKind::Build);
        assert_eq!(ActionKind::Deploy.default_role(), RoleKind::Deploy);
        assert_eq!(ActionKind::Source.default_role(), RoleKind::Pipeline);
    }

    #[test]
    fn test_deploy_mode_serde() {
        let mode: DeployMode = serde_yaml::from_str("create-and-execute").unwrap();
        assert_eq!(mode, DeployMode::CreateAndExecute);
        assert_eq!(DeployMode::default(), DeployMode::CreateChangeSetOnly);
    }
}
