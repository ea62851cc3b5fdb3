// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Pipeline manifest
//!
//! Defines the schema for `.pipeforge.yaml`. Names in a manifest are
//! environment-neutral; [`ManifestAction::to_action`] scopes them to the
//! resolved environment with the shared naming template.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::ResolvedConfig;
use crate::errors::{PipeforgeError, PipeforgeResult};
use crate::pipeline::{
    Action, ActionSettings, ArtifactRef, ArtifactStore, BuildSettings, ConnectorKind, DeployMode,
    DeploySettings, SourceSettings, DEFAULT_BUILD_IMAGE, DEFAULT_BUILD_SPEC,
};
use crate::policy::RoleKind;

/// Default manifest file name
pub const DEFAULT_MANIFEST: &str = ".pipeforge.yaml";

/// Build environment variable carrying the environment name
pub const ENV_VARIABLE: &str = "ENV";

/// Pipeline description from `.pipeforge.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineManifest {
    /// Manifest version (for future compatibility)
    #[serde(default = "default_version")]
    pub version: String,

    /// Pipeline purpose; the pipeline is named `<name>-<env>`
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub artifact_store: ArtifactStore,

    /// Stages in execution order
    pub stages: Vec<ManifestStage>,
}

fn default_version() -> String {
    "1".to_string()
}

impl PipelineManifest {
    /// Load a manifest; the format follows the file extension (YAML by default)
    pub fn from_file(path: &Path) -> PipeforgeResult<Self> {
        if !path.exists() {
            return Err(PipeforgeError::ManifestNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| PipeforgeError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_yaml(&content),
        }
    }

    pub fn from_yaml(yaml: &str) -> PipeforgeResult<Self> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    pub fn from_json(json: &str) -> PipeforgeResult<Self> {
        serde_json::from_str(json).map_err(Into::into)
    }

    pub fn from_toml(content: &str) -> PipeforgeResult<Self> {
        toml::from_str(content).map_err(Into::into)
    }

    pub fn to_yaml(&self) -> PipeforgeResult<String> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Get all stage names
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }
}

/// A stage as written in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestStage {
    pub name: String,
    pub actions: Vec<ManifestAction>,
}

/// An action as written in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestAction {
    pub name: String,

    #[serde(flatten)]
    pub kind: ManifestActionKind,

    #[serde(default)]
    pub inputs: Vec<ArtifactRef>,

    #[serde(default)]
    pub outputs: Vec<String>,

    /// Overrides the role implied by the action type
    #[serde(default)]
    pub role: Option<RoleKind>,

    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// Kind-specific manifest fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ManifestActionKind {
    Source {
        owner: String,
        repo: String,
        connector: ManifestConnector,
    },
    Build {
        /// Project purpose; the project is named `<project>-<env>`
        project: String,
        #[serde(default)]
        build_spec: Option<String>,
        #[serde(default)]
        image: Option<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
    Deploy {
        /// Stack purpose; the stack is named `<stack>-<env>`
        stack: String,
        /// Change set purpose; defaults to `<stack>-changeset`
        #[serde(default)]
        change_set: Option<String>,
        #[serde(default)]
        mode: DeployMode,
        #[serde(default = "default_capabilities")]
        capabilities: Vec<String>,
    },
}

fn default_capabilities() -> Vec<String> {
    vec!["CAPABILITY_IAM".into(), "CAPABILITY_AUTO_EXPAND".into()]
}

/// Source connector as written in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ManifestConnector {
    /// Connection purpose; the connection is named `<name>-<env>`
    Connection { name: String },
    /// Secrets Manager secret holding an OAuth token
    Token { secret_id: String },
}

impl ManifestAction {
    /// Scope this action to the resolved environment
    pub fn to_action(&self, config: &ResolvedConfig) -> PipeforgeResult<Action> {
        let settings = match &self.kind {
            ManifestActionKind::Source {
                owner,
                repo,
                connector,
            } => ActionSettings::Source(SourceSettings {
                owner: owner.clone(),
                repo: repo.clone(),
                branch: config.branch.clone(),
                connector: match connector {
                    ManifestConnector::Connection { name } => ConnectorKind::Connection {
                        name: config.name(name)?,
                    },
                    ManifestConnector::Token { secret_id } => ConnectorKind::Token {
                        secret_id: secret_id.clone(),
                    },
                },
            }),
            ManifestActionKind::Build {
                project,
                build_spec,
                image,
                env,
            } => {
                let mut env = env.clone();
                env.insert(ENV_VARIABLE.to_string(), config.env.clone());

                ActionSettings::Build(BuildSettings {
                    project_name: config.name(project)?,
                    build_spec: build_spec.clone().unwrap_or_else(|| DEFAULT_BUILD_SPEC.to_string()),
                    image: image.clone().unwrap_or_else(|| DEFAULT_BUILD_IMAGE.to_string()),
                    env,
                })
            }
            ManifestActionKind::Deploy {
                stack,
                change_set,
                mode,
                capabilities,
            } => {
                let change_set = match change_set {
                    Some(change_set) => config.name(change_set)?,
                    None => config.name(&format!("{}-changeset", stack))?,
                };

                ActionSettings::Deploy(DeploySettings {
                    stack_name: config.name(stack)?,
                    change_set_name: change_set,
                    mode: *mode,
                    capabilities: capabilities.clone(),
                })
            }
        };

        let mut action = Action::new(&self.name, settings);
        action.inputs = self.inputs.clone();
        action.outputs = self.outputs.clone();
        action.params = self.params.clone();
        if let Some(role) = self.role {
            action.role = role;
        }

        Ok(action)
    }
}
