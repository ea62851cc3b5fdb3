// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Error types with actionable messages
//!
//! Every assembly step validates at construction time and fails fast with one
//! of the variants below. Nothing here is retried: the assembler performs no
//! I/O, so none of these failures are transient.

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeforge operations
pub type PipeforgeResult<T> = Result<T, PipeforgeError>;

/// Main error type for pipeforge
#[derive(Error, Debug, Diagnostic)]
pub enum PipeforgeError {
    // ─────────────────────────────────────────────────────────────────────────
    // Assembly Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Invalid configuration: {reason}")]
    #[diagnostic(
        code(pipeforge::config),
        help("Environment names may only contain ASCII letters, digits and '-'")
    )]
    Config { reason: String },

    #[error("Unsafe role binding '{role}': {reason}")]
    #[diagnostic(
        code(pipeforge::policy),
        help("Grant service-scoped actions (e.g. 's3:*') to named service principals only")
    )]
    Policy { role: String, reason: String },

    #[error("Action '{action}' consumes artifact '{artifact}' which no earlier stage produces")]
    #[diagnostic(
        code(pipeforge::artifact_flow),
        help("Declare '{artifact}' as an output of an action in a stage before the one using it")
    )]
    ArtifactFlow { artifact: String, action: String },

    #[error("Artifact '{artifact}' is produced more than once (again by action '{action}')")]
    #[diagnostic(
        code(pipeforge::duplicate_artifact),
        help("Every artifact has exactly one producing action; rename one of the outputs")
    )]
    DuplicateArtifact { artifact: String, action: String },

    #[error("Cannot serialize action '{action}': {reason}")]
    #[diagnostic(code(pipeforge::serialization))]
    Serialization { action: String, reason: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Structure Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Stage '{stage}' is invalid: {reason}")]
    #[diagnostic(code(pipeforge::invalid_stage))]
    InvalidStage { stage: String, reason: String },

    #[error("Action '{action}' is invalid: {reason}")]
    #[diagnostic(code(pipeforge::invalid_action))]
    InvalidAction { action: String, reason: String },

    #[error("Invalid pipeline: {reason}")]
    #[diagnostic(code(pipeforge::invalid_pipeline))]
    InvalidPipeline {
        reason: String,
        #[help]
        help: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Manifest / File Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Manifest file not found: {path}")]
    #[diagnostic(
        code(pipeforge::manifest_not_found),
        help("Create a manifest with 'pipeforge init' or write .pipeforge.yaml manually")
    )]
    ManifestNotFound { path: PathBuf },

    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(pipeforge::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(pipeforge::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/Format Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(pipeforge::io_error))]
    Io { message: String },

    #[error("YAML error: {message}")]
    #[diagnostic(code(pipeforge::yaml_error))]
    Yaml { message: String },

    #[error("JSON error: {message}")]
    #[diagnostic(code(pipeforge::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(pipeforge::toml_error))]
    Toml { message: String },
}

impl From<std::io::Error> for PipeforgeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for PipeforgeError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for PipeforgeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for PipeforgeError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl PipeforgeError {
    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config { reason: reason.into() }
    }

    /// Create a policy error for the given role
    pub fn policy(role: &str, reason: impl Into<String>) -> Self {
        Self::Policy {
            role: role.to_string(),
            reason: reason.into(),
        }
    }

    /// Create an artifact flow error naming the missing artifact and the consumer
    pub fn artifact_flow(artifact: &str, action: &str) -> Self {
        Self::ArtifactFlow {
            artifact: artifact.to_string(),
            action: action.to_string(),
        }
    }

    /// Create an invalid action error
    pub fn invalid_action(action: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAction {
            action: action.to_string(),
            reason: reason.into(),
        }
    }

    /// Create an invalid stage error
    pub fn invalid_stage(stage: &str, reason: impl Into<String>) -> Self {
        Self::InvalidStage {
            stage: stage.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a serialization error for an action
    pub fn serialization(action: &str, reason: impl Into<String>) -> Self {
        Self::Serialization {
            action: action.to_string(),
            reason: reason.into(),
        }
    }

    /// Short taxonomy label used in CLI reports
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Policy { .. } => "policy",
            Self::ArtifactFlow { .. } | Self::DuplicateArtifact { .. } => "artifact-flow",
            Self::Serialization { .. } => "serialization",
            Self::InvalidStage { .. } | Self::InvalidAction { .. } | Self::InvalidPipeline { .. } => {
                "structure"
            }
            Self::ManifestNotFound { .. }
            | Self::FileReadError { .. }
            | Self::FileWriteError { .. }
            | Self::Io { .. } => "io",
            Self::Yaml { .. } | Self::Json { .. } | Self::Toml { .. } => "format",
        }
    }

    /// Recovery steps for this error, if there is anything useful to say
    pub fn recovery(&self) -> Option<RecoverySuggestion> {
        match self {
            Self::Config { reason } => Some(RecoverySuggestion::fix_environment_name(reason)),
            Self::Policy { role, reason } => Some(RecoverySuggestion::tighten_role(role, reason)),
            Self::ArtifactFlow { artifact, action } => {
                Some(RecoverySuggestion::declare_artifact(artifact, action))
            }
            Self::ManifestNotFound { .. } => Some(RecoverySuggestion::create_manifest()),
            Self::Yaml { .. } => Some(RecoverySuggestion::fix_yaml_syntax()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_flow_message_names_artifact_and_action() {
        let err = PipeforgeError::artifact_flow("packaged-template.yaml", "deploy_SAM_changeset");
        let msg = err.to_string();
        assert!(msg.contains("packaged-template.yaml"));
        assert!(msg.contains("deploy_SAM_changeset"));
        assert_eq!(err.category(), "artifact-flow");
    }

    #[test]
    fn test_recovery_available_for_taxonomy_errors() {
        assert!(PipeforgeError::config("empty").recovery().is_some());
        assert!(PipeforgeError::policy("build-role-dev", "wildcard").recovery().is_some());
        assert!(PipeforgeError::serialization("a", "b").recovery().is_none());
    }
}
