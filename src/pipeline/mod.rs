// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Pipeline definitions and types
//!
//! This module defines the stage graph of a pipeline: stages, actions and
//! the artifacts flowing between them, the builder that validates them, and
//! the manifest format they are described in.

mod builder;
mod definition;
mod graph;
mod manifest;
mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::{PipelineBuilder, MIN_STAGES};
pub use definition::*;
pub use graph::ArtifactGraph;
pub use manifest::{
    ManifestAction, ManifestActionKind, ManifestConnector, ManifestStage, PipelineManifest,
    DEFAULT_MANIFEST, ENV_VARIABLE,
};
pub use validation::{PipelineValidator, ValidationResult, MAX_ACTIONS_PER_STAGE, MAX_STAGES};
