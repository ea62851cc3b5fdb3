// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! # pipeforge - Delivery Pipeline Assembler
//!
//! `pipeforge` turns a declarative pipeline manifest into a CloudFormation
//! template for a source → build → deploy delivery pipeline.
//!
//! ## Features
//!
//! - **Environment-scoped naming** - Every resource is named `<purpose>-<env>`
//! - **Least-privilege roles** - Build, deploy and pipeline roles are kept apart
//! - **Early artifact checks** - Artifact flow is validated while stages are added
//! - **Deterministic output** - The same inputs always emit the same template
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a starter manifest
//! pipeforge init meal-planner-api
//!
//! # Check it for the staging environment
//! pipeforge validate --env staging
//!
//! # Emit the template
//! pipeforge emit --env staging --output pipeline.json
//! ```

pub mod assembler;
pub mod cli;
pub mod config;
pub mod emit;
pub mod errors;
pub mod pipeline;
pub mod policy;
pub mod utils;

// Re-export commonly used types
pub use assembler::{assemble, Assembler, AssemblyState};
pub use config::{resolve, ResolvedConfig};
pub use emit::{describe, emit, OrchestrationSpec};
pub use errors::{PipeforgeError, PipeforgeResult};
pub use pipeline::{PipelineBuilder, PipelineDefinition, PipelineManifest};
pub use policy::{bind_roles, RoleSet};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
