// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Service roles and their permissions

mod binder;
mod binding;

pub use binder::{
    bind_roles, role_arn_pattern, RoleKind, RoleSet, CLOUDFORMATION_PRINCIPAL, CODEBUILD_PRINCIPAL,
    CODEPIPELINE_PRINCIPAL, DEPLOY_TARGET_SERVICES,
};
pub use binding::{ActionPattern, PrincipalRef, ResourcePattern, RoleBinding, ScopedGrant};
