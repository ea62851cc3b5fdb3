// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Role binder
//!
//! Builds the three service roles a pipeline needs. Responsibilities do not
//! overlap: build code never holds deployment credentials, the deploy role
//! only touches what the stack deploys, and the pipeline role only drives the
//! other two.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::binding::{PrincipalRef, RoleBinding};
use crate::config::ResolvedConfig;
use crate::errors::{PipeforgeError, PipeforgeResult};

pub const CODEBUILD_PRINCIPAL: &str = "codebuild.amazonaws.com";
pub const CODEPIPELINE_PRINCIPAL: &str = "codepipeline.amazonaws.com";
pub const CLOUDFORMATION_PRINCIPAL: &str = "cloudformation.amazonaws.com";

/// Services whose resources the deployment stage creates
pub const DEPLOY_TARGET_SERVICES: &[&str] = &[
    "apigateway",
    "cloudformation",
    "cloudwatch",
    "dynamodb",
    "events",
    "iam",
    "lambda",
];

const BUILD_ACTIONS: &[&str] = &[
    "s3:*",
    "logs:*",
    "codebuild:CreateReportGroup",
    "codebuild:CreateReport",
    "codebuild:UpdateReport",
    "codebuild:BatchPutTestCases",
];

const DEPLOY_ACTIONS: &[&str] = &[
    "apigateway:*",
    "cloudformation:*",
    "cloudwatch:*",
    "dynamodb:*",
    "events:*",
    "iam:*",
    "lambda:*",
    "s3:GetObject",
    "s3:GetObjectVersion",
];

/// Artifact reads the deploy role needs outside the target services
const DEPLOY_ARTIFACT_READS: &[&str] = &["s3:GetObject", "s3:GetObjectVersion"];

/// Granted separately, limited to the build and deploy role ARNs
const PASS_ROLE: &str = "iam:PassRole";

const PIPELINE_ACTIONS: &[&str] = &[
    "codebuild:StartBuild",
    "codebuild:BatchGetBuilds",
    "cloudformation:CreateChangeSet",
    "cloudformation:DescribeChangeSet",
    "cloudformation:ExecuteChangeSet",
    "cloudformation:DeleteChangeSet",
    "cloudformation:DescribeStacks",
    "codestar-connections:UseConnection",
    "s3:GetObject",
    "s3:GetObjectVersion",
    "s3:GetBucketVersioning",
    "s3:PutObject",
];

/// Which of the three pipeline roles an action runs under
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    Build,
    Deploy,
    Pipeline,
}

impl RoleKind {
    /// Naming purpose for this role
    pub fn purpose(&self) -> &'static str {
        match self {
            Self::Build => "build-role",
            Self::Deploy => "deploy-role",
            Self::Pipeline => "pipeline-role",
        }
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Deploy => write!(f, "deploy"),
            Self::Pipeline => write!(f, "pipeline"),
        }
    }
}

/// The build, deploy and pipeline roles of one assembly
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleSet {
    build: RoleBinding,
    deploy: RoleBinding,
    pipeline: RoleBinding,
}

impl RoleSet {
    /// Group three bindings, enforcing separation between them
    pub fn new(build: RoleBinding, deploy: RoleBinding, pipeline: RoleBinding) -> PipeforgeResult<Self> {
        if build.id() == deploy.id() || build.id() == pipeline.id() || deploy.id() == pipeline.id() {
            return Err(PipeforgeError::policy(
                build.id(),
                "build, deploy and pipeline roles must be distinct",
            ));
        }

        if let Some(service) = DEPLOY_TARGET_SERVICES
            .iter()
            .find(|service| build.touches_service(service))
        {
            return Err(PipeforgeError::policy(
                build.id(),
                format!(
                    "build role may not act on deployment target service '{}'; \
                     that belongs to the deploy role",
                    service
                ),
            ));
        }

        if let Some(action) = deploy.actions().find(|a| {
            !DEPLOY_TARGET_SERVICES.contains(&a.service())
                && !DEPLOY_ARTIFACT_READS.contains(&a.as_str())
        }) {
            return Err(PipeforgeError::policy(
                deploy.id(),
                format!(
                    "deploy role may only act on deployment target services, not '{}'",
                    action
                ),
            ));
        }

        if let Some(action) = pipeline
            .actions()
            .find(|a| a.as_str() != PASS_ROLE && !PIPELINE_ACTIONS.contains(&a.as_str()))
        {
            return Err(PipeforgeError::policy(
                pipeline.id(),
                format!(
                    "pipeline role may not use '{}'; it only orchestrates the other roles",
                    action
                ),
            ));
        }

        let passable = [role_arn_pattern(build.id()), role_arn_pattern(deploy.id())];
        if let Some(resource) = pipeline
            .resources_for(PASS_ROLE)
            .into_iter()
            .find(|r| !passable.iter().any(|arn| arn == r.as_str()))
        {
            return Err(PipeforgeError::policy(
                pipeline.id(),
                format!(
                    "'{}' may only pass the build and deploy roles, not '{}'",
                    PASS_ROLE,
                    resource.as_str()
                ),
            ));
        }

        Ok(Self {
            build,
            deploy,
            pipeline,
        })
    }

    pub fn build(&self) -> &RoleBinding {
        &self.build
    }

    pub fn deploy(&self) -> &RoleBinding {
        &self.deploy
    }

    pub fn pipeline(&self) -> &RoleBinding {
        &self.pipeline
    }

    pub fn get(&self, kind: RoleKind) -> &RoleBinding {
        match kind {
            RoleKind::Build => &self.build,
            RoleKind::Deploy => &self.deploy,
            RoleKind::Pipeline => &self.pipeline,
        }
    }

    /// Roles in emission order
    pub fn iter(&self) -> impl Iterator<Item = (RoleKind, &RoleBinding)> {
        [
            (RoleKind::Build, &self.build),
            (RoleKind::Deploy, &self.deploy),
            (RoleKind::Pipeline, &self.pipeline),
        ]
        .into_iter()
    }
}

/// ARN pattern matching the IAM role named `id` in any account
pub fn role_arn_pattern(id: &str) -> String {
    format!("arn:aws:iam::*:role/{}", id)
}

/// Bind the three pipeline roles for a resolved configuration
pub fn bind_roles(config: &ResolvedConfig) -> PipeforgeResult<RoleSet> {
    let build = RoleBinding::new(
        &config.name(RoleKind::Build.purpose())?,
        "Service role for CodeBuild",
        [
            PrincipalRef::service(CODEBUILD_PRINCIPAL),
            PrincipalRef::service(CODEPIPELINE_PRINCIPAL),
        ],
        BUILD_ACTIONS.iter().copied(),
        ["*"],
    )?;

    let deploy = RoleBinding::new(
        &config.name(RoleKind::Deploy.purpose())?,
        "Service role for CloudFormation",
        [PrincipalRef::service(CLOUDFORMATION_PRINCIPAL)],
        DEPLOY_ACTIONS.iter().copied(),
        ["*"],
    )?;

    let pipeline = RoleBinding::new(
        &config.name(RoleKind::Pipeline.purpose())?,
        "Service role for CodePipeline",
        [PrincipalRef::service(CODEPIPELINE_PRINCIPAL)],
        PIPELINE_ACTIONS.iter().copied(),
        ["*"],
    )?
    .with_scoped(
        PASS_ROLE,
        [role_arn_pattern(build.id()), role_arn_pattern(deploy.id())]
            .iter()
            .map(String::as_str),
    )?;

    let roles = RoleSet::new(build, deploy, pipeline)?;

    tracing::debug!(
        build = roles.build().id(),
        deploy = roles.deploy().id(),
        pipeline = roles.pipeline().id(),
        "bound service roles"
    );

    Ok(roles)
}
