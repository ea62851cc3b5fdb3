// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Shared fixtures for unit tests

use std::collections::BTreeMap;

use crate::config::resolve;
use crate::pipeline::{
    Action, ArtifactRef, BuildSettings, ConnectorKind, DeployMode, DeploySettings,
    PipelineBuilder, PipelineDefinition, SourceSettings, DEFAULT_BUILD_IMAGE,
};
use crate::policy::bind_roles;

pub fn source_action(name: &str, output: &str) -> Action {
    Action::source(
        name,
        SourceSettings {
            owner: "AdrianP873".into(),
            repo: "meal-planner-platform".into(),
            branch: "staging".into(),
            connector: ConnectorKind::Connection {
                name: "github-connector-staging".into(),
            },
        },
        output,
    )
}

pub fn build_action(name: &str, project: &str, input: &str, output: Option<&str>) -> Action {
    let action = Action::build(
        name,
        BuildSettings {
            project_name: project.into(),
            build_spec: format!("buildspec-{}.yml", project),
            image: DEFAULT_BUILD_IMAGE.into(),
            env: BTreeMap::from([("ENV".to_string(), "staging".to_string())]),
        },
        ArtifactRef::parse(input).expect("valid artifact reference"),
    );

    match output {
        Some(output) => action.with_output(output),
        None => action,
    }
}

pub fn deploy_action(name: &str, template: &str) -> Action {
    Action::deploy(
        name,
        DeploySettings {
            stack_name: "meal-planner-api-staging".into(),
            change_set_name: "meal-planner-api-changeset-staging".into(),
            mode: DeployMode::CreateChangeSetOnly,
            capabilities: vec!["CAPABILITY_IAM".into(), "CAPABILITY_AUTO_EXPAND".into()],
        },
        ArtifactRef::parse(template).expect("valid artifact reference"),
    )
}

/// Source → TestInfra → PackageApplication → DeploySamChangeSet for staging
pub fn staging_pipeline() -> PipelineDefinition {
    let config = resolve("staging", None).unwrap();
    let roles = bind_roles(&config).unwrap();
    let mut builder = PipelineBuilder::new("meal-planner-api", config, roles).unwrap();

    builder
        .add_stage("Source", vec![source_action("Source_GitHub", "source")])
        .unwrap()
        .add_stage(
            "TestInfra",
            vec![build_action("pipeline_build", "meal-planner-infra-build-staging", "source", None)],
        )
        .unwrap()
        .add_stage(
            "PackageApplication",
            vec![build_action(
                "package_SAM",
                "meal-planner-api-project-staging",
                "source",
                Some("package"),
            )],
        )
        .unwrap()
        .add_stage(
            "DeploySamChangeSet",
            vec![deploy_action("deploy_SAM_changeset", "package::packaged-template.yaml")],
        )
        .unwrap();

    builder.build().unwrap()
}
