// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Template resource construction

use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};

use super::Resource;
use crate::config::logical_id;
use crate::pipeline::{
    Action, ActionSettings, ArtifactStore, BuildSettings, ConnectorKind, DeployMode,
    DeploySettings, PipelineDefinition, SourceSettings, Stage,
};
use crate::policy::{PrincipalRef, RoleBinding, RoleKind};

const POLICY_VERSION: &str = "2012-10-17";

const SOURCE_CONNECTION_KEYS: &[&str] = &["ConnectionArn", "FullRepositoryId", "BranchName"];
const SOURCE_TOKEN_KEYS: &[&str] = &["Owner", "Repo", "Branch", "OAuthToken", "PollForSourceChanges"];
const DEPLOY_KEYS: &[&str] = &[
    "ActionMode",
    "StackName",
    "ChangeSetName",
    "TemplatePath",
    "RoleArn",
    "Capabilities",
];

pub(super) fn role_logical_id(kind: RoleKind) -> String {
    logical_id(kind.purpose())
}

fn role_arn(kind: RoleKind) -> Value {
    json!({ "Fn::GetAtt": [role_logical_id(kind), "Arn"] })
}

/// Configuration keys emission fills in itself for this action
pub(super) fn generated_keys(action: &Action) -> HashSet<&str> {
    match &action.settings {
        ActionSettings::Source(source) => match source.connector {
            ConnectorKind::Connection { .. } => SOURCE_CONNECTION_KEYS.iter().copied().collect(),
            ConnectorKind::Token { .. } => SOURCE_TOKEN_KEYS.iter().copied().collect(),
        },
        ActionSettings::Build(build) => build.env.keys().map(String::as_str).collect(),
        ActionSettings::Deploy(_) => DEPLOY_KEYS.iter().copied().collect(),
    }
}

/// Name of the companion execute action, if the deploy mode needs one
pub(super) fn execute_action_name(action: &Action) -> Option<String> {
    match &action.settings {
        ActionSettings::Deploy(d) if d.mode == DeployMode::CreateAndExecute => {
            Some(format!("{}_execute", action.name))
        }
        _ => None,
    }
}

pub(super) fn role(binding: &RoleBinding) -> Resource {
    let mut principal = Map::new();
    let services: Vec<&str> = binding
        .principals()
        .iter()
        .filter_map(|p| match p {
            PrincipalRef::Service(s) => Some(s.as_str()),
            _ => None,
        })
        .collect();
    if !services.is_empty() {
        principal.insert("Service".into(), json!(services));
    }

    let accounts: Vec<String> = binding
        .principals()
        .iter()
        .filter_map(|p| match p {
            PrincipalRef::Account(id) => Some(format!("arn:aws:iam::{}:root", id)),
            PrincipalRef::Any => Some("*".to_string()),
            PrincipalRef::Service(_) => None,
        })
        .collect();
    if !accounts.is_empty() {
        principal.insert("AWS".into(), json!(accounts));
    }

    let actions: Vec<&str> = binding.allowed_actions().iter().map(|a| a.as_str()).collect();
    let resources: Vec<&str> = binding.resources().iter().map(|r| r.as_str()).collect();
    let mut statements = vec![json!({ "Effect": "Allow", "Action": actions, "Resource": resources })];
    for grant in binding.scoped_grants() {
        let resources: Vec<&str> = grant.resources.iter().map(|r| r.as_str()).collect();
        statements.push(json!({ "Effect": "Allow", "Action": grant.action.as_str(), "Resource": resources }));
    }

    Resource::new(
        "AWS::IAM::Role",
        json!({
            "RoleName": binding.id(),
            "Description": binding.description(),
            "AssumeRolePolicyDocument": {
                "Version": POLICY_VERSION,
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": principal,
                    "Action": "sts:AssumeRole",
                }],
            },
            "Policies": [{
                "PolicyName": format!("{}-policy", binding.id()),
                "PolicyDocument": {
                    "Version": POLICY_VERSION,
                    "Statement": statements,
                },
            }],
        }),
    )
}

pub(super) fn bucket(store: &ArtifactStore) -> Resource {
    let properties = if store.versioned {
        json!({ "VersioningConfiguration": { "Status": "Enabled" } })
    } else {
        json!({})
    };
    Resource::new("AWS::S3::Bucket", properties)
}

pub(super) fn connection(source: &SourceSettings) -> Option<(String, Resource)> {
    match &source.connector {
        ConnectorKind::Connection { name } => Some((
            logical_id(name),
            Resource::new(
                "AWS::CodeStarConnections::Connection",
                json!({ "ConnectionName": name, "ProviderType": "GitHub" }),
            ),
        )),
        ConnectorKind::Token { .. } => None,
    }
}

pub(super) fn project(action: &Action, build: &BuildSettings) -> (String, Resource) {
    let mut env: BTreeMap<&str, &str> = build
        .env
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    for (k, v) in &action.params {
        env.insert(k, v);
    }

    let variables: Vec<Value> = env
        .into_iter()
        .map(|(name, value)| json!({ "Name": name, "Type": "PLAINTEXT", "Value": value }))
        .collect();

    let resource = Resource::new(
        "AWS::CodeBuild::Project",
        json!({
            "Name": build.project_name,
            "ServiceRole": role_arn(RoleKind::Build),
            "Source": { "Type": "CODEPIPELINE", "BuildSpec": build.build_spec },
            "Artifacts": { "Type": "CODEPIPELINE" },
            "Environment": {
                "Type": "LINUX_CONTAINER",
                "ComputeType": "BUILD_GENERAL1_SMALL",
                "Image": build.image,
                "EnvironmentVariables": variables,
            },
        }),
    );

    (logical_id(&build.project_name), resource)
}

pub(super) fn pipeline(definition: &PipelineDefinition) -> Resource {
    let stages: Vec<Value> = definition.stages().iter().map(stage).collect();
    let execution_role = definition.execution_role();

    Resource::new(
        "AWS::CodePipeline::Pipeline",
        json!({
            "Name": definition.name(),
            "RoleArn": role_arn(execution_role),
            "ArtifactStore": {
                "Type": "S3",
                "Location": { "Ref": definition.artifact_store().logical_id },
            },
            "RestartExecutionOnUpdate": false,
            "Stages": stages,
        }),
    )
    .depends_on(&role_logical_id(execution_role))
}

fn stage(stage: &Stage) -> Value {
    let mut actions = Vec::new();
    for action in &stage.actions {
        actions.push(pipeline_action(action));
        if let ActionSettings::Deploy(deploy) = &action.settings {
            if let Some(name) = execute_action_name(action) {
                actions.push(execute_action(&name, deploy));
            }
        }
    }

    json!({ "Name": stage.name, "Actions": actions })
}

fn pipeline_action(action: &Action) -> Value {
    let (category, owner, provider, mut configuration) = match &action.settings {
        ActionSettings::Source(source) => source_configuration(source),
        ActionSettings::Build(build) => {
            let mut configuration = Map::new();
            configuration.insert(
                "ProjectName".into(),
                json!({ "Ref": logical_id(&build.project_name) }),
            );
            if action.inputs.len() > 1 {
                configuration.insert("PrimarySource".into(), json!(action.inputs[0].artifact()));
            }
            ("Build", "AWS", "CodeBuild", configuration)
        }
        ActionSettings::Deploy(deploy) => {
            let template = action.inputs.first().map(|i| i.to_string()).unwrap_or_default();
            let mut configuration = change_set_configuration("CHANGE_SET_REPLACE", deploy);
            configuration.insert("TemplatePath".into(), json!(template));
            configuration.insert("RoleArn".into(), role_arn(action.role));
            configuration.insert("Capabilities".into(), json!(deploy.capabilities.join(",")));
            ("Deploy", "AWS", "CloudFormation", configuration)
        }
    };

    // Build params become project environment variables instead
    if !matches!(action.settings, ActionSettings::Build(_)) {
        for (k, v) in &action.params {
            configuration.insert(k.clone(), json!(v));
        }
    }

    // Every action runs as the pipeline role; deploys hand their role to CloudFormation
    json!({
        "Name": action.name,
        "ActionTypeId": {
            "Category": category,
            "Owner": owner,
            "Provider": provider,
            "Version": "1",
        },
        "Configuration": configuration,
        "InputArtifacts": action.inputs.iter().map(|i| json!({ "Name": i.artifact() })).collect::<Vec<_>>(),
        "OutputArtifacts": action.outputs.iter().map(|o| json!({ "Name": o })).collect::<Vec<_>>(),
        "RunOrder": 1,
    })
}

fn source_configuration(
    source: &SourceSettings,
) -> (&'static str, &'static str, &'static str, Map<String, Value>) {
    let mut configuration = Map::new();
    match &source.connector {
        ConnectorKind::Connection { name } => {
            configuration.insert("ConnectionArn".into(), json!({ "Ref": logical_id(name) }));
            configuration.insert(
                "FullRepositoryId".into(),
                json!(format!("{}/{}", source.owner, source.repo)),
            );
            configuration.insert("BranchName".into(), json!(source.branch));
            ("Source", "AWS", "CodeStarSourceConnection", configuration)
        }
        ConnectorKind::Token { secret_id } => {
            configuration.insert("Owner".into(), json!(source.owner));
            configuration.insert("Repo".into(), json!(source.repo));
            configuration.insert("Branch".into(), json!(source.branch));
            configuration.insert(
                "OAuthToken".into(),
                json!(format!("{{{{resolve:secretsmanager:{}}}}}", secret_id)),
            );
            configuration.insert("PollForSourceChanges".into(), json!(false));
            ("Source", "ThirdParty", "GitHub", configuration)
        }
    }
}

fn change_set_configuration(mode: &str, deploy: &DeploySettings) -> Map<String, Value> {
    let mut configuration = Map::new();
    configuration.insert("ActionMode".into(), json!(mode));
    configuration.insert("StackName".into(), json!(deploy.stack_name));
    configuration.insert("ChangeSetName".into(), json!(deploy.change_set_name));
    configuration
}

fn execute_action(name: &str, deploy: &DeploySettings) -> Value {
    json!({
        "Name": name,
        "ActionTypeId": {
            "Category": "Deploy",
            "Owner": "AWS",
            "Provider": "CloudFormation",
            "Version": "1",
        },
        "Configuration": change_set_configuration("CHANGE_SET_EXECUTE", deploy),
        "InputArtifacts": [],
        "OutputArtifacts": [],
        "RunOrder": 2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::resolve;
    use crate::emit::PIPELINE_LOGICAL_ID;
    use crate::pipeline::testing::staging_pipeline;
    use crate::policy::bind_roles;

    #[test]
    fn test_role_trust_policy() {
        let roles = bind_roles(&resolve("prod", None).unwrap()).unwrap();
        let role = role(roles.build());

        assert_eq!(role.resource_type, "AWS::IAM::Role");
        assert_eq!(role.properties["RoleName"], "build-role-prod");
        let services = &role.properties["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]["Service"];
        assert_eq!(
            services,
            &json!(["codebuild.amazonaws.com", "codepipeline.amazonaws.com"])
        );
        assert_eq!(
            role.properties["Policies"][0]["PolicyDocument"]["Statement"][0]["Resource"],
            json!(["*"])
        );
    }

    #[test]
    fn test_pass_role_rendered_as_scoped_statement() {
        let roles = bind_roles(&resolve("prod", None).unwrap()).unwrap();
        let role = role(roles.pipeline());
        let statements = role.properties["Policies"][0]["PolicyDocument"]["Statement"]
            .as_array()
            .unwrap();

        assert_eq!(statements.len(), 2);
        let main_actions = statements[0]["Action"].as_array().unwrap();
        assert!(main_actions.contains(&json!("codebuild:StartBuild")));
        assert!(!main_actions.contains(&json!("iam:PassRole")));
        assert_eq!(statements[1]["Action"], "iam:PassRole");
        assert_eq!(
            statements[1]["Resource"],
            json!([
                "arn:aws:iam::*:role/build-role-prod",
                "arn:aws:iam::*:role/deploy-role-prod"
            ])
        );
    }

    #[test]
    fn test_build_actions_run_as_pipeline_role() {
        let definition = staging_pipeline();
        let pipeline = pipeline(&definition);
        let build = &pipeline.properties["Stages"][2]["Actions"][0];

        assert_eq!(build["ActionTypeId"]["Provider"], "CodeBuild");
        assert!(build.get("RoleArn").is_none());
        assert_eq!(
            pipeline.properties["RoleArn"],
            json!({ "Fn::GetAtt": ["PipelineRole", "Arn"] })
        );
        assert!(definition.roles().pipeline().allows("codebuild:StartBuild"));
        assert!(definition.roles().pipeline().allows("codebuild:BatchGetBuilds"));

        let action = &definition.stages()[2].actions[0];
        let ActionSettings::Build(settings) = &action.settings else {
            panic!("package_SAM is a build action");
        };
        let (_, project) = project(action, settings);
        assert_eq!(project.properties["ServiceRole"], json!({ "Fn::GetAtt": ["BuildRole", "Arn"] }));
    }

    #[test]
    fn test_versioned_bucket() {
        let store = ArtifactStore {
            versioned: true,
            ..ArtifactStore::default()
        };
        assert_eq!(
            bucket(&store).properties["VersioningConfiguration"]["Status"],
            "Enabled"
        );
    }

    #[test]
    fn test_token_source_resolves_secret() {
        let source = SourceSettings {
            owner: "o".into(),
            repo: "r".into(),
            branch: "main".into(),
            connector: ConnectorKind::Token {
                secret_id: "github-token".into(),
            },
        };
        let (_, _, provider, configuration) = source_configuration(&source);

        assert_eq!(provider, "GitHub");
        assert_eq!(configuration["OAuthToken"], "{{resolve:secretsmanager:github-token}}");
        assert!(connection(&source).is_none());
    }

    #[test]
    fn test_role_logical_ids() {
        assert_eq!(role_logical_id(RoleKind::Build), "BuildRole");
        assert_eq!(role_logical_id(RoleKind::Pipeline), "PipelineRole");
        assert_ne!(role_logical_id(RoleKind::Deploy), PIPELINE_LOGICAL_ID);
    }
}
