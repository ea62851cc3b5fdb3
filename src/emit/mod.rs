// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Orchestration spec emission
//!
//! Turns a [`PipelineDefinition`] into the CloudFormation template the
//! provisioning layer deploys. Emission is pure: the same definition always
//! yields byte-identical JSON and YAML, because every map in the output is
//! ordered.

mod describe;
mod resources;

pub use describe::describe;

use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use crate::errors::{PipeforgeError, PipeforgeResult};
use crate::pipeline::{Action, ActionSettings, PipelineDefinition};

/// CloudFormation template format version
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Longest value accepted for a single action configuration entry
pub const MAX_PARAM_VALUE_LEN: usize = 1000;

/// Logical id of the pipeline resource
pub const PIPELINE_LOGICAL_ID: &str = "Pipeline";

fn artifact_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,100}$").expect("Invalid artifact name pattern"))
}

/// Serialized pipeline for the provisioning layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestrationSpec {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,

    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, Resource>,

    #[serde(rename = "Outputs")]
    pub outputs: BTreeMap<String, TemplateOutput>,
}

/// One template resource
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: String,

    pub properties: Value,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl Resource {
    pub fn new(resource_type: &str, properties: Value) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            properties,
            depends_on: Vec::new(),
        }
    }

    pub fn depends_on(mut self, logical_id: &str) -> Self {
        self.depends_on.push(logical_id.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateOutput {
    pub description: String,
    pub value: Value,
}

impl OrchestrationSpec {
    /// Pretty-printed JSON
    pub fn to_json(&self) -> PipeforgeResult<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    pub fn to_yaml(&self) -> PipeforgeResult<String> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// BLAKE3 digest of the canonical JSON form
    pub fn fingerprint(&self) -> PipeforgeResult<String> {
        let canonical = serde_json::to_string(self)?;
        Ok(blake3::hash(canonical.as_bytes()).to_hex().to_string())
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    /// Logical ids of all resources of one type
    pub fn resources_of_type(&self, resource_type: &str) -> Vec<&str> {
        self.resources
            .iter()
            .filter(|(_, r)| r.resource_type == resource_type)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// Serialize a validated pipeline into an orchestration spec
pub fn emit(definition: &PipelineDefinition) -> PipeforgeResult<OrchestrationSpec> {
    check_serializable(definition)?;

    let mut spec = OrchestrationSpec {
        format_version: TEMPLATE_FORMAT_VERSION.to_string(),
        description: Some(
            definition
                .description()
                .map(String::from)
                .unwrap_or_else(|| format!("Delivery pipeline {}", definition.name())),
        ),
        resources: BTreeMap::new(),
        outputs: BTreeMap::new(),
    };

    for (kind, binding) in definition.roles().iter() {
        insert(&mut spec, resources::role_logical_id(kind), resources::role(binding))?;
    }

    let store = definition.artifact_store();
    insert(&mut spec, store.logical_id.clone(), resources::bucket(store))?;

    for (_, action) in definition.actions() {
        match &action.settings {
            ActionSettings::Source(source) => {
                if let Some((id, connection)) = resources::connection(source) {
                    insert_connection(&mut spec, &action.name, id, connection)?;
                }
            }
            ActionSettings::Build(build) => {
                let (id, project) = resources::project(action, build);
                insert(&mut spec, id, project)?;
            }
            ActionSettings::Deploy(_) => {}
        }
    }

    insert(
        &mut spec,
        PIPELINE_LOGICAL_ID.to_string(),
        resources::pipeline(definition),
    )?;

    spec.outputs.insert(
        "PipelineName".to_string(),
        TemplateOutput {
            description: "Name of the delivery pipeline".to_string(),
            value: json!({ "Ref": PIPELINE_LOGICAL_ID }),
        },
    );
    spec.outputs.insert(
        "ArtifactBucketName".to_string(),
        TemplateOutput {
            description: "Bucket holding pipeline artifacts".to_string(),
            value: json!({ "Ref": store.logical_id }),
        },
    );

    tracing::info!(
        pipeline = definition.name(),
        resources = spec.resources.len(),
        "emitted orchestration spec"
    );

    Ok(spec)
}

fn insert(spec: &mut OrchestrationSpec, id: String, resource: Resource) -> PipeforgeResult<()> {
    if spec.resources.contains_key(&id) {
        return Err(PipeforgeError::serialization(
            &id,
            format!("logical id '{}' is generated twice", id),
        ));
    }
    spec.resources.insert(id, resource);
    Ok(())
}

/// Several source actions may share one connection, but nothing else may hold its id
fn insert_connection(
    spec: &mut OrchestrationSpec,
    action: &str,
    id: String,
    connection: Resource,
) -> PipeforgeResult<()> {
    match spec.resources.get(&id) {
        None => {
            spec.resources.insert(id, connection);
            Ok(())
        }
        Some(existing) if *existing == connection => Ok(()),
        Some(existing) => Err(PipeforgeError::serialization(
            action,
            format!(
                "connection logical id '{}' is already taken by a resource of type {}",
                id, existing.resource_type
            ),
        )),
    }
}

/// Reject definitions whose values cannot be represented in the template
fn check_serializable(definition: &PipelineDefinition) -> PipeforgeResult<()> {
    let mut action_names: HashSet<String> =
        definition.actions().map(|(_, a)| a.name.clone()).collect();

    for (_, action) in definition.actions() {
        for artifact in action
            .outputs
            .iter()
            .map(String::as_str)
            .chain(action.inputs.iter().map(|i| i.artifact()))
        {
            if !artifact_name_pattern().is_match(artifact) {
                return Err(PipeforgeError::serialization(
                    &action.name,
                    format!(
                        "artifact name '{}' must be 1-100 characters of letters, digits, '_' or '-'",
                        artifact
                    ),
                ));
            }
        }

        let reserved = resources::generated_keys(action);
        for (key, value) in &action.params {
            check_param(action, key, value)?;
            if reserved.contains(key.as_str()) {
                return Err(PipeforgeError::serialization(
                    &action.name,
                    format!("parameter '{}' collides with generated configuration", key),
                ));
            }
        }

        if let Some(execute) = resources::execute_action_name(action) {
            if !action_names.insert(execute.clone()) {
                return Err(PipeforgeError::serialization(
                    &action.name,
                    format!("execute action '{}' collides with an existing action", execute),
                ));
            }
        }
    }

    Ok(())
}

fn check_param(action: &Action, key: &str, value: &str) -> PipeforgeResult<()> {
    if key.trim().is_empty() {
        return Err(PipeforgeError::serialization(&action.name, "parameter key is empty"));
    }
    if let Some(c) = key.chars().chain(value.chars()).find(|c| c.is_control()) {
        return Err(PipeforgeError::serialization(
            &action.name,
            format!("parameter '{}' contains control character {:?}", key.escape_debug(), c),
        ));
    }
    if value.chars().count() > MAX_PARAM_VALUE_LEN {
        return Err(PipeforgeError::serialization(
            &action.name,
            format!(
                "parameter '{}' is {} characters; the limit is {}",
                key,
                value.chars().count(),
                MAX_PARAM_VALUE_LEN
            ),
        ));
    }
    Ok(())
}
