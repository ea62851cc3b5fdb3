// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Resource naming
//!
//! One template for every environment-scoped name: `<purpose>-<env>`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("resource purpose is empty")]
    EmptyPurpose,
    #[error("environment tag is empty")]
    EmptyEnv,
}

/// Build the name of an environment-scoped resource
pub fn resource_name(purpose: &str, env: &str) -> Result<String, NameError> {
    if purpose.is_empty() {
        return Err(NameError::EmptyPurpose);
    }
    if env.is_empty() {
        return Err(NameError::EmptyEnv);
    }
    Ok(format!("{}-{}", purpose, env))
}

/// CloudFormation logical id for a name: alphanumeric, upper camel case.
///
/// `build-role-staging` becomes `BuildRoleStaging`.
pub fn logical_id(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}
