// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Configuration resolution
//!
//! Turns the named inputs of an assembly (environment name and an optional
//! branch override) into a [`ResolvedConfig`]. Everything downstream derives
//! its resource names from this value through [`resource_name`].

mod naming;

pub use naming::{logical_id, resource_name, NameError};

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::errors::{PipeforgeError, PipeforgeResult};

/// Environment that gets a `staging` branch by default; everything else tracks `main`.
pub const STAGING_ENV: &str = "staging";

/// Branch used by every environment other than staging.
pub const DEFAULT_BRANCH: &str = "main";

/// Longest environment name that still fits `pipeline-role-<env>` in a 64-character IAM role name.
pub const MAX_ENV_NAME_LEN: usize = 50;

fn env_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9-]+$").expect("Invalid environment name pattern"))
}

/// Deployment environment requested by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Environment {
    name: String,
    branch_override: Option<String>,
}

impl Environment {
    /// Create a validated environment
    pub fn new(name: &str, branch_override: Option<&str>) -> PipeforgeResult<Self> {
        validate_env_name(name)?;

        // An empty override means "not set", the same as an unset variable
        let branch_override = branch_override
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(String::from);

        Ok(Self {
            name: name.to_string(),
            branch_override,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn branch_override(&self) -> Option<&str> {
        self.branch_override.as_deref()
    }

    /// Branch tracked by this environment
    pub fn branch(&self) -> &str {
        match &self.branch_override {
            Some(branch) => branch,
            None if self.name == STAGING_ENV => STAGING_ENV,
            None => DEFAULT_BRANCH,
        }
    }
}

/// Fully resolved naming inputs for one assembly
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedConfig {
    pub env: String,
    pub branch: String,
    pub name_prefix: String,
}

impl ResolvedConfig {
    /// Name a resource for this environment, e.g. `build-role` -> `build-role-staging`
    pub fn name(&self, purpose: &str) -> PipeforgeResult<String> {
        resource_name(purpose, &self.name_prefix)
            .map_err(|e| PipeforgeError::config(e.to_string()))
    }
}

/// Resolve the environment name and optional branch override
///
/// Pure: the same inputs always produce an identical [`ResolvedConfig`].
pub fn resolve(env_name: &str, branch_override: Option<&str>) -> PipeforgeResult<ResolvedConfig> {
    let env = Environment::new(env_name, branch_override)?;

    let config = ResolvedConfig {
        env: env.name().to_string(),
        branch: env.branch().to_string(),
        name_prefix: env.name().to_string(),
    };

    tracing::debug!(env = %config.env, branch = %config.branch, "resolved configuration");

    Ok(config)
}

fn validate_env_name(name: &str) -> PipeforgeResult<()> {
    if name.is_empty() {
        return Err(PipeforgeError::config("environment name is empty"));
    }

    if name.len() > MAX_ENV_NAME_LEN {
        return Err(PipeforgeError::config(format!(
            "environment name '{}' is {} characters; the limit is {}",
            name,
            name.len(),
            MAX_ENV_NAME_LEN
        )));
    }

    if !env_name_pattern().is_match(name) {
        let bad: String = name
            .chars()
            .filter(|c| !(c.is_ascii_alphanumeric() || *c == '-'))
            .collect();
        return Err(PipeforgeError::config(format!(
            "environment name '{}' contains characters not allowed in resource names: '{}'",
            name, bad
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_tracks_staging_branch() {
        let config = resolve("staging", None).unwrap();
        assert_eq!(config.env, "staging");
        assert_eq!(config.branch, "staging");
        assert_eq!(config.name_prefix, "staging");
    }

    #[test]
    fn test_other_envs_track_main() {
        assert_eq!(resolve("production", None).unwrap().branch, "main");
        assert_eq!(resolve("dev-2", None).unwrap().branch, "main");
    }

    #[test]
    fn test_override_wins() {
        let config = resolve("staging", Some("feature/pipeline")).unwrap();
        assert_eq!(config.branch, "feature/pipeline");
        assert_eq!(config.name_prefix, "staging");
    }

    #[test]
    fn test_empty_override_is_ignored() {
        assert_eq!(resolve("prod", Some("")).unwrap().branch, "main");
        assert_eq!(resolve("staging", Some("  ")).unwrap().branch, "staging");
    }

    #[test]
    fn test_resolve_is_deterministic() {
        for name in ["staging", "prod", "qa-1", "X"] {
            let a = resolve(name, Some("release")).unwrap();
            let b = resolve(name, Some("release")).unwrap();
            assert_eq!(a, b);
            assert_eq!(
                serde_json::to_string(&a).unwrap(),
                serde_json::to_string(&b).unwrap()
            );
        }
    }

    #[test]
    fn test_rejects_empty_and_illegal_names() {
        assert!(matches!(resolve("", None), Err(PipeforgeError::Config { .. })));

        for bad in ["stag ing", "prod_1", "env.1", "ünïcode", "a/b"] {
            let err = resolve(bad, None).unwrap_err();
            assert!(matches!(err, PipeforgeError::Config { .. }), "{bad} should fail");
        }
    }

    #[test]
    fn test_rejects_names_too_long_for_role_names() {
        let longest = "e".repeat(MAX_ENV_NAME_LEN);
        let config = resolve(&longest, None).unwrap();
        assert!(config.name("pipeline-role").unwrap().len() <= 64);

        let err = resolve(&"e".repeat(MAX_ENV_NAME_LEN + 1), None).unwrap_err();
        assert!(matches!(err, PipeforgeError::Config { .. }));
        assert!(err.to_string().contains("limit is 50"));
    }

    #[test]
    fn test_config_names_resources_with_env_suffix() {
        let config = resolve("staging", None).unwrap();
        assert_eq!(config.name("build-role").unwrap(), "build-role-staging");
        assert!(config.name("").is_err());
    }
}
