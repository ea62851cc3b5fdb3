// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Error recovery suggestions
//!
//! Provides actionable suggestions for recovering from assembly errors.

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands to run
    pub commands: Vec<String>,
}

impl RecoverySuggestion {
    /// Suggest a valid environment name
    pub fn fix_environment_name(reason: &str) -> Self {
        Self {
            action: "Use a valid environment name".into(),
            steps: vec![
                reason.to_string(),
                "Environment names become part of every resource name".into(),
                "Allowed characters: A-Z, a-z, 0-9 and '-', at most 50 of them".into(),
            ],
            commands: vec![
                "# Assemble the staging pipeline:".into(),
                "pipeforge validate --env staging".into(),
            ],
        }
    }

    /// Suggest narrowing an unsafe role binding
    pub fn tighten_role(role: &str, reason: &str) -> Self {
        Self {
            action: format!("Narrow the permissions of role '{}'", role),
            steps: vec![
                reason.to_string(),
                "Replace '*' with service-scoped patterns such as 's3:*'".into(),
                "Only named service principals may assume roles that change infrastructure".into(),
                "Deployment permissions belong to the deploy role, never the build role".into(),
            ],
            commands: vec![],
        }
    }

    /// Suggest declaring a missing artifact
    pub fn declare_artifact(artifact: &str, action: &str) -> Self {
        Self {
            action: format!("Declare artifact '{}' before it is consumed", artifact),
            steps: vec![
                format!("Action '{}' reads '{}'", action, artifact),
                "Add it to the outputs of an action in an earlier stage".into(),
                "Artifacts produced in the same stage are not visible to each other".into(),
            ],
            commands: vec![
                "# Show which stages produce and consume each artifact:".into(),
                "pipeforge graph --env <env>".into(),
            ],
        }
    }

    /// Suggest creating a manifest file
    pub fn create_manifest() -> Self {
        Self {
            action: "Create a pipeline manifest".into(),
            steps: vec![
                "No .pipeforge.yaml found in current directory".into(),
                "Initialize a starter manifest or create the file manually".into(),
            ],
            commands: vec!["pipeforge init".into()],
        }
    }

    /// Suggest fixing invalid YAML
    pub fn fix_yaml_syntax() -> Self {
        Self {
            action: "Fix YAML syntax error".into(),
            steps: vec![
                "Check for common YAML issues:".into(),
                "  • Incorrect indentation (use spaces, not tabs)".into(),
                "  • Missing colons after keys".into(),
                "  • Unquoted special characters".into(),
            ],
            commands: vec![],
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}
