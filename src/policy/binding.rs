// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Role bindings
//!
//! A [`RoleBinding`] names the identities allowed to assume a role and the
//! actions and resources the role may touch. Construction is the only place
//! these are validated, so an existing binding is always safe to emit.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::errors::{PipeforgeError, PipeforgeResult};

/// Verb prefixes that only read state
const READ_ONLY_VERBS: &[&str] = &["Get", "List", "Describe", "BatchGet"];

/// Identity allowed to assume a role
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalRef {
    /// AWS service principal, e.g. `codebuild.amazonaws.com`
    Service(String),
    /// Every principal in a 12-digit account
    Account(String),
    /// Anyone, including unauthenticated callers
    Any,
}

impl PrincipalRef {
    pub fn service(name: &str) -> Self {
        Self::Service(name.to_string())
    }

    fn validate(&self, role: &str) -> PipeforgeResult<()> {
        match self {
            Self::Service(name) if !name.ends_with(".amazonaws.com") || name.len() <= 14 => Err(
                PipeforgeError::policy(role, format!("'{}' is not a service principal", name)),
            ),
            Self::Account(id) if id.len() != 12 || !id.chars().all(|c| c.is_ascii_digit()) => Err(
                PipeforgeError::policy(role, format!("'{}' is not a 12-digit account id", id)),
            ),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for PrincipalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service(name) => write!(f, "service:{}", name),
            Self::Account(id) => write!(f, "account:{}", id),
            Self::Any => write!(f, "*"),
        }
    }
}

/// An IAM action such as `s3:GetObject` or `s3:*`
///
/// The blanket cross-service `*` cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ActionPattern(String);

impl ActionPattern {
    pub fn parse(pattern: &str, role: &str) -> PipeforgeResult<Self> {
        if pattern == "*" {
            return Err(PipeforgeError::policy(
                role,
                "the blanket '*' action grants every service; scope it to a service such as 's3:*'",
            ));
        }

        let Some((service, verb)) = pattern.split_once(':') else {
            return Err(PipeforgeError::policy(
                role,
                format!("action '{}' is not of the form 'service:Action'", pattern),
            ));
        };

        let service_ok = !service.is_empty()
            && service
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        let verb_ok = !verb.is_empty() && verb.chars().all(|c| c.is_ascii_alphanumeric() || c == '*');

        if !service_ok || !verb_ok {
            return Err(PipeforgeError::policy(
                role,
                format!("action '{}' is malformed", pattern),
            ));
        }

        Ok(Self(pattern.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Service prefix, e.g. `s3` for `s3:GetObject`
    pub fn service(&self) -> &str {
        self.0.split_once(':').map(|(s, _)| s).unwrap_or(&self.0)
    }

    pub fn verb(&self) -> &str {
        self.0.split_once(':').map(|(_, v)| v).unwrap_or("")
    }

    /// Whether `action` falls under this pattern (honours trailing wildcards)
    pub fn matches(&self, action: &str) -> bool {
        match self.0.strip_suffix('*') {
            Some(prefix) => action.starts_with(prefix),
            None => self.0 == action,
        }
    }

    /// Whether this action can change state (wildcards count as mutating)
    pub fn is_mutating(&self) -> bool {
        let verb = self.verb();
        !READ_ONLY_VERBS.iter().any(|p| verb.starts_with(p))
    }
}

impl fmt::Display for ActionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resource a role may act on
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum ResourcePattern {
    /// Explicit `*`
    All,
    /// A concrete or wildcarded ARN
    Arn(String),
}

impl ResourcePattern {
    pub fn parse(pattern: &str, role: &str) -> PipeforgeResult<Self> {
        match pattern {
            "*" => Ok(Self::All),
            arn if arn.starts_with("arn:") && arn.split(':').count() >= 6 => {
                Ok(Self::Arn(arn.to_string()))
            }
            other => Err(PipeforgeError::policy(
                role,
                format!("resource '{}' is neither '*' nor an ARN", other),
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::All => "*",
            Self::Arn(arn) => arn,
        }
    }
}

/// One action restricted to its own resources, emitted as a separate statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopedGrant {
    pub action: ActionPattern,
    pub resources: BTreeSet<ResourcePattern>,
}

/// Named set of permitted operations and the identities permitted to use them
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleBinding {
    id: String,
    description: String,
    principals: BTreeSet<PrincipalRef>,
    allowed_actions: Vec<ActionPattern>,
    resources: BTreeSet<ResourcePattern>,
    scoped: Vec<ScopedGrant>,
}

impl RoleBinding {
    /// Create a validated role binding
    ///
    /// Actions keep their first-seen order; duplicates are dropped.
    pub fn new<'a>(
        id: &str,
        description: &str,
        principals: impl IntoIterator<Item = PrincipalRef>,
        actions: impl IntoIterator<Item = &'a str>,
        resources: impl IntoIterator<Item = &'a str>,
    ) -> PipeforgeResult<Self> {
        if id.is_empty() {
            return Err(PipeforgeError::policy("<unnamed>", "role id is empty"));
        }

        let principals: BTreeSet<PrincipalRef> = principals.into_iter().collect();
        if principals.is_empty() {
            return Err(PipeforgeError::policy(id, "no principal may assume this role"));
        }
        for principal in &principals {
            principal.validate(id)?;
        }

        let mut allowed_actions: Vec<ActionPattern> = Vec::new();
        for action in actions {
            let pattern = ActionPattern::parse(action, id)?;
            if !allowed_actions.contains(&pattern) {
                allowed_actions.push(pattern);
            }
        }
        if allowed_actions.is_empty() {
            return Err(PipeforgeError::policy(id, "allowed actions are empty"));
        }

        let resources = resources
            .into_iter()
            .map(|r| ResourcePattern::parse(r, id))
            .collect::<PipeforgeResult<BTreeSet<_>>>()?;
        if resources.is_empty() {
            return Err(PipeforgeError::policy(
                id,
                "resources are empty; use an explicit '*' for every resource",
            ));
        }

        if principals.contains(&PrincipalRef::Any) {
            if let Some(mutating) = allowed_actions.iter().find(|a| a.is_mutating()) {
                return Err(PipeforgeError::policy(
                    id,
                    format!(
                        "any caller could assume this role and use mutating action '{}'",
                        mutating
                    ),
                ));
            }
        }

        Ok(Self {
            id: id.to_string(),
            description: description.to_string(),
            principals,
            allowed_actions,
            resources,
            scoped: Vec::new(),
        })
    }

    /// Grant one more action, limited to `resources`
    ///
    /// The action must not already be granted by the main statement, otherwise
    /// the narrower resources would have no effect.
    pub fn with_scoped<'a>(
        mut self,
        action: &str,
        resources: impl IntoIterator<Item = &'a str>,
    ) -> PipeforgeResult<Self> {
        let pattern = ActionPattern::parse(action, &self.id)?;
        if self.allowed_actions.iter().any(|a| a.matches(pattern.as_str())) {
            return Err(PipeforgeError::policy(
                &self.id,
                format!("action '{}' is already granted by the main statement", pattern),
            ));
        }

        let resources = resources
            .into_iter()
            .map(|r| ResourcePattern::parse(r, &self.id))
            .collect::<PipeforgeResult<BTreeSet<_>>>()?;
        if resources.is_empty() || resources.contains(&ResourcePattern::All) {
            return Err(PipeforgeError::policy(
                &self.id,
                format!("scoped action '{}' needs explicit resource ARNs", pattern),
            ));
        }

        if self.principals.contains(&PrincipalRef::Any) && pattern.is_mutating() {
            return Err(PipeforgeError::policy(
                &self.id,
                format!(
                    "any caller could assume this role and use mutating action '{}'",
                    pattern
                ),
            ));
        }

        self.scoped.push(ScopedGrant {
            action: pattern,
            resources,
        });
        Ok(self)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn principals(&self) -> &BTreeSet<PrincipalRef> {
        &self.principals
    }

    pub fn allowed_actions(&self) -> &[ActionPattern] {
        &self.allowed_actions
    }

    pub fn resources(&self) -> &BTreeSet<ResourcePattern> {
        &self.resources
    }

    pub fn scoped_grants(&self) -> &[ScopedGrant] {
        &self.scoped
    }

    /// Every granted action, scoped ones last
    pub fn actions(&self) -> impl Iterator<Item = &ActionPattern> {
        self.allowed_actions
            .iter()
            .chain(self.scoped.iter().map(|g| &g.action))
    }

    /// Whether any granted action belongs to `service`
    pub fn touches_service(&self, service: &str) -> bool {
        self.actions().any(|a| a.service() == service)
    }

    /// Whether this role may perform `action` on some resource
    pub fn allows(&self, action: &str) -> bool {
        self.actions().any(|pattern| pattern.matches(action))
    }

    /// Resources `action` is granted on
    pub fn resources_for(&self, action: &str) -> Vec<&ResourcePattern> {
        if self.allowed_actions.iter().any(|a| a.matches(action)) {
            return self.resources.iter().collect();
        }
        self.scoped
            .iter()
            .filter(|g| g.action.matches(action))
            .flat_map(|g| g.resources.iter())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codebuild() -> PrincipalRef {
        PrincipalRef::service("codebuild.amazonaws.com")
    }

    #[test]
    fn test_valid_binding() {
        let role = RoleBinding::new(
            "build-role-dev",
            "build",
            [codebuild()],
            ["s3:*", "logs:PutLogEvents", "s3:*"],
            ["*"],
        )
        .unwrap();

        assert_eq!(role.allowed_actions().len(), 2);
        assert_eq!(role.allowed_actions()[0].as_str(), "s3:*");
        assert!(role.resources().contains(&ResourcePattern::All));
        assert!(role.allows("s3:PutObject"));
        assert!(role.allows("logs:PutLogEvents"));
        assert!(!role.allows("lambda:CreateFunction"));
    }

    #[test]
    fn test_blanket_wildcard_rejected() {
        let err = RoleBinding::new("r", "", [codebuild()], ["*"], ["*"]).unwrap_err();
        assert!(matches!(err, PipeforgeError::Policy { .. }));
        assert!(err.to_string().contains("'*'"));
    }

    #[test]
    fn test_service_wildcard_allowed() {
        assert!(RoleBinding::new("r", "", [codebuild()], ["cloudformation:*"], ["*"]).is_ok());
    }

    #[test]
    fn test_empty_actions_and_resources_rejected() {
        let no_actions: [&str; 0] = [];
        assert!(RoleBinding::new("r", "", [codebuild()], no_actions, ["*"]).is_err());
        assert!(RoleBinding::new("r", "", [codebuild()], ["s3:*"], no_actions).is_err());
    }

    #[test]
    fn test_any_principal_with_mutating_action_rejected() {
        let err = RoleBinding::new(
            "r",
            "",
            [codebuild(), PrincipalRef::Any],
            ["s3:*", "logs:*"],
            ["*"],
        )
        .unwrap_err();
        assert!(matches!(err, PipeforgeError::Policy { .. }));
    }

    #[test]
    fn test_any_principal_with_read_only_actions_allowed() {
        let role = RoleBinding::new(
            "reader",
            "",
            [PrincipalRef::Any],
            ["s3:GetObject", "cloudformation:Describe*"],
            ["*"],
        );
        assert!(role.is_ok());
    }

    #[test]
    fn test_malformed_patterns_rejected() {
        for bad in ["s3", ":GetObject", "S3:GetObject", "s3:", "s3:Get Object"] {
            assert!(
                RoleBinding::new("r", "", [codebuild()], [bad], ["*"]).is_err(),
                "{bad} should be rejected"
            );
        }
        assert!(RoleBinding::new("r", "", [codebuild()], ["s3:*"], ["bucket"]).is_err());
        assert!(RoleBinding::new(
            "r",
            "",
            [codebuild()],
            ["s3:*"],
            ["arn:aws:s3:::my-bucket/*"]
        )
        .is_ok());
    }

    #[test]
    fn test_principal_validation() {
        assert!(RoleBinding::new("r", "", [PrincipalRef::service("codebuild")], ["s3:*"], ["*"]).is_err());
        assert!(RoleBinding::new("r", "", [PrincipalRef::Account("12".into())], ["s3:*"], ["*"]).is_err());
        assert!(RoleBinding::new(
            "r",
            "",
            [PrincipalRef::Account("123456789012".into())],
            ["s3:*"],
            ["*"]
        )
        .is_ok());
    }

    #[test]
    fn test_scoped_grant_keeps_its_own_resources() {
        let arn = "arn:aws:iam::*:role/deploy-role-dev";
        let role = RoleBinding::new("r", "", [codebuild()], ["s3:GetObject"], ["*"])
            .unwrap()
            .with_scoped("iam:PassRole", [arn])
            .unwrap();

        assert!(role.allows("iam:PassRole"));
        assert_eq!(role.actions().count(), 2);
        assert_eq!(role.resources_for("iam:PassRole"), vec![&ResourcePattern::Arn(arn.into())]);
        assert_eq!(role.resources_for("s3:GetObject"), vec![&ResourcePattern::All]);
    }

    #[test]
    fn test_scoped_grant_rejects_wildcard_and_duplicate() {
        let role = RoleBinding::new("r", "", [codebuild()], ["iam:PassRole"], ["*"]).unwrap();
        assert!(role
            .clone()
            .with_scoped("iam:PassRole", ["arn:aws:iam::*:role/x"])
            .is_err());

        let role = RoleBinding::new("r", "", [codebuild()], ["s3:GetObject"], ["*"]).unwrap();
        assert!(role.clone().with_scoped("iam:PassRole", ["*"]).is_err());
        let none: [&str; 0] = [];
        assert!(role.with_scoped("iam:PassRole", none).is_err());
    }

    #[test]
    fn test_mutating_classification() {
        let p = |s: &str| ActionPattern::parse(s, "r").unwrap();
        assert!(p("s3:*").is_mutating());
        assert!(p("s3:PutObject").is_mutating());
        assert!(!p("s3:GetObject").is_mutating());
        assert!(!p("cloudformation:Describe*").is_mutating());
        assert!(!p("codebuild:BatchGetBuilds").is_mutating());
    }
}
