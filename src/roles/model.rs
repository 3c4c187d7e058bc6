use crate::api::require_key;
use reconcile_framework::{require, Definition, ValidationError};
use serde::{Deserialize, Serialize};

/// Whether a policy statement grants or denies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

/// One statement of a custom role policy.
///
/// A statement names its actions either positively (`actions`) or by exclusion
/// (`notActions`), and the same for resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStatement {
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_actions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_resources: Option<Vec<String>>,
}

impl PolicyStatement {
    pub fn allow(actions: &[&str], resources: &[&str]) -> Self {
        Self::new(Effect::Allow, actions, resources)
    }

    pub fn deny(actions: &[&str], resources: &[&str]) -> Self {
        Self::new(Effect::Deny, actions, resources)
    }

    fn new(effect: Effect, actions: &[&str], resources: &[&str]) -> Self {
        let owned = |items: &[&str]| Some(items.iter().map(|s| s.to_string()).collect());
        Self {
            effect,
            actions: owned(actions),
            not_actions: None,
            resources: owned(resources),
            not_resources: None,
        }
    }

    fn validate(&self, index: usize) -> Result<(), ValidationError> {
        let invalid = |message: String| ValidationError::Invalid {
            field: "policy",
            message,
        };
        if self.actions.is_some() == self.not_actions.is_some() {
            return Err(invalid(format!(
                "statement {index} must set exactly one of actions or notActions"
            )));
        }
        if self.resources.is_some() == self.not_resources.is_some() {
            return Err(invalid(format!(
                "statement {index} must set exactly one of resources or notResources"
            )));
        }
        Ok(())
    }
}

/// Desired state of a LaunchDarkly custom role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRole {
    pub key: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub policy: Vec<PolicyStatement>,
}

impl CustomRole {
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        policy: Vec<PolicyStatement>,
        description: Option<String>,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description,
            policy,
        }
    }
}

impl Definition for CustomRole {
    const KIND: &'static str = "custom role";

    fn key(&self) -> &str {
        &self.key
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_key(Self::KIND, "key", &self.key)?;
        require(Self::KIND, "name", &self.name)?;
        for (index, statement) in self.policy.iter().enumerate() {
            statement.validate(index)?;
        }
        Ok(())
    }
}
