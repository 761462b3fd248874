//! Policy document model
//!
//! Mirrors the remote IAM policy shape. Field names serialize exactly as the
//! remote API spells them so a fetched document can be written back without
//! loss.

use serde::{Deserialize, Serialize};

/// Policy format version required by any operation touching conditional
/// role bindings. Every read requests it and every write carries it.
pub const POLICY_VERSION: i64 = 3;

/// The full access-control state attached to a remote resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Policy format version (0 when unset)
    #[serde(default)]
    pub version: i64,

    /// Role bindings. Order carries no meaning but is preserved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
}

impl PolicyDocument {
    /// An empty document with no version and no bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the binding for `role`
    pub fn binding(&self, role: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.role == role)
    }

    /// Find the binding for `role`, mutably
    pub fn binding_mut(&mut self, role: &str) -> Option<&mut Binding> {
        self.bindings.iter_mut().find(|b| b.role == role)
    }

    /// Builder-style helper appending a binding
    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Builder-style helper setting the version
    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }
}

/// A role and the members holding it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// Role name, e.g. `roles/storage.objectViewer`
    pub role: String,

    /// Members in insertion order, e.g. `user:alice@example.com`
    #[serde(default)]
    pub members: Vec<String>,

    /// Attribute condition, carried through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<BindingCondition>,
}

impl Binding {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            members: Vec::new(),
            condition: None,
        }
    }

    /// Builder-style helper appending a member
    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.members.push(member.into());
        self
    }

    pub fn with_condition(mut self, condition: BindingCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Whether `member` holds this role
    pub fn contains(&self, member: &str) -> bool {
        self.members.iter().any(|m| m == member)
    }
}

/// Opaque attribute condition attached to a binding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingCondition {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Condition expression, never interpreted here
    pub expression: String,
}
