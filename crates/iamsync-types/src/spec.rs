//! Declared binding intent

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether the member should or should not hold the role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    /// The member must hold the role
    #[default]
    Present,
    /// The member must not hold the role
    Absent,
}

/// "This member should (or should not) hold this role"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DesiredBindingSpec {
    pub role: String,
    pub member: String,
    #[serde(default)]
    pub ensure: Ensure,
}

/// Validation failures for a declared binding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecValidationError {
    #[error("role must not be empty")]
    EmptyRole,

    #[error("member must not be empty")]
    EmptyMember,
}

impl DesiredBindingSpec {
    /// A spec requiring `member` to hold `role`
    pub fn present(role: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            member: member.into(),
            ensure: Ensure::Present,
        }
    }

    /// A spec requiring `member` not to hold `role`
    pub fn absent(role: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            member: member.into(),
            ensure: Ensure::Absent,
        }
    }

    /// Reject specs that cannot be reconciled
    pub fn validate(&self) -> Result<(), SpecValidationError> {
        if self.role.trim().is_empty() {
            return Err(SpecValidationError::EmptyRole);
        }
        if self.member.trim().is_empty() {
            return Err(SpecValidationError::EmptyMember);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(DesiredBindingSpec::present("roles/viewer", "user:a@example.com")
            .validate()
            .is_ok());
        assert_eq!(
            DesiredBindingSpec::present("", "user:a@example.com").validate(),
            Err(SpecValidationError::EmptyRole)
        );
        assert_eq!(
            DesiredBindingSpec::absent("roles/viewer", " ").validate(),
            Err(SpecValidationError::EmptyMember)
        );
    }

    #[test]
    fn test_ensure_defaults_to_present() {
        let spec: DesiredBindingSpec =
            serde_json::from_str(r#"{"role":"roles/viewer","member":"allUsers"}"#).unwrap();
        assert_eq!(spec.ensure, Ensure::Present);

        let spec: DesiredBindingSpec = serde_json::from_str(
            r#"{"role":"roles/viewer","member":"allUsers","ensure":"absent"}"#,
        )
        .unwrap();
        assert_eq!(spec.ensure, Ensure::Absent);
    }
}
