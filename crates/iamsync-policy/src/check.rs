//! Convergence checks
//!
//! Read-only predicates the driver calls on every reconcile pass.

use std::collections::HashSet;

use iamsync_types::{DesiredBindingSpec, Ensure, PolicyDocument, POLICY_VERSION};

use crate::error::{Result, StructuralPolicyError};

/// Whether the document has no bindings at all, regardless of its version
pub fn is_empty(doc: &PolicyDocument) -> bool {
    doc.bindings.is_empty()
}

/// Reject documents the diff engine cannot safely reason about.
///
/// Duplicate roles are refused rather than resolved by picking one entry.
pub fn validate_document(doc: &PolicyDocument) -> Result<()> {
    if !(0..=POLICY_VERSION).contains(&doc.version) {
        return Err(StructuralPolicyError::UnsupportedVersion {
            version: doc.version,
        });
    }

    let mut seen = HashSet::with_capacity(doc.bindings.len());
    for binding in &doc.bindings {
        if !seen.insert(binding.role.as_str()) {
            return Err(StructuralPolicyError::DuplicateRole {
                role: binding.role.clone(),
            });
        }
        if binding.condition.is_some() && doc.version < POLICY_VERSION {
            return Err(StructuralPolicyError::ConditionRequiresVersion {
                role: binding.role.clone(),
                version: doc.version,
            });
        }
    }

    Ok(())
}

/// Whether `doc` already satisfies `spec`.
///
/// For [`Ensure::Present`] the member must hold the role; for
/// [`Ensure::Absent`] it must not. Members bound to the role by anyone else
/// never affect the answer.
pub fn is_up_to_date(spec: &DesiredBindingSpec, doc: &PolicyDocument) -> Result<bool> {
    validate_document(doc)?;

    let bound = doc
        .binding(&spec.role)
        .is_some_and(|b| b.contains(&spec.member));

    Ok(match spec.ensure {
        Ensure::Present => bound,
        Ensure::Absent => !bound,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use iamsync_types::{Binding, BindingCondition};

    const ROLE: &str = "roles/storage.objectViewer";
    const MEMBER: &str = "user:alice@example.com";

    fn bound_doc() -> PolicyDocument {
        PolicyDocument::new()
            .with_version(POLICY_VERSION)
            .with_binding(Binding::new("roles/storage.admin").with_member("group:ops@example.com"))
            .with_binding(
                Binding::new(ROLE)
                    .with_member("user:bob@example.com")
                    .with_member(MEMBER),
            )
    }

    #[test]
    fn test_is_empty_ignores_version() {
        assert!(is_empty(&PolicyDocument::new()));
        assert!(is_empty(&PolicyDocument::new().with_version(POLICY_VERSION)));
        assert!(!is_empty(&bound_doc()));
        assert!(!is_empty(&PolicyDocument::new().with_binding(Binding::new(ROLE))));
    }

    #[test]
    fn test_present_spec() {
        let spec = DesiredBindingSpec::present(ROLE, MEMBER);
        assert!(is_up_to_date(&spec, &bound_doc()).unwrap());
        assert!(!is_up_to_date(&spec, &PolicyDocument::new()).unwrap());

        let other = DesiredBindingSpec::present(ROLE, "user:carol@example.com");
        assert!(!is_up_to_date(&other, &bound_doc()).unwrap());
    }

    #[test]
    fn test_absent_spec() {
        let spec = DesiredBindingSpec::absent(ROLE, MEMBER);
        assert!(!is_up_to_date(&spec, &bound_doc()).unwrap());
        assert!(is_up_to_date(&spec, &PolicyDocument::new()).unwrap());

        let elsewhere = DesiredBindingSpec::absent("roles/storage.admin", MEMBER);
        assert!(is_up_to_date(&elsewhere, &bound_doc()).unwrap());
    }

    #[test]
    fn test_duplicate_roles_rejected() {
        let doc = bound_doc().with_binding(Binding::new(ROLE).with_member(MEMBER));
        let err = is_up_to_date(&DesiredBindingSpec::present(ROLE, MEMBER), &doc).unwrap_err();
        assert_eq!(
            err,
            StructuralPolicyError::DuplicateRole {
                role: ROLE.to_string()
            }
        );
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let doc = bound_doc().with_version(7);
        assert_eq!(
            validate_document(&doc),
            Err(StructuralPolicyError::UnsupportedVersion { version: 7 })
        );
        assert!(validate_document(&bound_doc().with_version(-1)).is_err());
    }

    #[test]
    fn test_condition_requires_version_three() {
        let condition = BindingCondition {
            title: "office-hours".into(),
            description: Some("weekdays only".into()),
            expression: "request.time.getDayOfWeek() < 5".into(),
        };
        let doc = PolicyDocument::new()
            .with_version(1)
            .with_binding(Binding::new(ROLE).with_member(MEMBER).with_condition(condition));

        assert_eq!(
            validate_document(&doc),
            Err(StructuralPolicyError::ConditionRequiresVersion {
                role: ROLE.to_string(),
                version: 1
            })
        );
        assert!(validate_document(&doc.with_version(POLICY_VERSION)).is_ok());
    }
}
