//! Binding and unbinding mutations
//!
//! Both operations touch at most one binding and never reorder the others.
//! Callers write the document back only when the returned flag is `true`.

use iamsync_types::{Binding, DesiredBindingSpec, Ensure, PolicyDocument, POLICY_VERSION};
use tracing::trace;

/// Grant `spec.member` the role `spec.role`.
///
/// Appends the member to the existing binding for the role, or appends a new
/// single-member binding when the role is not bound yet. Any change stamps the
/// document with [`POLICY_VERSION`]. Returns whether the document changed.
pub fn bind(spec: &DesiredBindingSpec, doc: &mut PolicyDocument) -> bool {
    bind_at(spec, doc, POLICY_VERSION)
}

/// [`bind`], stamping `version` instead of [`POLICY_VERSION`] on change
pub fn bind_at(spec: &DesiredBindingSpec, doc: &mut PolicyDocument, version: i64) -> bool {
    match doc.binding_mut(&spec.role) {
        Some(binding) if binding.contains(&spec.member) => return false,
        Some(binding) => binding.members.push(spec.member.clone()),
        None => doc
            .bindings
            .push(Binding::new(spec.role.clone()).with_member(spec.member.clone())),
    }

    doc.version = version;
    trace!(role = %spec.role, member = %spec.member, version, "bound member to role");
    true
}

/// Revoke the role `spec.role` from `spec.member`.
///
/// The binding itself stays in place even when its member list becomes empty.
/// Returns whether the document changed.
pub fn unbind(spec: &DesiredBindingSpec, doc: &mut PolicyDocument) -> bool {
    let Some(binding) = doc.binding_mut(&spec.role) else {
        return false;
    };

    let before = binding.members.len();
    binding.members.retain(|m| m != &spec.member);
    if binding.members.len() == before {
        return false;
    }

    trace!(role = %spec.role, member = %spec.member, "unbound member from role");
    true
}

/// Move `doc` toward `spec`, binding or unbinding according to `spec.ensure`
pub fn apply(spec: &DesiredBindingSpec, doc: &mut PolicyDocument) -> bool {
    match spec.ensure {
        Ensure::Present => bind(spec, doc),
        Ensure::Absent => unbind(spec, doc),
    }
}

/// Like [`apply`], but a changed document always carries `version`, whether
/// the member was bound or unbound. This is the form to use before writing a
/// document back.
pub fn apply_at(spec: &DesiredBindingSpec, doc: &mut PolicyDocument, version: i64) -> bool {
    let changed = match spec.ensure {
        Ensure::Present => bind_at(spec, doc, version),
        Ensure::Absent => unbind(spec, doc),
    };
    if changed {
        doc.version = version;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROLE: &str = "roles/storage.objectAdmin";
    const MEMBER: &str = "serviceAccount:uploader@example-project.iam.gserviceaccount.com";

    fn spec() -> DesiredBindingSpec {
        DesiredBindingSpec::present(ROLE, MEMBER)
    }

    fn doc(bindings: Vec<(&str, Vec<&str>)>) -> PolicyDocument {
        bindings
            .into_iter()
            .fold(PolicyDocument::new().with_version(POLICY_VERSION), |d, (role, members)| {
                d.with_binding(Binding {
                    role: role.to_string(),
                    members: members.iter().map(|m| m.to_string()).collect(),
                    condition: None,
                })
            })
    }

    #[test]
    fn test_bind_into_empty_document() {
        let mut d = PolicyDocument::new();
        assert!(bind(&spec(), &mut d));
        assert_eq!(d, doc(vec![(ROLE, vec![MEMBER])]));
    }

    #[test]
    fn test_bind_already_bound() {
        let mut d = doc(vec![(ROLE, vec![MEMBER])]);
        assert!(!bind(&spec(), &mut d));
        assert_eq!(d, doc(vec![(ROLE, vec![MEMBER])]));
    }

    #[test]
    fn test_bind_appends_to_existing_role() {
        let mut d = doc(vec![(ROLE, vec!["some-other-member", "yet-another-member"])]);
        assert!(bind(&spec(), &mut d));
        assert_eq!(
            d,
            doc(vec![(ROLE, vec!["some-other-member", "yet-another-member", MEMBER])])
        );
    }

    #[test]
    fn test_bind_adds_role_after_unrelated_bindings() {
        let mut d = doc(vec![("some-other-role", vec!["some-other-member", "yet-another-member"])]);
        assert!(bind(&spec(), &mut d));
        assert_eq!(
            d,
            doc(vec![
                ("some-other-role", vec!["some-other-member", "yet-another-member"]),
                (ROLE, vec![MEMBER]),
            ])
        );
    }

    #[test]
    fn test_bind_stamps_version_on_change_only() {
        let mut d = PolicyDocument::new()
            .with_version(1)
            .with_binding(Binding::new(ROLE).with_member(MEMBER));
        assert!(!bind(&spec(), &mut d));
        assert_eq!(d.version, 1);

        let mut d = PolicyDocument::new().with_version(1);
        assert!(bind(&spec(), &mut d));
        assert_eq!(d.version, POLICY_VERSION);
    }

    #[test]
    fn test_bind_keeps_condition_on_existing_binding() {
        let condition = iamsync_types::BindingCondition {
            title: "expires".into(),
            description: None,
            expression: "request.time < timestamp(\"2030-01-01T00:00:00Z\")".into(),
        };
        let mut d = PolicyDocument::new()
            .with_version(POLICY_VERSION)
            .with_binding(Binding::new(ROLE).with_condition(condition.clone()));

        assert!(bind(&spec(), &mut d));
        assert_eq!(d.bindings[0].condition.as_ref(), Some(&condition));
        assert_eq!(d.bindings[0].members, vec![MEMBER.to_string()]);
    }

    #[test]
    fn test_unbind_empty_document() {
        let mut d = PolicyDocument::new();
        assert!(!unbind(&spec(), &mut d));
        assert_eq!(d, PolicyDocument::new());
    }

    #[test]
    fn test_unbind_single_member_keeps_empty_binding() {
        let mut d = doc(vec![(ROLE, vec![MEMBER])]);
        assert!(unbind(&spec(), &mut d));
        assert_eq!(d, doc(vec![(ROLE, vec![])]));
    }

    #[test]
    fn test_unbind_preserves_remaining_order() {
        let mut d = doc(vec![(ROLE, vec!["some-other-member", MEMBER, "yet-another-member"])]);
        assert!(unbind(&spec(), &mut d));
        assert_eq!(d, doc(vec![(ROLE, vec!["some-other-member", "yet-another-member"])]));
    }

    #[test]
    fn test_unbind_member_not_bound() {
        let before = doc(vec![(ROLE, vec!["some-other-member", "yet-another-member"])]);
        let mut d = before.clone();
        assert!(!unbind(&spec(), &mut d));
        assert_eq!(d, before);
    }

    #[test]
    fn test_unbind_member_bound_to_other_role() {
        let before = doc(vec![("some-other-role", vec![MEMBER])]);
        let mut d = before.clone();
        assert!(!unbind(&spec(), &mut d));
        assert_eq!(d, before);
    }

    #[test]
    fn test_unbind_leaves_version_alone() {
        let mut d = PolicyDocument::new()
            .with_version(1)
            .with_binding(Binding::new(ROLE).with_member(MEMBER));
        assert!(unbind(&spec(), &mut d));
        assert_eq!(d.version, 1);
    }

    #[test]
    fn test_apply_dispatches_on_ensure() {
        let mut d = PolicyDocument::new();
        assert!(apply(&spec(), &mut d));
        assert!(d.binding(ROLE).unwrap().contains(MEMBER));

        assert!(apply(&DesiredBindingSpec::absent(ROLE, MEMBER), &mut d));
        assert!(!d.binding(ROLE).unwrap().contains(MEMBER));
    }

    #[test]
    fn test_apply_at_stamps_requested_version_on_bind_and_unbind() {
        let mut d = PolicyDocument::new().with_version(1);
        assert!(apply_at(&spec(), &mut d, 2));
        assert_eq!(d.version, 2);

        let mut d = doc(vec![(ROLE, vec![MEMBER])]).with_version(1);
        assert!(apply_at(&DesiredBindingSpec::absent(ROLE, MEMBER), &mut d, 3));
        assert_eq!(d.version, 3);
    }

    #[test]
    fn test_apply_at_leaves_unchanged_document_alone() {
        let mut d = doc(vec![(ROLE, vec![MEMBER])]).with_version(1);
        assert!(!apply_at(&spec(), &mut d, 3));
        assert_eq!(d.version, 1);
    }
}
