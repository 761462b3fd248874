//! Managed declarations and their reported status
//!
//! The host hands the driver a [`ManagedResource`]; only the
//! [`ManagedResource::BucketPolicyMember`] variant is reconciled here. Buckets
//! and whole-bucket policies belong to other controllers.

use chrono::{DateTime, Utc};
use iamsync_types::{DesiredBindingSpec, ResourceId};
use serde::{Deserialize, Serialize};

use crate::error::{Phase, ReconcileError, Result};

/// Every managed-resource kind the host may dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ManagedResource {
    /// One role/member binding on a bucket's IAM policy
    BucketPolicyMember(BucketPolicyMember),

    /// A bucket
    Bucket(ForeignResource),

    /// A whole-bucket policy
    BucketPolicy(ForeignResource),
}

/// A declaration reconciled by some other controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignResource {
    pub name: String,
}

impl ManagedResource {
    /// Declaration name, unique within a store
    pub fn name(&self) -> &str {
        match self {
            ManagedResource::BucketPolicyMember(m) => &m.name,
            ManagedResource::Bucket(r) | ManagedResource::BucketPolicy(r) => &r.name,
        }
    }

    /// Kind name used in errors and events
    pub fn kind(&self) -> &'static str {
        match self {
            ManagedResource::BucketPolicyMember(_) => "BucketPolicyMember",
            ManagedResource::Bucket(_) => "Bucket",
            ManagedResource::BucketPolicy(_) => "BucketPolicy",
        }
    }

    /// Whether the host asked for this declaration to be torn down
    pub fn deletion_requested(&self) -> bool {
        matches!(self, ManagedResource::BucketPolicyMember(m) if m.deletion_requested)
    }

    pub fn status(&self) -> Option<&ResourceStatus> {
        match self {
            ManagedResource::BucketPolicyMember(m) => Some(&m.status),
            _ => None,
        }
    }

    pub fn status_mut(&mut self) -> Option<&mut ResourceStatus> {
        match self {
            ManagedResource::BucketPolicyMember(m) => Some(&mut m.status),
            _ => None,
        }
    }

    pub(crate) fn policy_member(&self, phase: Phase) -> Result<&BucketPolicyMember> {
        match self {
            ManagedResource::BucketPolicyMember(m) => Ok(m),
            other => Err(ReconcileError::UnexpectedKind {
                phase,
                kind: other.kind().to_string(),
            }),
        }
    }

    pub(crate) fn policy_member_mut(&mut self, phase: Phase) -> Result<&mut BucketPolicyMember> {
        match self {
            ManagedResource::BucketPolicyMember(m) => Ok(m),
            other => Err(ReconcileError::UnexpectedKind {
                phase,
                kind: other.kind().to_string(),
            }),
        }
    }
}

impl From<BucketPolicyMember> for ManagedResource {
    fn from(member: BucketPolicyMember) -> Self {
        ManagedResource::BucketPolicyMember(member)
    }
}

/// Declared binding of one member to one role on a bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketPolicyMember {
    /// Declaration name
    pub name: String,

    /// Bucket whose policy is managed
    pub bucket: ResourceId,

    /// Desired binding
    #[serde(flatten)]
    pub spec: DesiredBindingSpec,

    /// Set by the host once the declaration should be torn down
    #[serde(default)]
    pub deletion_requested: bool,

    #[serde(default, skip_deserializing)]
    pub status: ResourceStatus,
}

impl BucketPolicyMember {
    pub fn new(name: impl Into<String>, bucket: ResourceId, spec: DesiredBindingSpec) -> Self {
        Self {
            name: name.into(),
            bucket,
            spec,
            deletion_requested: false,
            status: ResourceStatus::default(),
        }
    }
}

/// Readiness of the external resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    #[default]
    Unknown,
    Available,
    Creating,
    Deleting,
}

/// Outcome of the most recent reconcile pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Unknown,
    Synced,
    /// Still not up to date after repeated updates
    Stalled { passes: u32 },
    Error { message: String },
}

/// Status reported back to the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStatus {
    pub readiness: Readiness,
    pub sync: SyncState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition: Option<DateTime<Utc>>,
}

impl ResourceStatus {
    pub fn set_readiness(&mut self, readiness: Readiness) {
        if self.readiness != readiness {
            self.readiness = readiness;
            self.last_transition = Some(Utc::now());
        }
    }

    pub fn set_sync(&mut self, sync: SyncState) {
        if self.sync != sync {
            self.sync = sync;
            self.last_transition = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_round_trips_from_json() {
        let mg: ManagedResource = serde_json::from_value(serde_json::json!({
            "kind": "BucketPolicyMember",
            "name": "public-read",
            "bucket": "assets",
            "role": "roles/storage.objectViewer",
            "member": "allUsers"
        }))
        .unwrap();

        let member = mg.policy_member(Phase::Observe).unwrap();
        assert_eq!(member.bucket.as_str(), "assets");
        assert_eq!(member.spec, DesiredBindingSpec::present("roles/storage.objectViewer", "allUsers"));
        assert!(!member.deletion_requested);
        assert_eq!(mg.name(), "public-read");
    }

    #[test]
    fn test_other_kinds_are_rejected() {
        let mut mg: ManagedResource = serde_json::from_value(serde_json::json!({
            "kind": "Bucket",
            "name": "assets"
        }))
        .unwrap();
        assert_eq!(mg.kind(), "Bucket");

        let err = mg.policy_member_mut(Phase::Update).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::UnexpectedKind { phase: Phase::Update, ref kind } if kind == "Bucket"
        ));
    }

    #[test]
    fn test_status_transition_time_moves_on_change_only() {
        let mut status = ResourceStatus::default();
        status.set_readiness(Readiness::Available);
        let first = status.last_transition;
        assert!(first.is_some());

        status.set_readiness(Readiness::Available);
        assert_eq!(status.last_transition, first);
    }
}
