//! Error types for the reconciliation driver

use std::fmt;

use iamsync_policy::StructuralPolicyError;
use iamsync_types::{ResourceId, SpecValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle phase an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Observe,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Observe => write!(f, "observe"),
            Phase::Create => write!(f, "create"),
            Phase::Update => write!(f, "update"),
            Phase::Delete => write!(f, "delete"),
        }
    }
}

/// Failures reported by a remote policy transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The resource does not exist remotely
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authentication or authorization failure
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Any other request failure
    #[error("Request failed: {0}")]
    Request(String),
}

impl TransportError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::NotFound(_))
    }
}

/// Errors returned by a driver phase to the control-loop host
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The managed declaration is of a kind this driver does not own
    #[error("{phase}: managed resource is not a bucket policy member (kind {kind})")]
    UnexpectedKind { phase: Phase, kind: String },

    /// Declared binding failed validation
    #[error("{phase}: invalid binding spec: {source}")]
    InvalidSpec {
        phase: Phase,
        source: SpecValidationError,
    },

    /// Fetched document is structurally malformed
    #[error("{phase}: cannot determine if policy is up to date: {source}")]
    CheckUpToDate {
        phase: Phase,
        source: StructuralPolicyError,
    },

    /// A corrected document would be malformed at the configured version
    #[error("{phase}: refusing to write policy for {resource}: {source}")]
    MalformedPolicy {
        phase: Phase,
        resource: ResourceId,
        source: StructuralPolicyError,
    },

    /// Reading the remote policy failed
    #[error("{phase}: cannot get policy for {resource}: {source}")]
    GetPolicy {
        phase: Phase,
        resource: ResourceId,
        source: TransportError,
    },

    /// Writing the remote policy failed
    #[error("{phase}: cannot set policy for {resource}: {source}")]
    SetPolicy {
        phase: Phase,
        resource: ResourceId,
        source: TransportError,
    },

    /// The phase was cancelled before the remote call completed
    #[error("{phase}: cancelled")]
    Cancelled { phase: Phase },
}

impl ReconcileError {
    /// Phase the error was raised in
    pub fn phase(&self) -> Phase {
        match self {
            ReconcileError::UnexpectedKind { phase, .. }
            | ReconcileError::InvalidSpec { phase, .. }
            | ReconcileError::CheckUpToDate { phase, .. }
            | ReconcileError::MalformedPolicy { phase, .. }
            | ReconcileError::GetPolicy { phase, .. }
            | ReconcileError::SetPolicy { phase, .. }
            | ReconcileError::Cancelled { phase } => *phase,
        }
    }

    /// Whether retrying the same declaration later could succeed without a
    /// change to the declaration itself
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ReconcileError::GetPolicy { .. }
                | ReconcileError::SetPolicy { .. }
                | ReconcileError::CheckUpToDate { .. }
                | ReconcileError::Cancelled { .. }
        )
    }
}

/// Result type for driver phases
pub type Result<T> = std::result::Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_carries_phase_context() {
        let err = ReconcileError::GetPolicy {
            phase: Phase::Update,
            resource: ResourceId::new("assets").unwrap(),
            source: TransportError::Request("connection reset".into()),
        };
        assert_eq!(err.phase(), Phase::Update);
        assert_eq!(
            err.to_string(),
            "update: cannot get policy for assets: Request failed: connection reset"
        );
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.is_transient());
    }

    #[test]
    fn test_spec_errors_are_not_transient() {
        let err = ReconcileError::InvalidSpec {
            phase: Phase::Observe,
            source: SpecValidationError::EmptyMember,
        };
        assert!(!err.is_transient());
        assert!(!ReconcileError::UnexpectedKind {
            phase: Phase::Create,
            kind: "Bucket".into()
        }
        .is_transient());
    }

    #[test]
    fn test_malformed_write_is_not_transient() {
        let err = ReconcileError::MalformedPolicy {
            phase: Phase::Update,
            resource: ResourceId::new("assets").unwrap(),
            source: StructuralPolicyError::ConditionRequiresVersion {
                role: "roles/viewer".into(),
                version: 1,
            },
        };
        assert_eq!(err.phase(), Phase::Update);
        assert!(!err.is_transient());
    }
}
