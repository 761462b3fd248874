//! Error types for the diff engine

use thiserror::Error;

/// A fetched document the engine refuses to reason about
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralPolicyError {
    /// More than one binding names the same role
    #[error("Duplicate bindings for role {role}")]
    DuplicateRole { role: String },

    /// Version outside the range the remote API defines
    #[error("Unsupported policy version {version}")]
    UnsupportedVersion { version: i64 },

    /// Conditional binding in a document below the conditional version
    #[error("Conditional binding for role {role} requires policy version 3, found {version}")]
    ConditionRequiresVersion { role: String, version: i64 },
}

/// Result type for diff engine checks
pub type Result<T> = std::result::Result<T, StructuralPolicyError>;
