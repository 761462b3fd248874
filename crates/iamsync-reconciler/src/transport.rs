//! Remote policy transport seam
//!
//! Credential handling and the wire client live behind this trait. The
//! remote API has no partial-update semantics: reads return the whole
//! document and writes replace it.

use async_trait::async_trait;
use iamsync_types::{PolicyDocument, ResourceId};

use crate::error::TransportError;

/// Result type for transport calls
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Client for a remote resource's IAM policy.
///
/// Dropping a returned future must abort the call; the driver relies on this
/// to honour cancellation.
#[async_trait]
pub trait PolicyTransport: Send + Sync {
    /// Fetch the current policy, asking for `requested_version` format.
    ///
    /// Returns [`TransportError::NotFound`] when the resource itself is
    /// missing. A resource with no policy attached yields an empty document.
    async fn get_policy(
        &self,
        resource: &ResourceId,
        requested_version: i64,
    ) -> TransportResult<PolicyDocument>;

    /// Replace the resource's entire policy with `policy`
    async fn set_policy(&self, resource: &ResourceId, policy: PolicyDocument)
        -> TransportResult<()>;
}
