//! Observe/create/update/delete driver for one bucket policy binding
//!
//! Each phase performs at most one corrective write. Writes always replace
//! the whole remote document; there is no concurrency token, so an edit made
//! by another writer between the read and the write of a phase is lost
//! (last write wins).

use std::sync::Arc;

use iamsync_policy::{apply_at, bind_at, is_empty, is_up_to_date, validate_document};
use iamsync_types::{Ensure, PolicyDocument, ResourceId};
use tracing::{debug, info};

use crate::cancel::CancelSignal;
use crate::error::{Phase, ReconcileError, Result};
use crate::resource::{BucketPolicyMember, ManagedResource, Readiness};
use crate::transport::PolicyTransport;

/// What Observe learned about the external resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Observation {
    pub resource_exists: bool,
    pub resource_up_to_date: bool,
}

/// Classification of an [`Observation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedState {
    NonExistent,
    UpToDate,
    NotUpToDate,
}

impl Observation {
    pub fn state(&self) -> ObservedState {
        match (self.resource_exists, self.resource_up_to_date) {
            (false, _) => ObservedState::NonExistent,
            (true, true) => ObservedState::UpToDate,
            (true, false) => ObservedState::NotUpToDate,
        }
    }
}

/// Result of an Update phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The fresh document had already converged; nothing was written
    AlreadyConverged,
    /// A corrected document was written
    Written,
}

/// Drives a [`BucketPolicyMember`] declaration against a remote policy
#[derive(Clone)]
pub struct PolicyMemberExternal {
    transport: Arc<dyn PolicyTransport>,
    policy_version: i64,
}

impl PolicyMemberExternal {
    /// Create a driver requesting `policy_version` on every read and stamping
    /// it on every document it corrects
    pub fn new(transport: Arc<dyn PolicyTransport>, policy_version: i64) -> Self {
        Self {
            transport,
            policy_version,
        }
    }

    /// Classify the remote state. Never writes.
    ///
    /// A missing resource and a policy without bindings both report
    /// non-existence.
    pub async fn observe(
        &self,
        mg: &mut ManagedResource,
        cancel: &CancelSignal,
    ) -> Result<Observation> {
        let phase = Phase::Observe;
        let cr = member(mg, phase)?;

        let doc = match self.fetch(phase, &cr.bucket, cancel).await {
            Ok(doc) => doc,
            Err(ReconcileError::GetPolicy { source, .. }) if source.is_not_found() => {
                debug!(resource = %cr.bucket, "Resource not found");
                return Ok(Observation::default());
            }
            Err(e) => return Err(e),
        };

        if is_empty(&doc) {
            debug!(resource = %cr.bucket, "Policy has no bindings");
            return Ok(Observation::default());
        }

        cr.status.set_readiness(Readiness::Available);

        let up_to_date = is_up_to_date(&cr.spec, &doc)
            .map_err(|source| ReconcileError::CheckUpToDate { phase, source })?;

        debug!(
            resource = %cr.bucket,
            role = %cr.spec.role,
            member = %cr.spec.member,
            up_to_date,
            "Observed policy"
        );

        Ok(Observation {
            resource_exists: true,
            resource_up_to_date: up_to_date,
        })
    }

    /// Write a fresh document holding only the desired binding.
    ///
    /// Single attempt; a failed write is returned to the host. An absent
    /// binding is already satisfied by a missing policy, so nothing is
    /// written for [`Ensure::Absent`].
    pub async fn create(&self, mg: &mut ManagedResource, cancel: &CancelSignal) -> Result<()> {
        let phase = Phase::Create;
        let cr = member(mg, phase)?;
        cr.status.set_readiness(Readiness::Creating);

        if cr.spec.ensure == Ensure::Absent {
            debug!(resource = %cr.bucket, role = %cr.spec.role, "Nothing to create for absent binding");
            return Ok(());
        }

        let mut doc = PolicyDocument::new();
        bind_at(&cr.spec, &mut doc, self.policy_version);

        self.store(phase, &cr.bucket, doc, cancel).await?;
        info!(
            resource = %cr.bucket,
            role = %cr.spec.role,
            member = %cr.spec.member,
            "Created policy binding"
        );
        Ok(())
    }

    /// Re-fetch, re-check and, if still needed, correct and write back.
    ///
    /// The observation that led here is never trusted: the document is read
    /// again because the remote side may have changed since.
    pub async fn update(
        &self,
        mg: &mut ManagedResource,
        cancel: &CancelSignal,
    ) -> Result<UpdateOutcome> {
        let phase = Phase::Update;
        let cr = member(mg, phase)?;

        let mut doc = self.fetch(phase, &cr.bucket, cancel).await?;

        let up_to_date = is_up_to_date(&cr.spec, &doc)
            .map_err(|source| ReconcileError::CheckUpToDate { phase, source })?;
        if up_to_date {
            debug!(resource = %cr.bucket, "Policy converged since last observation");
            return Ok(UpdateOutcome::AlreadyConverged);
        }

        if !apply_at(&cr.spec, &mut doc, self.policy_version) {
            return Ok(UpdateOutcome::AlreadyConverged);
        }

        self.store(phase, &cr.bucket, doc, cancel).await?;
        info!(
            resource = %cr.bucket,
            role = %cr.spec.role,
            member = %cr.spec.member,
            ensure = ?cr.spec.ensure,
            "Updated policy binding"
        );
        Ok(UpdateOutcome::Written)
    }

    /// Replace the remote policy with an empty document.
    ///
    /// This clears every binding on the resource, including ones this
    /// driver never managed.
    pub async fn delete(&self, mg: &mut ManagedResource, cancel: &CancelSignal) -> Result<()> {
        let phase = Phase::Delete;
        let cr = member(mg, phase)?;
        cr.status.set_readiness(Readiness::Deleting);

        self.store(phase, &cr.bucket, PolicyDocument::new(), cancel)
            .await?;
        info!(resource = %cr.bucket, "Cleared policy");
        Ok(())
    }

    async fn fetch(
        &self,
        phase: Phase,
        resource: &ResourceId,
        cancel: &CancelSignal,
    ) -> Result<PolicyDocument> {
        cancel
            .guard(
                phase,
                self.transport.get_policy(resource, self.policy_version),
            )
            .await?
            .map_err(|source| ReconcileError::GetPolicy {
                phase,
                resource: resource.clone(),
                source,
            })
    }

    async fn store(
        &self,
        phase: Phase,
        resource: &ResourceId,
        doc: PolicyDocument,
        cancel: &CancelSignal,
    ) -> Result<()> {
        validate_document(&doc).map_err(|source| ReconcileError::MalformedPolicy {
            phase,
            resource: resource.clone(),
            source,
        })?;

        cancel
            .guard(phase, self.transport.set_policy(resource, doc))
            .await?
            .map_err(|source| ReconcileError::SetPolicy {
                phase,
                resource: resource.clone(),
                source,
            })
    }
}

fn member(mg: &mut ManagedResource, phase: Phase) -> Result<&mut BucketPolicyMember> {
    let cr = mg.policy_member_mut(phase)?;
    cr.spec
        .validate()
        .map_err(|source| ReconcileError::InvalidSpec { phase, source })?;
    Ok(cr)
}
