//! In-memory policy transport for development and testing

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use iamsync_types::{PolicyDocument, ResourceId};
use tokio::sync::RwLock;

use crate::error::TransportError;
use crate::transport::{PolicyTransport, TransportResult};

/// Remote resources and their policies, held in memory.
///
/// Supports injected failures and artificial latency so driver behaviour
/// under transport errors and cancellation can be exercised.
#[derive(Debug, Default)]
pub struct InMemoryPolicyTransport {
    policies: RwLock<HashMap<ResourceId, PolicyDocument>>,
    get_failures: RwLock<VecDeque<TransportError>>,
    set_failures: RwLock<VecDeque<TransportError>>,
    requested_versions: RwLock<Vec<i64>>,
    latency: RwLock<Option<Duration>>,
    get_calls: AtomicU64,
    set_calls: AtomicU64,
}

impl InMemoryPolicyTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource with no policy attached
    pub async fn insert_resource(&self, resource: ResourceId) {
        self.policies
            .write()
            .await
            .entry(resource)
            .or_insert_with(PolicyDocument::new);
    }

    /// Register a resource with `policy` attached, replacing any existing one
    pub async fn insert_policy(&self, resource: ResourceId, policy: PolicyDocument) {
        self.policies.write().await.insert(resource, policy);
    }

    /// Current stored policy
    pub async fn policy(&self, resource: &ResourceId) -> Option<PolicyDocument> {
        self.policies.read().await.get(resource).cloned()
    }

    /// Fail the next `get_policy` call with `err`
    pub async fn fail_next_get(&self, err: TransportError) {
        self.get_failures.write().await.push_back(err);
    }

    /// Fail the next `set_policy` call with `err`
    pub async fn fail_next_set(&self, err: TransportError) {
        self.set_failures.write().await.push_back(err);
    }

    /// Delay every call by `latency`
    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write().await = latency;
    }

    /// Versions requested by `get_policy`, in call order
    pub async fn requested_versions(&self) -> Vec<i64> {
        self.requested_versions.read().await.clone()
    }

    pub fn get_calls(&self) -> u64 {
        self.get_calls.load(Ordering::Relaxed)
    }

    pub fn set_calls(&self) -> u64 {
        self.set_calls.load(Ordering::Relaxed)
    }

    async fn delay(&self) {
        let latency = *self.latency.read().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl PolicyTransport for InMemoryPolicyTransport {
    async fn get_policy(
        &self,
        resource: &ResourceId,
        requested_version: i64,
    ) -> TransportResult<PolicyDocument> {
        self.get_calls.fetch_add(1, Ordering::Relaxed);
        self.requested_versions.write().await.push(requested_version);
        self.delay().await;

        if let Some(err) = self.get_failures.write().await.pop_front() {
            return Err(err);
        }

        self.policies
            .read()
            .await
            .get(resource)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(resource.to_string()))
    }

    async fn set_policy(
        &self,
        resource: &ResourceId,
        policy: PolicyDocument,
    ) -> TransportResult<()> {
        self.set_calls.fetch_add(1, Ordering::Relaxed);
        self.delay().await;

        if let Some(err) = self.set_failures.write().await.pop_front() {
            return Err(err);
        }

        let mut policies = self.policies.write().await;
        match policies.get_mut(resource) {
            Some(existing) => {
                *existing = policy;
                Ok(())
            }
            None => Err(TransportError::NotFound(resource.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iamsync_types::Binding;

    fn bucket() -> ResourceId {
        ResourceId::new("assets").unwrap()
    }

    #[tokio::test]
    async fn test_missing_resource_is_not_found() {
        let transport = InMemoryPolicyTransport::new();
        let err = transport.get_policy(&bucket(), 3).await.unwrap_err();
        assert!(err.is_not_found());

        let err = transport
            .set_policy(&bucket(), PolicyDocument::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_set_replaces_whole_document() {
        let transport = InMemoryPolicyTransport::new();
        transport
            .insert_policy(
                bucket(),
                PolicyDocument::new().with_binding(Binding::new("roles/viewer").with_member("allUsers")),
            )
            .await;

        let replacement =
            PolicyDocument::new().with_binding(Binding::new("roles/editor").with_member("user:a@example.com"));
        transport
            .set_policy(&bucket(), replacement.clone())
            .await
            .unwrap();

        assert_eq!(transport.policy(&bucket()).await, Some(replacement));
        assert_eq!(transport.set_calls(), 1);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed_once() {
        let transport = InMemoryPolicyTransport::new();
        transport.insert_resource(bucket()).await;
        transport
            .fail_next_get(TransportError::Request("boom".into()))
            .await;

        assert!(transport.get_policy(&bucket(), 3).await.is_err());
        assert_eq!(
            transport.get_policy(&bucket(), 3).await.unwrap(),
            PolicyDocument::new()
        );
        assert_eq!(transport.requested_versions().await, vec![3, 3]);
        assert_eq!(transport.get_calls(), 2);
    }
}
