//! In-memory registry of managed declarations

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::resource::{ManagedResource, ResourceStatus};

/// Declarations the host reconciles, keyed by name
#[derive(Debug, Default)]
pub struct DeclarationStore {
    declarations: RwLock<HashMap<String, ManagedResource>>,
}

impl DeclarationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a declaration. A replaced declaration keeps its
    /// reported status.
    pub async fn upsert(&self, mut mg: ManagedResource) {
        let name = mg.name().to_string();
        let mut declarations = self.declarations.write().await;
        if let (
            Some(ManagedResource::BucketPolicyMember(old)),
            ManagedResource::BucketPolicyMember(new),
        ) = (declarations.get(&name), &mut mg)
        {
            new.status = old.status.clone();
        }
        declarations.insert(name, mg);
    }

    pub async fn get(&self, name: &str) -> Option<ManagedResource> {
        self.declarations.read().await.get(name).cloned()
    }

    /// Names of all declarations, sorted
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.declarations.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.declarations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.declarations.read().await.is_empty()
    }

    /// Mark a declaration for teardown on the next pass
    pub async fn request_deletion(&self, name: &str) -> bool {
        match self.declarations.write().await.get_mut(name) {
            Some(ManagedResource::BucketPolicyMember(m)) => {
                m.deletion_requested = true;
                true
            }
            _ => false,
        }
    }

    /// Record the status from a finished pass, leaving the declared fields
    /// untouched
    pub async fn update_status(&self, name: &str, status: ResourceStatus) {
        if let Some(ManagedResource::BucketPolicyMember(m)) =
            self.declarations.write().await.get_mut(name)
        {
            m.status = status;
        }
    }

    pub async fn status(&self, name: &str) -> Option<ResourceStatus> {
        match self.declarations.read().await.get(name) {
            Some(ManagedResource::BucketPolicyMember(m)) => Some(m.status.clone()),
            _ => None,
        }
    }

    pub async fn remove(&self, name: &str) -> Option<ManagedResource> {
        self.declarations.write().await.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{BucketPolicyMember, Readiness};
    use iamsync_types::{DesiredBindingSpec, ResourceId};

    fn member(name: &str, role: &str) -> ManagedResource {
        BucketPolicyMember::new(
            name,
            ResourceId::new("assets").unwrap(),
            DesiredBindingSpec::present(role, "allUsers"),
        )
        .into()
    }

    #[tokio::test]
    async fn test_upsert_keeps_status() {
        let store = DeclarationStore::new();
        store.upsert(member("a", "roles/viewer")).await;

        let mut status = ResourceStatus::default();
        status.set_readiness(Readiness::Available);
        store.update_status("a", status.clone()).await;

        store.upsert(member("a", "roles/editor")).await;
        assert_eq!(store.status("a").await, Some(status));

        let ManagedResource::BucketPolicyMember(m) = store.get("a").await.unwrap() else {
            panic!("expected policy member");
        };
        assert_eq!(m.spec.role, "roles/editor");
    }

    #[tokio::test]
    async fn test_request_deletion_and_remove() {
        let store = DeclarationStore::new();
        store.upsert(member("b", "roles/viewer")).await;
        store.upsert(member("a", "roles/viewer")).await;
        assert_eq!(store.names().await, vec!["a", "b"]);

        assert!(store.request_deletion("a").await);
        assert!(!store.request_deletion("missing").await);

        assert!(store.remove("a").await.is_some());
        assert_eq!(store.len().await, 1);
    }
}
