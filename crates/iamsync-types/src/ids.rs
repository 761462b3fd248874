//! Strongly-typed identifiers for managed remote resources

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Name of the remote resource whose policy is managed (e.g. a bucket)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

/// Rejected resource identifiers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceIdError {
    #[error("resource id must not be empty")]
    Empty,
}

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Result<Self, ResourceIdError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ResourceIdError::Empty);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResourceId {
    type Error = ResourceIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
