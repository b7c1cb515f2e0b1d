//! Resource store - the seam between the engine and wherever resources live
//!
//! The engine only needs get/update on routing resources and create on
//! policy resources. Backends report failures as [`StoreError`]; the engine
//! attaches action context before surfacing them.

pub mod filesystem;
pub mod memory;

pub use filesystem::FilesystemStore;
pub use memory::{MemoryStore, StoreCalls};

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{PolicyResource, ResourceKind, RoutingResource};

/// Failure reported by a store backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: ResourceKind,
        namespace: String,
        name: String,
    },

    #[error("{kind} {namespace}/{name} has version {actual}, write was based on {expected}")]
    Conflict {
        kind: ResourceKind,
        namespace: String,
        name: String,
        expected: String,
        actual: String,
    },

    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: ResourceKind,
        namespace: String,
        name: String,
    },

    #[error("{0}")]
    Transport(String),
}

impl StoreError {
    pub fn not_found(kind: ResourceKind, namespace: &str, name: &str) -> Self {
        Self::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn already_exists(kind: ResourceKind, namespace: &str, name: &str) -> Self {
        Self::AlreadyExists {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}

/// Storage for routing and policy resources
///
/// Writes are single atomic calls: a failed `update_routing` leaves the
/// stored resource unchanged.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch a routing resource
    async fn get_routing(&self, namespace: &str, name: &str)
        -> Result<RoutingResource, StoreError>;

    /// Replace a routing resource, rejecting writes based on a stale version
    async fn update_routing(&self, resource: RoutingResource)
        -> Result<RoutingResource, StoreError>;

    /// Create a policy resource; fails with `AlreadyExists` on collision
    async fn create_policy(&self, policy: PolicyResource) -> Result<PolicyResource, StoreError>;

    /// Fetch a policy resource
    async fn get_policy(&self, namespace: &str, name: &str) -> Result<PolicyResource, StoreError>;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Version assigned to a resource on its first write
pub(crate) const INITIAL_VERSION: &str = "1";

/// Next version after `current`; unversioned or opaque versions restart at 1
pub(crate) fn next_version(current: Option<&str>) -> Result<String, StoreError> {
    match current.and_then(|v| v.parse::<u64>().ok()) {
        Some(v) => v
            .checked_add(1)
            .map(|next| next.to_string())
            .ok_or_else(|| StoreError::transport(format!("resource version {} cannot be advanced", v))),
        None => Ok(INITIAL_VERSION.to_string()),
    }
}

/// Reject a write whose version differs from the stored one
pub(crate) fn check_version(
    kind: ResourceKind,
    stored: Option<&str>,
    incoming: &RoutingResource,
) -> Result<(), StoreError> {
    match (incoming.metadata.resource_version.as_deref(), stored) {
        (Some(expected), Some(actual)) if expected != actual => Err(StoreError::Conflict {
            kind,
            namespace: incoming.namespace().to_string(),
            name: incoming.name().to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }),
        _ => Ok(()),
    }
}
