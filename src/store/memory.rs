//! Memory Store - In-memory resource storage
//!
//! Ephemeral store backed by HashMaps. Records how many calls of each kind
//! it served and can be primed to fail the next call, which makes it the
//! store of choice for exercising the engine in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::trace;

use super::{check_version, next_version, ResourceStore, StoreError, INITIAL_VERSION};
use crate::model::{PolicyResource, ResourceKind, RoutingResource};

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

/// Snapshot of calls served by a [`MemoryStore`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCalls {
    pub gets: usize,
    pub updates: usize,
    pub creates: usize,
}

impl StoreCalls {
    /// Calls that attempted to change stored state
    pub fn writes(&self) -> usize {
        self.updates + self.creates
    }
}

#[derive(Debug, Default)]
struct CallCounters {
    gets: AtomicUsize,
    updates: AtomicUsize,
    creates: AtomicUsize,
}

/// In-memory store implementation
#[derive(Default)]
pub struct MemoryStore {
    routing: Arc<RwLock<HashMap<Key, RoutingResource>>>,
    policies: Arc<RwLock<HashMap<Key, PolicyResource>>>,
    counters: CallCounters,
    /// Error to return on next call (if set)
    next_error: Arc<Mutex<Option<StoreError>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given routing resources
    pub async fn with_routing(resources: Vec<RoutingResource>) -> Self {
        let store = Self::new();
        for resource in resources {
            store.insert_routing(resource).await;
        }
        store
    }

    /// Seed a routing resource without counting it as a call
    pub async fn insert_routing(&self, mut resource: RoutingResource) {
        if resource.metadata.resource_version.is_none() {
            resource.metadata.resource_version = Some(INITIAL_VERSION.to_string());
        }
        let mut routing = self.routing.write().await;
        routing.insert(key(resource.namespace(), resource.name()), resource);
    }

    /// Seed a policy resource without counting it as a call
    pub async fn insert_policy(&self, policy: PolicyResource) {
        let mut policies = self.policies.write().await;
        policies.insert(key(policy.namespace(), policy.name()), policy);
    }

    /// Current stored copy of a routing resource
    pub async fn routing(&self, namespace: &str, name: &str) -> Option<RoutingResource> {
        self.routing.read().await.get(&key(namespace, name)).cloned()
    }

    /// Current stored copy of a policy resource
    pub async fn policy(&self, namespace: &str, name: &str) -> Option<PolicyResource> {
        self.policies.read().await.get(&key(namespace, name)).cloned()
    }

    pub async fn policy_count(&self) -> usize {
        self.policies.read().await.len()
    }

    /// Set an error to be returned on the next call
    pub async fn fail_next(&self, error: StoreError) {
        let mut next = self.next_error.lock().await;
        *next = Some(error);
    }

    pub fn calls(&self) -> StoreCalls {
        StoreCalls {
            gets: self.counters.gets.load(Ordering::Relaxed),
            updates: self.counters.updates.load(Ordering::Relaxed),
            creates: self.counters.creates.load(Ordering::Relaxed),
        }
    }

    async fn take_injected(&self) -> Result<(), StoreError> {
        match self.next_error.lock().await.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get_routing(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<RoutingResource, StoreError> {
        self.counters.gets.fetch_add(1, Ordering::Relaxed);
        self.take_injected().await?;

        self.routing
            .read()
            .await
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| StoreError::not_found(ResourceKind::VirtualService, namespace, name))
    }

    async fn update_routing(
        &self,
        mut resource: RoutingResource,
    ) -> Result<RoutingResource, StoreError> {
        self.counters.updates.fetch_add(1, Ordering::Relaxed);
        self.take_injected().await?;

        let mut routing = self.routing.write().await;
        let k = key(resource.namespace(), resource.name());
        let stored = routing.get(&k).ok_or_else(|| {
            StoreError::not_found(
                ResourceKind::VirtualService,
                resource.namespace(),
                resource.name(),
            )
        })?;

        let current = stored.metadata.resource_version.clone();
        check_version(ResourceKind::VirtualService, current.as_deref(), &resource)?;

        resource.metadata.resource_version = Some(next_version(current.as_deref())?);
        trace!(
            "memory store: {} now at version {:?}",
            resource.key(),
            resource.metadata.resource_version
        );
        routing.insert(k, resource.clone());
        Ok(resource)
    }

    async fn create_policy(&self, mut policy: PolicyResource) -> Result<PolicyResource, StoreError> {
        self.counters.creates.fetch_add(1, Ordering::Relaxed);
        self.take_injected().await?;

        let mut policies = self.policies.write().await;
        let k = key(policy.namespace(), policy.name());
        if policies.contains_key(&k) {
            return Err(StoreError::already_exists(
                ResourceKind::DestinationRule,
                policy.namespace(),
                policy.name(),
            ));
        }

        policy.metadata.resource_version = Some(INITIAL_VERSION.to_string());
        policies.insert(k, policy.clone());
        Ok(policy)
    }

    async fn get_policy(&self, namespace: &str, name: &str) -> Result<PolicyResource, StoreError> {
        self.counters.gets.fetch_add(1, Ordering::Relaxed);
        self.take_injected().await?;

        self.policies
            .read()
            .await
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| StoreError::not_found(ResourceKind::DestinationRule, namespace, name))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
