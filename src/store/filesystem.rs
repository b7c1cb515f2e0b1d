//! Filesystem Store - JSON documents on local disk
//!
//! Layout:
//!
//! ```text
//! <root>/<namespace>/virtualservices/<name>.json
//! <root>/<namespace>/destinationrules/<name>.json
//! ```
//!
//! Every write goes to a temporary file first. Updates rename it over the
//! original and creates hard-link it into place, so a failed write never
//! leaves a half-written resource behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{check_version, next_version, ResourceStore, StoreError, INITIAL_VERSION};
use crate::model::{ObjectMeta, PolicyResource, ResourceKind, RoutingResource};

/// Get the default store path
pub fn default_store_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".meshroute")
        .join("store")
}

/// Filesystem-based store implementation
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the document for a resource
    pub fn path_for(&self, kind: ResourceKind, namespace: &str, name: &str) -> PathBuf {
        self.root
            .join(namespace)
            .join(kind.plural())
            .join(format!("{}.json", name))
    }

    /// Write a routing resource as-is, creating or replacing it
    pub async fn put_routing(&self, resource: &RoutingResource) -> Result<(), StoreError> {
        let path = self.path_for(
            ResourceKind::VirtualService,
            resource.namespace(),
            resource.name(),
        );
        write_atomic(&path, resource).await
    }

    async fn read_document<T: DeserializeOwned>(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<T, StoreError> {
        let path = self.path_for(kind, namespace, name);
        let contents = match fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::not_found(kind, namespace, name))
            }
            Err(e) => {
                return Err(StoreError::transport(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        serde_json::from_slice(&contents).map_err(|e| {
            StoreError::transport(format!("failed to decode {}: {}", path.display(), e))
        })
    }
}

/// A document must describe the resource its path names; writes derive the
/// path from the metadata
fn check_location(
    path: &Path,
    metadata: &ObjectMeta,
    namespace: &str,
    name: &str,
) -> Result<(), StoreError> {
    if metadata.namespace != namespace || metadata.name != name {
        return Err(StoreError::transport(format!(
            "document name mismatch: {} describes {} instead of {}/{}",
            path.display(),
            metadata.key(),
            namespace,
            name
        )));
    }
    Ok(())
}

/// Write `value` next to `path` and flush it, returning the temporary path
async fn write_temp<T: serde::Serialize>(path: &Path, value: &T) -> Result<PathBuf, StoreError> {
    let io_err = |e: std::io::Error| {
        StoreError::transport(format!("failed to write {}: {}", path.display(), e))
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let contents = serde_json::to_vec_pretty(value)
        .map_err(|e| StoreError::transport(format!("failed to encode resource: {}", e)))?;

    let tmp = path.with_extension("json.tmp");
    let mut file = fs::File::create(&tmp).await.map_err(io_err)?;
    file.write_all(&contents).await.map_err(io_err)?;
    file.sync_all().await.map_err(io_err)?;
    Ok(tmp)
}

async fn write_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let tmp = write_temp(path, value).await?;
    fs::rename(&tmp, path).await.map_err(|e| {
        StoreError::transport(format!("failed to write {}: {}", path.display(), e))
    })
}

#[async_trait]
impl ResourceStore for FilesystemStore {
    async fn get_routing(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<RoutingResource, StoreError> {
        let mut resource: RoutingResource = self
            .read_document(ResourceKind::VirtualService, namespace, name)
            .await?;

        // Documents written by hand may omit these
        if resource.metadata.namespace.is_empty() {
            resource.metadata.namespace = namespace.to_string();
        }
        check_location(
            &self.path_for(ResourceKind::VirtualService, namespace, name),
            &resource.metadata,
            namespace,
            name,
        )?;
        if resource.metadata.resource_version.is_none() {
            resource.metadata.resource_version = Some(INITIAL_VERSION.to_string());
        }
        Ok(resource)
    }

    async fn update_routing(
        &self,
        mut resource: RoutingResource,
    ) -> Result<RoutingResource, StoreError> {
        let stored = self
            .get_routing(resource.namespace(), resource.name())
            .await?;
        let current = stored.metadata.resource_version;
        check_version(ResourceKind::VirtualService, current.as_deref(), &resource)?;

        resource.metadata.resource_version = Some(next_version(current.as_deref())?);
        let path = self.path_for(
            ResourceKind::VirtualService,
            resource.namespace(),
            resource.name(),
        );
        write_atomic(&path, &resource).await?;

        debug!("Wrote {} to {}", resource.key(), path.display());
        Ok(resource)
    }

    async fn create_policy(&self, mut policy: PolicyResource) -> Result<PolicyResource, StoreError> {
        let path = self.path_for(
            ResourceKind::DestinationRule,
            policy.namespace(),
            policy.name(),
        );

        policy.metadata.resource_version = Some(INITIAL_VERSION.to_string());
        let tmp = write_temp(&path, &policy).await?;

        // Linking never replaces an existing file and only publishes a fully written one
        let linked = fs::hard_link(&tmp, &path).await;
        if let Err(e) = fs::remove_file(&tmp).await {
            debug!("Failed to remove {}: {}", tmp.display(), e);
        }

        match linked {
            Ok(()) => {
                debug!("Created {} at {}", policy.key(), path.display());
                Ok(policy)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(StoreError::already_exists(
                ResourceKind::DestinationRule,
                policy.namespace(),
                policy.name(),
            )),
            Err(e) => Err(StoreError::transport(format!(
                "failed to create {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn get_policy(&self, namespace: &str, name: &str) -> Result<PolicyResource, StoreError> {
        let mut policy: PolicyResource = self
            .read_document(ResourceKind::DestinationRule, namespace, name)
            .await?;

        if policy.metadata.namespace.is_empty() {
            policy.metadata.namespace = namespace.to_string();
        }
        check_location(
            &self.path_for(ResourceKind::DestinationRule, namespace, name),
            &policy.metadata,
            namespace,
            name,
        )?;
        Ok(policy)
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Destination, RouteDestination, Rule};

    fn store() -> (tempfile::TempDir, FilesystemStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn round_trips_routing_resource() {
        let (_dir, store) = store();
        let vs = RoutingResource::new("default", "user-service").with_rules(vec![Rule {
            route: vec![RouteDestination::new(Destination::new("user-service", "v1"))],
            ..Default::default()
        }]);
        store.put_routing(&vs).await.unwrap();

        let loaded = store.get_routing("default", "user-service").await.unwrap();
        assert_eq!(loaded.rules(), vs.rules());
        assert_eq!(loaded.metadata.resource_version.as_deref(), Some("1"));

        let updated = store.update_routing(loaded).await.unwrap();
        assert_eq!(updated.metadata.resource_version.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn missing_document_is_not_found() {
        let (_dir, store) = store();
        let err = store.get_routing("default", "absent").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn corrupt_document_is_transport_error() {
        let (_dir, store) = store();
        let path = store.path_for(ResourceKind::VirtualService, "default", "broken");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{not json").unwrap();

        let err = store.get_routing("default", "broken").await.unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)));
    }

    #[tokio::test]
    async fn stale_update_conflicts() {
        let (_dir, store) = store();
        store
            .put_routing(&RoutingResource::new("default", "svc"))
            .await
            .unwrap();

        let first = store.get_routing("default", "svc").await.unwrap();
        let second = first.clone();
        store.update_routing(first).await.unwrap();

        let err = store.update_routing(second).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn policy_create_is_exclusive() {
        let (_dir, store) = store();
        let breaker = crate::engine::CircuitBreaker {
            namespace: "default".to_string(),
            name: "v1".to_string(),
            host: "user-service".to_string(),
        };

        store.create_policy(breaker.build_policy()).await.unwrap();
        let err = store.create_policy(breaker.build_policy()).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));

        let loaded = store.get_policy("default", "v1").await.unwrap();
        assert_eq!(loaded.spec.host, "user-service");
        assert_eq!(loaded.metadata.resource_version.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn document_for_another_namespace_is_rejected() {
        let (_dir, store) = store();
        let path = store.path_for(ResourceKind::VirtualService, "default", "svc");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            br#"{"metadata": {"name": "svc", "namespace": "staging"}, "spec": {}}"#,
        )
        .unwrap();

        let err = store.get_routing("default", "svc").await.unwrap_err();
        assert!(matches!(err, StoreError::Transport(ref m) if m.contains("staging/svc")));
    }
}
