//! Route Mutation Engine
//!
//! Seven strategies that each perform one read-modify-write cycle against
//! the resource store:
//!
//! | Action            | Target            | Splice                               |
//! |-------------------|-------------------|--------------------------------------|
//! | `header-override` | routing rules     | prepend if no equivalent rule        |
//! | `traffic-split`   | routing rules     | update first v1/v2 split, else append |
//! | `delay-fault`     | routing rules     | always prepend                       |
//! | `traffic-mirror`  | routing rules     | always prepend                       |
//! | `timeout`         | routing rules     | update every target-prefix rule      |
//! | `retry-policy`    | routing rules     | update every target-prefix rule      |
//! | `circuit-breaker` | policy resource   | create once                          |
//!
//! Settings are parsed into a strategy before the store is touched, so a bad
//! numeric setting never costs a fetch. Write conflicts are surfaced, not
//! retried: re-running the action re-reads the current resource.

pub mod circuit_breaker;
pub mod delay_fault;
pub mod header_override;
pub mod matching;
pub mod mirror;
pub mod retry;
pub mod timeout;
pub mod traffic_split;

pub use circuit_breaker::CircuitBreaker;
pub use delay_fault::DelayFault;
pub use header_override::HeaderOverride;
pub use mirror::TrafficMirror;
pub use retry::RouteRetries;
pub use timeout::RouteTimeout;
pub use traffic_split::TrafficSplit;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Settings;
use crate::errors::MeshRouteError;
use crate::model::{ResourceKind, Rule};
use crate::store::{ResourceStore, StoreError};

/// Action selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    HeaderOverride,
    TrafficSplit,
    DelayFault,
    TrafficMirror,
    Timeout,
    RetryPolicy,
    CircuitBreaker,
}

impl Action {
    pub fn all() -> &'static [Action] {
        &[
            Action::HeaderOverride,
            Action::TrafficSplit,
            Action::DelayFault,
            Action::TrafficMirror,
            Action::Timeout,
            Action::RetryPolicy,
            Action::CircuitBreaker,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::HeaderOverride => "header-override",
            Action::TrafficSplit => "traffic-split",
            Action::DelayFault => "delay-fault",
            Action::TrafficMirror => "traffic-mirror",
            Action::Timeout => "timeout",
            Action::RetryPolicy => "retry-policy",
            Action::CircuitBreaker => "circuit-breaker",
        }
    }

    /// Kind of resource the action writes
    pub fn target_kind(&self) -> ResourceKind {
        match self {
            Action::CircuitBreaker => ResourceKind::DestinationRule,
            _ => ResourceKind::VirtualService,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Action {
    type Err = MeshRouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Action::all()
            .iter()
            .copied()
            .find(|a| a.as_str() == normalized)
            .ok_or_else(|| MeshRouteError::unknown_action(s))
    }
}

/// What a strategy did to its target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    /// New rule spliced in at `index`
    Inserted { index: usize },
    /// New rule added at the end
    Appended { index: usize },
    /// Existing rules modified; may be empty when nothing qualified
    UpdatedInPlace { indices: Vec<usize> },
    /// Desired state already present; nothing written
    Unchanged,
    /// Policy resource created
    Created,
    /// Policy resource was already present; left as-is
    AlreadyExists,
}

impl Change {
    pub fn describe(&self) -> String {
        match self {
            Change::Inserted { index } => format!("inserted rule at position {}", index),
            Change::Appended { index } => format!("appended rule at position {}", index),
            Change::UpdatedInPlace { indices } if indices.is_empty() => {
                "no rules qualified; resource rewritten unchanged".to_string()
            }
            Change::UpdatedInPlace { indices } => format!(
                "updated {} rule(s) at position(s) {}",
                indices.len(),
                indices
                    .iter()
                    .map(|i| i.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Change::Unchanged => "equivalent rule already present".to_string(),
            Change::Created => "created".to_string(),
            Change::AlreadyExists => "already exists; left unchanged".to_string(),
        }
    }
}

/// Result of one engine invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    pub action: Action,
    pub kind: ResourceKind,
    /// `namespace/name` of the target
    pub resource: String,
    pub change: Change,
    /// Whether a write call succeeded
    pub written: bool,
    /// Rule count after the change, for routing targets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_count: Option<usize>,
}

/// A splice over a routing resource's ordered rule list
///
/// Each implementation owns its own matching and insertion point. Returning
/// [`Change::Unchanged`] skips the write; anything else is written back.
pub trait RuleMutation {
    const ACTION: Action;

    fn apply(&self, rules: &mut Vec<Rule>) -> Change;
}

/// Runs strategies against a store with fixed settings
pub struct RouteEngine<S> {
    store: S,
    settings: Settings,
}

impl<S: ResourceStore> RouteEngine<S> {
    pub fn new(store: S, settings: Settings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Parse an action selector and run it
    pub async fn apply_selector(&self, selector: &str) -> Result<ApplyOutcome, MeshRouteError> {
        let action: Action = selector.parse()?;
        self.apply(action).await
    }

    /// Run one action
    pub async fn apply(&self, action: Action) -> Result<ApplyOutcome, MeshRouteError> {
        info!(
            "Applying {} via {} store",
            action,
            self.store.backend_name()
        );

        // Parse failures name the action that needed the setting
        let named = |e: MeshRouteError| e.for_action(action);

        match action {
            Action::HeaderOverride => {
                self.mutate_routing(HeaderOverride::from_settings(&self.settings))
                    .await
            }
            Action::TrafficSplit => {
                self.mutate_routing(TrafficSplit::from_settings(&self.settings).map_err(named)?)
                    .await
            }
            Action::DelayFault => {
                self.mutate_routing(DelayFault::from_settings(&self.settings).map_err(named)?)
                    .await
            }
            Action::TrafficMirror => {
                self.mutate_routing(TrafficMirror::from_settings(&self.settings))
                    .await
            }
            Action::Timeout => {
                self.mutate_routing(RouteTimeout::from_settings(&self.settings).map_err(named)?)
                    .await
            }
            Action::RetryPolicy => {
                self.mutate_routing(RouteRetries::from_settings(&self.settings).map_err(named)?)
                    .await
            }
            Action::CircuitBreaker => {
                self.create_policy(CircuitBreaker::from_settings(&self.settings))
                    .await
            }
        }
    }

    /// Fetch, splice, and write back unless the splice reports no change
    pub async fn mutate_routing<M: RuleMutation>(
        &self,
        mutation: M,
    ) -> Result<ApplyOutcome, MeshRouteError> {
        let action = M::ACTION;
        let namespace = &self.settings.namespace;
        let name = &self.settings.service_name;
        let resource = format!("{}/{}", namespace, name);
        let store_err =
            |e: StoreError| MeshRouteError::from_store(action, ResourceKind::VirtualService, &resource, e);

        let mut current = self
            .store
            .get_routing(namespace, name)
            .await
            .map_err(store_err)?;
        debug!(
            "Fetched {} at version {:?} with {} rule(s)",
            resource,
            current.metadata.resource_version,
            current.rules().len()
        );

        let change = mutation.apply(current.rules_mut());

        if change == Change::Unchanged {
            info!("{}: {} already up to date, skipping write", action, resource);
            return Ok(ApplyOutcome {
                action,
                kind: ResourceKind::VirtualService,
                rule_count: Some(current.rules().len()),
                resource,
                change,
                written: false,
            });
        }

        let updated = self
            .store
            .update_routing(current)
            .await
            .map_err(store_err)?;
        info!("{}: updated {} ({})", action, resource, change.describe());

        Ok(ApplyOutcome {
            action,
            kind: ResourceKind::VirtualService,
            rule_count: Some(updated.rules().len()),
            resource,
            change,
            written: true,
        })
    }

    /// Create the policy once; an existing one counts as success
    async fn create_policy(&self, breaker: CircuitBreaker) -> Result<ApplyOutcome, MeshRouteError> {
        let action = Action::CircuitBreaker;
        let policy = breaker.build_policy();
        let resource = policy.key();
        let store_err = |e: StoreError| {
            MeshRouteError::from_store(action, ResourceKind::DestinationRule, &resource, e)
        };

        let change = match self.store.create_policy(policy).await {
            Ok(_) => {
                info!("DestinationRule {} created with circuit breaker settings", resource);
                Change::Created
            }
            Err(StoreError::AlreadyExists { .. }) => {
                // The existing policy must at least be readable to count as applied
                let existing = self
                    .store
                    .get_policy(&breaker.namespace, &breaker.name)
                    .await
                    .map_err(store_err)?;
                info!(
                    "DestinationRule {} already exists for host {}, skipping creation",
                    resource, existing.spec.host
                );
                Change::AlreadyExists
            }
            Err(e) => return Err(store_err(e)),
        };

        Ok(ApplyOutcome {
            action,
            kind: ResourceKind::DestinationRule,
            written: change == Change::Created,
            resource,
            change,
            rule_count: None,
        })
    }
}
