//! Routing and policy resources
//!
//! Serde models for the two resource kinds the engine mutates. The JSON
//! shape follows the mesh's own documents (`metadata` + `spec`, camelCase
//! fields, `match` predicates with `exact`/`prefix` string matches) so files
//! exported from a cluster can be loaded by the filesystem store unchanged.

pub mod duration;
pub mod policy;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use policy::{ConnectionPool, OutlierDetection, PolicyResource, PolicySpec};

/// API group/version written on new resources
pub const API_VERSION: &str = "networking.istio.io/v1beta1";

/// Resource kinds known to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    VirtualService,
    DestinationRule,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::VirtualService => "VirtualService",
            ResourceKind::DestinationRule => "DestinationRule",
        }
    }

    /// Directory name used by the filesystem store
    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::VirtualService => "virtualservices",
            ResourceKind::DestinationRule => "destinationrules",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Name, namespace and store-assigned version of a resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    /// Opaque version the store uses to reject stale writes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            resource_version: None,
        }
    }

    /// `namespace/name`
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_routing_kind() -> ResourceKind {
    ResourceKind::VirtualService
}

/// Named, namespaced holder of the ordered rule sequence for a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingResource {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_routing_kind")]
    pub kind: ResourceKind,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: RoutingSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
    /// Evaluated in order; the first full match wins
    #[serde(default)]
    pub http: Vec<Rule>,
}

impl RoutingResource {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            api_version: default_api_version(),
            kind: ResourceKind::VirtualService,
            metadata: ObjectMeta::new(namespace, name),
            spec: RoutingSpec::default(),
        }
    }

    pub fn with_hosts(mut self, hosts: Vec<String>) -> Self {
        self.spec.hosts = hosts;
        self
    }

    pub fn with_rules(mut self, rules: Vec<Rule>) -> Self {
        self.spec.http = rules;
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn key(&self) -> String {
        self.metadata.key()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.spec.http
    }

    pub fn rules_mut(&mut self) -> &mut Vec<Rule> {
        &mut self.spec.http
    }
}

/// One routing entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Absent or empty matches every request
    #[serde(rename = "match", default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<MatchPredicate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<Rewrite>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub route: Vec<RouteDestination>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<FaultInjection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror: Option<Destination>,
    #[serde(
        default,
        with = "duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<RetryPolicy>,
}

impl Rule {
    /// URI prefix of the first match predicate, if it has one
    pub fn first_uri_prefix(&self) -> Option<&str> {
        self.matches.first().and_then(MatchPredicate::uri_prefix)
    }

    /// Whether any destination targets `host` with `subset`
    pub fn routes_to(&self, host: &str, subset: &str) -> bool {
        self.route
            .iter()
            .any(|r| r.destination.is(host, subset))
    }

    pub fn rewrite_uri(&self) -> Option<&str> {
        self.rewrite.as_ref().map(|r| r.uri.as_str())
    }
}

/// A single match predicate; all present conditions must hold
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPredicate {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, StringMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<StringMatch>,
}

impl MatchPredicate {
    /// Predicate on an exact header value
    pub fn header(name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(name.into(), StringMatch::Exact(value.into()));
        Self { headers, uri: None }
    }

    pub fn with_uri_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.uri = Some(StringMatch::Prefix(prefix.into()));
        self
    }

    pub fn uri_prefix(&self) -> Option<&str> {
        match &self.uri {
            Some(StringMatch::Prefix(p)) => Some(p.as_str()),
            _ => None,
        }
    }

    /// Exact value required for `name`, if the header is matched exactly
    pub fn header_exact(&self, name: &str) -> Option<&str> {
        match self.headers.get(name) {
            Some(StringMatch::Exact(v)) => Some(v.as_str()),
            _ => None,
        }
    }
}

/// String comparison used by match predicates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StringMatch {
    Exact(String),
    Prefix(String),
    Regex(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rewrite {
    pub uri: String,
}

/// A host, optionally narrowed to a named subset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subset: Option<String>,
}

impl Destination {
    pub fn new(host: impl Into<String>, subset: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            subset: Some(subset.into()),
        }
    }

    pub fn is(&self, host: &str, subset: &str) -> bool {
        self.host == host && self.subset.as_deref() == Some(subset)
    }
}

/// Weighted destination; weight is a percentage meaningful only in splits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDestination {
    pub destination: Destination,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

impl RouteDestination {
    pub fn new(destination: Destination) -> Self {
        Self {
            destination,
            weight: None,
        }
    }

    pub fn weighted(destination: Destination, weight: i32) -> Self {
        Self {
            destination,
            weight: Some(weight),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultInjection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<FaultDelay>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultDelay {
    pub percent: i32,
    #[serde(with = "duration")]
    pub fixed_delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    pub attempts: i32,
    #[serde(with = "duration")]
    pub per_try_timeout: Duration,
    /// Comma-separated retryable condition classes
    pub retry_on: String,
}
