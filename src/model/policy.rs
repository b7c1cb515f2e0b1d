//! Per-host connection and outlier-ejection policy

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{duration, ObjectMeta, ResourceKind, API_VERSION};

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_policy_kind() -> ResourceKind {
    ResourceKind::DestinationRule
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyResource {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_policy_kind")]
    pub kind: ResourceKind,
    pub metadata: ObjectMeta,
    pub spec: PolicySpec,
}

impl PolicyResource {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: PolicySpec) -> Self {
        Self {
            api_version: default_api_version(),
            kind: ResourceKind::DestinationRule,
            metadata: ObjectMeta::new(namespace, name),
            spec,
        }
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
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySpec {
    pub host: String,
    pub connection_pool: ConnectionPool,
    pub outlier_detection: OutlierDetection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPool {
    pub max_connections: u32,
    pub http1_max_pending_requests: u32,
    pub max_requests_per_connection: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlierDetection {
    pub consecutive_gateway_errors: u32,
    #[serde(with = "duration")]
    pub interval: Duration,
    #[serde(with = "duration")]
    pub base_ejection_time: Duration,
    pub max_ejection_percent: u32,
}
