//! Circuit-breaking connection limits for a host
//!
//! Creates a policy resource once. An existing policy of the same name is
//! treated as success and left untouched.

use std::time::Duration;

use crate::config::Settings;
use crate::model::{ConnectionPool, OutlierDetection, PolicyResource, PolicySpec};

pub const CONNECTION_POOL: ConnectionPool = ConnectionPool {
    max_connections: 1,
    http1_max_pending_requests: 1,
    max_requests_per_connection: 1,
};

pub const OUTLIER_DETECTION: OutlierDetection = OutlierDetection {
    consecutive_gateway_errors: 1,
    interval: Duration::from_secs(5),
    base_ejection_time: Duration::from_secs(30),
    max_ejection_percent: 100,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreaker {
    pub namespace: String,
    /// Policy name; the configured destination
    pub name: String,
    pub host: String,
}

impl CircuitBreaker {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            namespace: settings.namespace.clone(),
            name: settings.destination.clone(),
            host: settings.host.clone(),
        }
    }

    pub fn build_policy(&self) -> PolicyResource {
        PolicyResource::new(
            &self.namespace,
            &self.name,
            PolicySpec {
                host: self.host.clone(),
                connection_pool: CONNECTION_POOL,
                outlier_detection: OUTLIER_DETECTION,
            },
        )
    }
}
