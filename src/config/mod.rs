//! Settings - flat key/value options read once per invocation
//!
//! Values stay strings until a strategy needs them so that a malformed
//! number only fails the action that parses it. The typed accessors below
//! perform that parsing and report [`MeshRouteError::InvalidSetting`].

pub mod loader;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::MeshRouteError;

/// Setting keys with the environment variable that feeds each one
pub const SETTING_KEYS: [(&str, &str); 18] = [
    ("serviceName", "VIRTUAL_SERVICE_NAME"),
    ("namespace", "NAMESPACE"),
    ("host", "HOST"),
    ("destination", "DESTINATION"),
    ("subsetName", "SUBSET_NAME"),
    ("skipRouting", "SKIP_VIRTUAL_SERVICE"),
    ("skipPolicy", "SKIP_DESTINATION_RULE"),
    ("headerName", "HEADER_NAME"),
    ("headerValue", "HEADER_VALUE"),
    ("targetPrefix", "TARGET_PREFIX"),
    ("targetRewrite", "TARGET_REWRITE"),
    ("weight1", "WEIGHT_V1"),
    ("weight2", "WEIGHT_V2"),
    ("faultDelayMillis", "FAULT_DELAY_MILLIS"),
    ("timeoutSeconds", "TIMEOUT_DURATION"),
    ("retryAttempts", "RETRY_ATTEMPT"),
    ("retryPerTryTimeoutSeconds", "RETRY_PER_TRY_TIMEOUT"),
    ("retryOn", "RETRY_ON"),
];

/// Resolved options for one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Name of the routing resource to mutate
    pub service_name: String,
    pub namespace: String,
    /// Destination host used in every constructed route
    pub host: String,
    /// Primary subset; also names the circuit-breaker policy and is the mirror target
    pub destination: String,
    /// Subset receiving override, fault and mirrored-source traffic
    pub subset_name: String,
    pub skip_routing: bool,
    pub skip_policy: bool,
    pub header_name: String,
    pub header_value: String,
    pub target_prefix: String,
    pub target_rewrite: String,
    pub weight1: String,
    pub weight2: String,
    pub fault_delay_millis: String,
    pub timeout_seconds: String,
    pub retry_attempts: String,
    pub retry_per_try_timeout_seconds: String,
    pub retry_on: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_name: "user-service".to_string(),
            namespace: "default".to_string(),
            host: "user-service".to_string(),
            destination: "v1".to_string(),
            subset_name: "v2".to_string(),
            skip_routing: true,
            skip_policy: true,
            header_name: "x-user-type".to_string(),
            header_value: "beta".to_string(),
            target_prefix: "/user/users".to_string(),
            target_rewrite: "/v2/users".to_string(),
            weight1: "90".to_string(),
            weight2: "10".to_string(),
            fault_delay_millis: "5000".to_string(),
            timeout_seconds: "2".to_string(),
            retry_attempts: "3".to_string(),
            retry_per_try_timeout_seconds: "1".to_string(),
            retry_on: "gateway-error,connect-failure,refused-stream,5xx".to_string(),
        }
    }
}

impl Settings {
    /// Assign a setting by its camelCase key
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), MeshRouteError> {
        let value = value.to_string();
        match key {
            "serviceName" => self.service_name = value,
            "namespace" => self.namespace = value,
            "host" => self.host = value,
            "destination" => self.destination = value,
            "subsetName" => self.subset_name = value,
            "skipRouting" => self.skip_routing = parse_bool(&value),
            "skipPolicy" => self.skip_policy = parse_bool(&value),
            "headerName" => self.header_name = value,
            "headerValue" => self.header_value = value,
            "targetPrefix" => self.target_prefix = value,
            "targetRewrite" => self.target_rewrite = value,
            "weight1" => self.weight1 = value,
            "weight2" => self.weight2 = value,
            "faultDelayMillis" => self.fault_delay_millis = value,
            "timeoutSeconds" => self.timeout_seconds = value,
            "retryAttempts" => self.retry_attempts = value,
            "retryPerTryTimeoutSeconds" => self.retry_per_try_timeout_seconds = value,
            "retryOn" => self.retry_on = value,
            _ => {
                let keys: Vec<&str> = SETTING_KEYS.iter().map(|(k, _)| *k).collect();
                return Err(MeshRouteError::invalid_config(
                    format!("unknown setting '{}'", key),
                    crate::errors::suggestions::suggest_setting(key, &keys),
                ));
            }
        }
        Ok(())
    }

    /// Weights for the v1/v2 split
    pub fn traffic_weights(&self) -> Result<(i32, i32), MeshRouteError> {
        Ok((
            parse_i32("weight1", &self.weight1)?,
            parse_i32("weight2", &self.weight2)?,
        ))
    }

    pub fn fault_delay(&self) -> Result<Duration, MeshRouteError> {
        let millis = parse_non_negative("faultDelayMillis", &self.fault_delay_millis)?;
        Ok(Duration::from_millis(millis))
    }

    pub fn request_timeout(&self) -> Result<Duration, MeshRouteError> {
        let secs = parse_non_negative("timeoutSeconds", &self.timeout_seconds)?;
        Ok(Duration::from_secs(secs))
    }

    pub fn retry_attempts(&self) -> Result<i32, MeshRouteError> {
        parse_i32("retryAttempts", &self.retry_attempts)
    }

    pub fn retry_per_try_timeout(&self) -> Result<Duration, MeshRouteError> {
        let secs = parse_non_negative(
            "retryPerTryTimeoutSeconds",
            &self.retry_per_try_timeout_seconds,
        )?;
        Ok(Duration::from_secs(secs))
    }
}

/// `true` or `1` enable a flag; anything else disables it
pub(crate) fn parse_bool(value: &str) -> bool {
    matches!(value.trim(), "true" | "1")
}

/// Base-10 integer representable in 32 bits
pub fn parse_i32(key: &str, raw: &str) -> Result<i32, MeshRouteError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|e| MeshRouteError::invalid_setting(key, raw, e))
}

/// 32-bit integer that must not be negative, widened for duration math
pub fn parse_non_negative(key: &str, raw: &str) -> Result<u64, MeshRouteError> {
    let value = parse_i32(key, raw)?;
    u64::try_from(value).map_err(|_| MeshRouteError::invalid_setting(key, raw, "must not be negative"))
}
