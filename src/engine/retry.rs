//! Retry policy on rules routing the target path

use crate::config::Settings;
use crate::errors::MeshRouteError;
use crate::model::{RetryPolicy, Rule};

use super::{matching, Action, Change, RuleMutation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRetries {
    pub prefix: String,
    pub policy: RetryPolicy,
}

impl RouteRetries {
    /// Attempts and per-try timeout are parsed here, before any fetch
    pub fn from_settings(settings: &Settings) -> Result<Self, MeshRouteError> {
        Ok(Self {
            prefix: settings.target_prefix.clone(),
            policy: RetryPolicy {
                attempts: settings.retry_attempts()?,
                per_try_timeout: settings.retry_per_try_timeout()?,
                retry_on: settings.retry_on.clone(),
            },
        })
    }
}

impl RuleMutation for RouteRetries {
    const ACTION: Action = Action::RetryPolicy;

    fn apply(&self, rules: &mut Vec<Rule>) -> Change {
        let indices = matching::update_prefixed(rules, &self.prefix, |rule| {
            rule.retries = Some(self.policy.clone());
        });

        if indices.is_empty() {
            tracing::warn!("No rule matches prefix {}, retries not set", self.prefix);
        } else {
            tracing::info!(
                "Set retries ({} attempts, on {}) on rules {:?}",
                self.policy.attempts,
                self.policy.retry_on,
                indices
            );
        }

        Change::UpdatedInPlace { indices }
    }
}
